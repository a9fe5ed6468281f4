use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::LabAnalyte;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabResult {
    pub event_id: Uuid,
    pub analyte: LabAnalyte,
    pub value: Option<f64>,
    pub unit: Option<String>,
}
