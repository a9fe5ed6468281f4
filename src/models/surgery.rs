use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::SurgeryType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurgeryRecord {
    pub surgery_id: Uuid,
    pub patient_id: String,
    pub surgery_date: NaiveDate,
    pub surgery_type: SurgeryType,
}
