use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::EventType;

/// One diagnostic record in the input stream. Modality-specific attributes
/// live in side tables keyed by `event_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub event_id: Uuid,
    pub patient_id: String,
    pub event_type: EventType,
    pub event_date: NaiveDate,
}
