use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured findings extracted from one imaging study.
/// Every attribute is optional; reports vary widely in completeness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagingFinding {
    pub event_id: Uuid,
    /// ACR TI-RADS level, 1 (benign) through 5 (highly suspicious).
    pub tirads: Option<u8>,
    pub nodule_count: Option<u32>,
    pub max_nodule_size_cm: Option<f64>,
    pub thyroid_volume_ml: Option<f64>,
    pub suspicious_features: Option<u32>,
}
