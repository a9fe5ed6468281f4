use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::SpecimenAdequacy;

/// Cytopathology result for one FNA biopsy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CytologyResult {
    pub event_id: Uuid,
    /// Bethesda category, I (1, nondiagnostic) through VI (6, malignant).
    pub bethesda: Option<u8>,
    pub adequacy: Option<SpecimenAdequacy>,
}
