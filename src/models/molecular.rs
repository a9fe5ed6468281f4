use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mutation/fusion panel result for one molecular test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MolecularResult {
    pub event_id: Uuid,
    pub braf: bool,
    pub ras: bool,
    pub ret_ptc: bool,
    pub classifier_score: Option<f64>,
}
