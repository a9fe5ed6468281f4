use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{EventType, SpecimenAdequacy, SurgeryRelationship, SurgeryType};

/// A diagnostic episode: a temporal cluster of events anchored on one
/// clinically significant index event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    /// `{patient_id}_EP{seq:03}`, sequence increasing per patient.
    pub episode_id: String,
    pub patient_id: String,
    pub index_event_type: EventType,
    pub index_event_date: NaiveDate,
    pub index_event_id: Uuid,
    /// Position of the index type in the configured priority order.
    /// Lower rank means higher clinical priority.
    pub priority_rank: usize,
}

/// Assignment of one event to its episode. Each `event_id` appears in at
/// most one link across the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeEventLink {
    pub episode_id: String,
    pub event_id: Uuid,
    pub event_type: EventType,
    pub event_date: NaiveDate,
    /// Signed: `event_date - index_event_date`.
    pub delta_days: i64,
    pub within_window: bool,
}

/// Temporal relationship between one episode and one candidate surgery.
/// A patient with N surgeries yields N rows per episode; the surgery fields
/// are None only for `no_surgery` rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeSurgeryLink {
    pub episode_id: String,
    pub surgery_id: Option<Uuid>,
    pub surgery_date: Option<NaiveDate>,
    pub surgery_type: Option<SurgeryType>,
    pub relationship: SurgeryRelationship,
    /// Signed: `surgery_date - index_event_date`.
    pub days_to_surgery: Option<i64>,
}

/// Model-ready feature record for one episode. A modality block is None
/// when the episode has no assigned events of that modality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeFeatures {
    pub episode_id: String,
    pub patient_id: String,
    pub index_event_type: EventType,
    pub index_event_date: NaiveDate,
    pub imaging: Option<ImagingFeatures>,
    pub cytology: Option<CytologyFeatures>,
    pub molecular: Option<MolecularFeatures>,
    pub labs: Option<LabFeatures>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagingFeatures {
    /// Worst finding across the episode's imaging studies.
    pub tirads_max: Option<u8>,
    pub nodule_count_total: Option<u32>,
    pub max_nodule_size_cm: Option<f64>,
    pub thyroid_volume_latest_ml: Option<f64>,
    pub suspicious_features_total: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CytologyFeatures {
    pub bethesda_max: Option<u8>,
    pub bethesda_latest: Option<u8>,
    pub fna_count: u32,
    pub adequacy_latest: Option<SpecimenAdequacy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MolecularFeatures {
    /// Positive if any test in the episode reported the mutation.
    pub braf_positive: bool,
    pub ras_positive: bool,
    pub ret_ptc_positive: bool,
    pub classifier_score_latest: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabFeatures {
    pub thyroglobulin_mean: Option<f64>,
    pub thyroglobulin_max: Option<f64>,
    pub tsh_latest: Option<f64>,
    pub t3_latest: Option<f64>,
    pub t4_latest: Option<f64>,
    pub anti_tg_max: Option<f64>,
    /// `anti_tg_max > 0.9`; None when no anti-Tg result was assigned.
    pub anti_tg_positive: Option<bool>,
}
