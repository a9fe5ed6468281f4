use std::collections::BTreeMap;
use std::time::Instant;

use rayon::prelude::*;

use crate::config::FusionConfig;
use crate::models::{
    DiagnosticEvent, Episode, EpisodeEventLink, EpisodeFeatures, EpisodeSurgeryLink,
    SurgeryRecord,
};

use super::assigner::assign_events;
use super::features::aggregate_features;
use super::selector::select_index_events;
use super::surgery::link_surgeries;
use super::types::{EventSnapshot, FusionError, FusionOutcome, RunSummary};

/// Runs the full fusion pipeline: index selection, windowed assignment,
/// surgery linkage, feature aggregation.
///
/// Every stage is scoped to a single patient, so the engine partitions the
/// snapshot by `patient_id`, fuses partitions in parallel, and re-sorts the
/// concatenated tables by `episode_id` — parallel execution never changes
/// the observable output.
pub struct FusionEngine {
    config: FusionConfig,
}

/// One patient's slice of the input.
#[derive(Default)]
struct PatientPartition {
    events: Vec<DiagnosticEvent>,
    surgeries: Vec<SurgeryRecord>,
}

struct PartitionOutput {
    episodes: Vec<Episode>,
    event_links: Vec<EpisodeEventLink>,
    surgery_links: Vec<EpisodeSurgeryLink>,
    features: Vec<EpisodeFeatures>,
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self {
            config: FusionConfig::default(),
        }
    }
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Result<Self, FusionError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Run one fusion pass over a snapshot.
    ///
    /// Only structural input problems abort; an input with no index events
    /// produces empty tables and a warning in the run summary.
    pub fn run(&self, snapshot: &EventSnapshot) -> Result<FusionOutcome, FusionError> {
        let start = Instant::now();
        snapshot.check_integrity()?;

        let has_surgery_data = !snapshot.surgeries.is_empty();
        let partitions = partition_by_patient(snapshot);
        let patients = partitions.len();

        let outputs: Vec<PartitionOutput> = partitions
            .par_iter()
            .map(|partition| self.fuse_partition(partition, snapshot, has_surgery_data))
            .collect();

        let mut episodes = Vec::new();
        let mut event_links = Vec::new();
        let mut surgery_links = Vec::new();
        let mut features = Vec::new();
        for output in outputs {
            episodes.extend(output.episodes);
            event_links.extend(output.event_links);
            surgery_links.extend(output.surgery_links);
            features.extend(output.features);
        }

        // Re-establish the deterministic global order.
        episodes.sort_by(|a, b| a.episode_id.cmp(&b.episode_id));
        event_links.sort_by(|a, b| {
            (&a.episode_id, a.event_date, a.event_id).cmp(&(
                &b.episode_id,
                b.event_date,
                b.event_id,
            ))
        });
        surgery_links.sort_by(|a, b| {
            (&a.episode_id, a.surgery_date, a.surgery_id).cmp(&(
                &b.episode_id,
                b.surgery_date,
                b.surgery_id,
            ))
        });
        features.sort_by(|a, b| a.episode_id.cmp(&b.episode_id));

        let mut warnings = Vec::new();
        if episodes.is_empty() && !snapshot.events.is_empty() {
            let message = "no index events found; episode tables are empty".to_string();
            tracing::warn!("{message}");
            warnings.push(message);
        }

        let assigned_events = event_links.len();
        let summary = RunSummary {
            patients,
            input_events: snapshot.events.len(),
            episodes: episodes.len(),
            assigned_events,
            unassigned_events: snapshot.events.len() - assigned_events,
            surgery_links: surgery_links.len(),
            processing_time_ms: start.elapsed().as_millis() as u64,
            warnings,
        };

        tracing::info!(
            patients = summary.patients,
            episodes = summary.episodes,
            assigned = summary.assigned_events,
            unassigned = summary.unassigned_events,
            processing_ms = summary.processing_time_ms,
            "episode fusion complete"
        );

        Ok(FusionOutcome {
            episodes,
            event_links,
            surgery_links: has_surgery_data.then_some(surgery_links),
            features,
            summary,
        })
    }

    fn fuse_partition(
        &self,
        partition: &PatientPartition,
        snapshot: &EventSnapshot,
        has_surgery_data: bool,
    ) -> PartitionOutput {
        let episodes = select_index_events(&partition.events, &self.config);
        let event_links = assign_events(&episodes, &partition.events, &self.config);
        let surgery_links = if has_surgery_data {
            link_surgeries(&episodes, &partition.surgeries, &self.config)
        } else {
            Vec::new()
        };
        let features = aggregate_features(&episodes, &event_links, snapshot);
        PartitionOutput {
            episodes,
            event_links,
            surgery_links,
            features,
        }
    }
}

fn partition_by_patient(snapshot: &EventSnapshot) -> Vec<PatientPartition> {
    let mut by_patient: BTreeMap<&str, PatientPartition> = BTreeMap::new();
    for event in &snapshot.events {
        by_patient
            .entry(event.patient_id.as_str())
            .or_default()
            .events
            .push(event.clone());
    }
    // Surgeries for patients with no events found no episodes; skip them.
    for surgery in &snapshot.surgeries {
        if let Some(partition) = by_patient.get_mut(surgery.patient_id.as_str()) {
            partition.surgeries.push(surgery.clone());
        }
    }
    by_patient.into_values().collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::models::enums::{EventType, LabAnalyte, SurgeryRelationship, SurgeryType};
    use crate::models::{ImagingFinding, LabResult};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(d as i64)
    }

    fn event(patient: &str, event_type: EventType, d: u32) -> DiagnosticEvent {
        DiagnosticEvent {
            event_id: Uuid::new_v4(),
            patient_id: patient.into(),
            event_type,
            event_date: day(d),
        }
    }

    fn cohort_snapshot() -> EventSnapshot {
        let p1_fna = event("P1", EventType::FnaBiopsy, 90);
        let p1_surgery = event("P1", EventType::Surgery, 100);
        let p1_us = event("P1", EventType::Ultrasound, 95);
        let p1_tg = event("P1", EventType::ThyroglobulinLab, 92);
        let p2_imaging = event("P2", EventType::MajorImaging, 40);
        let p2_us = event("P2", EventType::Ultrasound, 45);
        let p2_stray = event("P2", EventType::TshLab, 300);

        EventSnapshot {
            imaging: vec![ImagingFinding {
                event_id: p1_us.event_id,
                tirads: Some(4),
                nodule_count: Some(1),
                max_nodule_size_cm: Some(1.1),
                thyroid_volume_ml: None,
                suspicious_features: None,
            }],
            labs: vec![LabResult {
                event_id: p1_tg.event_id,
                analyte: LabAnalyte::Thyroglobulin,
                value: Some(12.0),
                unit: Some("ng/mL".into()),
            }],
            surgeries: vec![SurgeryRecord {
                surgery_id: Uuid::new_v4(),
                patient_id: "P1".into(),
                surgery_date: day(100),
                surgery_type: SurgeryType::TotalThyroidectomy,
            }],
            events: vec![p1_fna, p1_surgery, p1_us, p1_tg, p2_imaging, p2_us, p2_stray],
            ..Default::default()
        }
    }

    #[test]
    fn full_pipeline_on_small_cohort() {
        let engine = FusionEngine::default();
        let outcome = engine.run(&cohort_snapshot()).unwrap();

        let ids: Vec<&str> = outcome
            .episodes
            .iter()
            .map(|e| e.episode_id.as_str())
            .collect();
        assert_eq!(ids, vec!["P1_EP001", "P1_EP002", "P2_EP001"]);

        assert_eq!(outcome.summary.patients, 2);
        assert_eq!(outcome.summary.input_events, 7);
        // P2's TSH lab on day 300 is outside every window.
        assert_eq!(outcome.summary.unassigned_events, 1);
        assert_eq!(outcome.summary.assigned_events, 6);

        // Surgery data was supplied; P2 has none and gets a no_surgery row.
        let surgery_links = outcome.surgery_links.as_ref().unwrap();
        let p2_rows: Vec<_> = surgery_links
            .iter()
            .filter(|l| l.episode_id.starts_with("P2"))
            .collect();
        assert_eq!(p2_rows.len(), 1);
        assert_eq!(p2_rows[0].relationship, SurgeryRelationship::NoSurgery);

        // One feature record per episode, in episode order.
        assert_eq!(outcome.features.len(), 3);
        assert_eq!(outcome.features[1].episode_id, "P1_EP002");
    }

    #[test]
    fn features_join_attribute_tables() {
        let engine = FusionEngine::default();
        let outcome = engine.run(&cohort_snapshot()).unwrap();

        // The ultrasound (day 95, equidistant tie) resolves to the surgery
        // episode, so its imaging block lands on P1_EP002.
        let ep002 = outcome
            .features
            .iter()
            .find(|f| f.episode_id == "P1_EP002")
            .unwrap();
        let imaging = ep002.imaging.as_ref().unwrap();
        assert_eq!(imaging.tirads_max, Some(4));

        let ep001 = outcome
            .features
            .iter()
            .find(|f| f.episode_id == "P1_EP001")
            .unwrap();
        assert!(ep001.imaging.is_none());
        assert_eq!(ep001.labs.as_ref().unwrap().thyroglobulin_max, Some(12.0));
    }

    #[test]
    fn no_surgery_data_skips_the_linker() {
        let mut snapshot = cohort_snapshot();
        snapshot.surgeries.clear();
        let outcome = FusionEngine::default().run(&snapshot).unwrap();
        assert!(outcome.surgery_links.is_none());
        assert_eq!(outcome.summary.surgery_links, 0);
    }

    #[test]
    fn no_index_events_yields_empty_tables_and_warning() {
        let snapshot = EventSnapshot {
            events: vec![
                event("P1", EventType::Ultrasound, 10),
                event("P1", EventType::TshLab, 12),
            ],
            ..Default::default()
        };
        let outcome = FusionEngine::default().run(&snapshot).unwrap();

        assert!(outcome.episodes.is_empty());
        assert!(outcome.event_links.is_empty());
        assert!(outcome.features.is_empty());
        assert_eq!(outcome.summary.warnings.len(), 1);
        assert_eq!(outcome.summary.unassigned_events, 2);
    }

    #[test]
    fn empty_snapshot_is_quietly_empty() {
        let outcome = FusionEngine::default().run(&EventSnapshot::default()).unwrap();
        assert!(outcome.episodes.is_empty());
        assert!(outcome.summary.warnings.is_empty());
    }

    #[test]
    fn structural_problems_abort() {
        let e = event("P1", EventType::Surgery, 10);
        let dup = e.clone();
        let snapshot = EventSnapshot {
            events: vec![e, dup],
            ..Default::default()
        };
        assert!(matches!(
            FusionEngine::default().run(&snapshot),
            Err(FusionError::DuplicateEventId(_))
        ));
    }

    #[test]
    fn invalid_config_rejected_at_construction() {
        let config = FusionConfig::with_window(-5);
        assert!(FusionEngine::new(config).is_err());
    }

    #[test]
    fn runs_are_deterministic() {
        let snapshot = cohort_snapshot();
        let engine = FusionEngine::default();
        let a = engine.run(&snapshot).unwrap();
        let b = engine.run(&snapshot).unwrap();

        // Summaries carry wall-clock time; compare the tables.
        assert_eq!(
            serde_json::to_string(&a.episodes).unwrap(),
            serde_json::to_string(&b.episodes).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&a.event_links).unwrap(),
            serde_json::to_string(&b.event_links).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&a.surgery_links).unwrap(),
            serde_json::to_string(&b.surgery_links).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&a.features).unwrap(),
            serde_json::to_string(&b.features).unwrap()
        );
    }

    #[test]
    fn window_presets_nest() {
        let snapshot = cohort_snapshot();
        let narrow = FusionEngine::new(FusionConfig::with_window(14))
            .unwrap()
            .run(&snapshot)
            .unwrap();
        let wide = FusionEngine::new(FusionConfig::with_window(45))
            .unwrap()
            .run(&snapshot)
            .unwrap();
        assert!(narrow.summary.assigned_events <= wide.summary.assigned_events);
    }
}
