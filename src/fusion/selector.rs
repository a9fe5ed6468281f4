use std::collections::BTreeMap;

use crate::config::FusionConfig;
use crate::models::{DiagnosticEvent, Episode};

/// Pick the anchor ("index") events that found episodes.
///
/// Filters to the configured index-eligible types, ranks each by its
/// position in the priority order, sorts every patient's anchors by
/// `(event_date, priority_rank, event_id)`, and numbers episodes from 1
/// per patient. Same-date ties go to the clinically higher-priority type.
///
/// Returns episodes ordered by `episode_id`. No index events is a valid,
/// empty result; the orchestrator surfaces the warning.
pub fn select_index_events(events: &[DiagnosticEvent], config: &FusionConfig) -> Vec<Episode> {
    // BTreeMap keeps patient iteration deterministic.
    let mut by_patient: BTreeMap<&str, Vec<(&DiagnosticEvent, usize)>> = BTreeMap::new();
    for event in events {
        if let Some(rank) = config.priority_rank(event.event_type) {
            by_patient
                .entry(event.patient_id.as_str())
                .or_default()
                .push((event, rank));
        }
    }

    let mut episodes = Vec::new();
    for (patient_id, mut anchors) in by_patient {
        anchors.sort_by(|(a, rank_a), (b, rank_b)| {
            (a.event_date, rank_a, a.event_id).cmp(&(b.event_date, rank_b, b.event_id))
        });
        for (seq, (event, rank)) in anchors.into_iter().enumerate() {
            episodes.push(Episode {
                episode_id: format!("{}_EP{:03}", patient_id, seq + 1),
                patient_id: patient_id.to_string(),
                index_event_type: event.event_type,
                index_event_date: event.event_date,
                index_event_id: event.event_id,
                priority_rank: rank,
            });
        }
    }
    episodes
}
