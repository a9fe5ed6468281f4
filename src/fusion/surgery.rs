use std::collections::HashMap;

use crate::config::FusionConfig;
use crate::models::enums::SurgeryRelationship;
use crate::models::{Episode, EpisodeSurgeryLink, SurgeryRecord};

/// Classify every (episode, surgery) pair of the same patient.
///
/// This is a full per-patient cross join: an episode paired with N
/// surgeries yields N rows, one per candidate surgery, with no reduction
/// to a single nearest match. Episodes of a patient with no surgery record
/// yield one `no_surgery` row with empty surgery fields.
///
/// `days_to_surgery = surgery_date - index_event_date`. The classification
/// follows the documented convention: `[-preop_window, 0]` is preop,
/// `(0, postop_window]` is postop, everything else unrelated. The sign
/// polarity is an open question upstream; confirm against labeled data
/// before treating these labels as clinical ground truth.
pub fn link_surgeries(
    episodes: &[Episode],
    surgeries: &[SurgeryRecord],
    config: &FusionConfig,
) -> Vec<EpisodeSurgeryLink> {
    let mut by_patient: HashMap<&str, Vec<&SurgeryRecord>> = HashMap::new();
    for surgery in surgeries {
        by_patient
            .entry(surgery.patient_id.as_str())
            .or_default()
            .push(surgery);
    }
    for candidates in by_patient.values_mut() {
        candidates.sort_by_key(|s| (s.surgery_date, s.surgery_id));
    }

    let mut links = Vec::new();
    for episode in episodes {
        match by_patient.get(episode.patient_id.as_str()) {
            None => links.push(EpisodeSurgeryLink {
                episode_id: episode.episode_id.clone(),
                surgery_id: None,
                surgery_date: None,
                surgery_type: None,
                relationship: SurgeryRelationship::NoSurgery,
                days_to_surgery: None,
            }),
            Some(candidates) => {
                for surgery in candidates {
                    let days = (surgery.surgery_date - episode.index_event_date).num_days();
                    links.push(EpisodeSurgeryLink {
                        episode_id: episode.episode_id.clone(),
                        surgery_id: Some(surgery.surgery_id),
                        surgery_date: Some(surgery.surgery_date),
                        surgery_type: Some(surgery.surgery_type),
                        relationship: classify(days, config),
                        days_to_surgery: Some(days),
                    });
                }
            }
        }
    }
    links
}

fn classify(days_to_surgery: i64, config: &FusionConfig) -> SurgeryRelationship {
    if (-config.preop_window_days..=0).contains(&days_to_surgery) {
        SurgeryRelationship::Preop
    } else if days_to_surgery > 0 && days_to_surgery <= config.postop_window_days {
        SurgeryRelationship::Postop
    } else {
        SurgeryRelationship::Unrelated
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::models::enums::{EventType, SurgeryType};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(d as i64)
    }

    fn episode(patient: &str, seq: u32, index_day: u32) -> Episode {
        Episode {
            episode_id: format!("{patient}_EP{seq:03}"),
            patient_id: patient.into(),
            index_event_type: EventType::FnaBiopsy,
            index_event_date: day(index_day),
            index_event_id: Uuid::new_v4(),
            priority_rank: 1,
        }
    }

    fn surgery(patient: &str, d: u32) -> SurgeryRecord {
        SurgeryRecord {
            surgery_id: Uuid::new_v4(),
            patient_id: patient.into(),
            surgery_date: day(d),
            surgery_type: SurgeryType::Lobectomy,
        }
    }

    #[test]
    fn patient_without_surgery_gets_no_surgery_row() {
        let episodes = vec![episode("P1", 1, 50)];
        let links = link_surgeries(&episodes, &[], &FusionConfig::default());

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].relationship, SurgeryRelationship::NoSurgery);
        assert!(links[0].surgery_id.is_none());
        assert!(links[0].days_to_surgery.is_none());
    }

    #[test]
    fn preop_window_is_inclusive_of_zero() {
        let episodes = vec![episode("P1", 1, 100)];
        let surgeries = vec![surgery("P1", 100)];
        let links = link_surgeries(&episodes, &surgeries, &FusionConfig::default());

        assert_eq!(links[0].days_to_surgery, Some(0));
        assert_eq!(links[0].relationship, SurgeryRelationship::Preop);
    }

    #[test]
    fn classification_boundaries() {
        let config = FusionConfig::default(); // preop 90, postop 365
        let cases = [
            (-91, SurgeryRelationship::Unrelated),
            (-90, SurgeryRelationship::Preop),
            (-1, SurgeryRelationship::Preop),
            (0, SurgeryRelationship::Preop),
            (1, SurgeryRelationship::Postop),
            (365, SurgeryRelationship::Postop),
            (366, SurgeryRelationship::Unrelated),
        ];
        for (days, expected) in cases {
            assert_eq!(classify(days, &config), expected, "days={days}");
        }
    }

    #[test]
    fn surgery_after_index_is_postop_per_documented_convention() {
        // Index day 90, surgery day 100: days_to_surgery = +10 => postop.
        let episodes = vec![episode("P1", 1, 90)];
        let surgeries = vec![surgery("P1", 100)];
        let links = link_surgeries(&episodes, &surgeries, &FusionConfig::default());

        assert_eq!(links[0].days_to_surgery, Some(10));
        assert_eq!(links[0].relationship, SurgeryRelationship::Postop);
    }

    #[test]
    fn multiple_surgeries_yield_one_row_each() {
        let episodes = vec![episode("P1", 1, 100)];
        let surgeries = vec![surgery("P1", 80), surgery("P1", 150), surgery("P1", 600)];
        let links = link_surgeries(&episodes, &surgeries, &FusionConfig::default());

        assert_eq!(links.len(), 3);
        assert_eq!(links[0].days_to_surgery, Some(-20));
        assert_eq!(links[0].relationship, SurgeryRelationship::Preop);
        assert_eq!(links[1].days_to_surgery, Some(50));
        assert_eq!(links[1].relationship, SurgeryRelationship::Postop);
        assert_eq!(links[2].days_to_surgery, Some(500));
        assert_eq!(links[2].relationship, SurgeryRelationship::Unrelated);
    }

    #[test]
    fn surgeries_never_link_across_patients() {
        let episodes = vec![episode("P1", 1, 100)];
        let surgeries = vec![surgery("P2", 100)];
        let links = link_surgeries(&episodes, &surgeries, &FusionConfig::default());

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].relationship, SurgeryRelationship::NoSurgery);
    }
}
