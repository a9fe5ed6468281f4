use chrono::NaiveDate;

use crate::config::FusionConfig;
use crate::models::{DiagnosticEvent, Episode, EpisodeEventLink};

use super::types::episodes_by_patient;

/// Assign every event to the nearest eligible episode of its patient.
///
/// Every event is matched against every episode of the same patient
/// (index events included, which land in their own episode at distance 0).
/// Events inside no window are dropped; that is an expected outcome, not
/// an error. After resolution each `event_id` maps to exactly one episode.
///
/// Output is sorted by `(episode_id, event_date, event_id)`.
pub fn assign_events(
    episodes: &[Episode],
    events: &[DiagnosticEvent],
    config: &FusionConfig,
) -> Vec<EpisodeEventLink> {
    let by_patient = episodes_by_patient(episodes);

    let mut links = Vec::new();
    for event in events {
        let Some(candidates) = by_patient.get(event.patient_id.as_str()) else {
            continue;
        };
        let within: Vec<(&Episode, i64)> = candidates
            .iter()
            .map(|ep| (*ep, delta_days(event.event_date, ep.index_event_date)))
            .filter(|(_, delta)| delta.abs() <= config.time_window_days)
            .collect();

        if let Some((episode, delta)) = nearest_episode(within) {
            links.push(EpisodeEventLink {
                episode_id: episode.episode_id.clone(),
                event_id: event.event_id,
                event_type: event.event_type,
                event_date: event.event_date,
                delta_days: delta,
                within_window: true,
            });
        }
    }

    links.sort_by(|a, b| {
        (&a.episode_id, a.event_date, a.event_id).cmp(&(&b.episode_id, b.event_date, b.event_id))
    });
    links
}

/// Signed day offset of an event from an episode anchor.
pub fn delta_days(event_date: NaiveDate, index_date: NaiveDate) -> i64 {
    (event_date - index_date).num_days()
}

/// Collision resolution: the winning episode is the one with the smallest
/// `|delta_days|`; ties go to the lower `priority_rank`, then the earlier
/// `index_event_date`, then the lower `episode_id`. The comparator is
/// total, so the result is reproducible across partitioned execution.
fn nearest_episode(candidates: Vec<(&Episode, i64)>) -> Option<(&Episode, i64)> {
    candidates.into_iter().min_by(|(a, da), (b, db)| {
        (da.abs(), a.priority_rank, a.index_event_date, &a.episode_id).cmp(&(
            db.abs(),
            b.priority_rank,
            b.index_event_date,
            &b.episode_id,
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use uuid::Uuid;

    use super::*;
    use crate::fusion::selector::select_index_events;
    use crate::models::enums::EventType;

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

    /// Collision case: FNA day 90 and surgery day 100, ultrasound
    /// day 95 equidistant from both anchors. The surgery episode wins the
    /// tie on priority rank.
    #[test]
    fn equidistant_collision_resolves_to_higher_priority() {
        let mut events = vec![
            event("P1", EventType::FnaBiopsy, 90),
            event("P1", EventType::Surgery, 100),
        ];
        let us = event("P1", EventType::Ultrasound, 95);
        events.push(us.clone());

        let config = FusionConfig::default();
        let episodes = select_index_events(&events, &config);
        assert_eq!(episodes.len(), 2);

        let links = assign_events(&episodes, &events, &config);
        let us_links: Vec<_> = links.iter().filter(|l| l.event_id == us.event_id).collect();
        assert_eq!(us_links.len(), 1, "collision must resolve to one episode");
        assert_eq!(us_links[0].episode_id, "P1_EP002"); // the surgery anchor
        assert_eq!(us_links[0].delta_days, -5);
    }

    #[test]
    fn nearer_episode_wins_when_distances_differ() {
        let events = vec![
            event("P1", EventType::FnaBiopsy, 90),
            event("P1", EventType::Surgery, 100),
            event("P1", EventType::Ultrasound, 93),
        ];
        let config = FusionConfig::default();
        let episodes = select_index_events(&events, &config);
        let links = assign_events(&episodes, &events, &config);

        let us = links
            .iter()
            .find(|l| l.event_type == EventType::Ultrasound)
            .unwrap();
        // |93-90| = 3 beats |93-100| = 7 despite the surgery's higher priority.
        assert_eq!(us.episode_id, "P1_EP001");
        assert_eq!(us.delta_days, 3);
    }

    #[test]
    fn events_outside_all_windows_are_dropped() {
        let events = vec![
            event("P1", EventType::Surgery, 100),
            event("P1", EventType::TshLab, 10),
        ];
        let config = FusionConfig::with_window(30);
        let episodes = select_index_events(&events, &config);
        let links = assign_events(&episodes, &events, &config);

        assert!(links.iter().all(|l| l.event_type != EventType::TshLab));
    }

    #[test]
    fn index_events_assign_to_their_own_episode() {
        let events = vec![
            event("P1", EventType::Surgery, 100),
            event("P1", EventType::FnaBiopsy, 90),
        ];
        let config = FusionConfig::default();
        let episodes = select_index_events(&events, &config);
        let links = assign_events(&episodes, &events, &config);

        for episode in &episodes {
            let own = links
                .iter()
                .find(|l| l.event_id == episode.index_event_id)
                .unwrap();
            assert_eq!(own.episode_id, episode.episode_id);
            assert_eq!(own.delta_days, 0);
        }
    }

    #[test]
    fn each_event_assigned_at_most_once() {
        let mut events = Vec::new();
        for d in [10u32, 15, 20, 40, 45] {
            events.push(event("P1", EventType::FnaBiopsy, d));
        }
        for d in [8u32, 12, 18, 22, 41, 50] {
            events.push(event("P1", EventType::Ultrasound, d));
        }
        let config = FusionConfig::default();
        let episodes = select_index_events(&events, &config);
        let links = assign_events(&episodes, &events, &config);

        let mut seen = HashSet::new();
        for link in &links {
            assert!(seen.insert(link.event_id), "event assigned twice");
        }
    }

    #[test]
    fn window_bound_holds_for_every_link() {
        let mut events = vec![event("P1", EventType::Surgery, 60)];
        for d in [20u32, 29, 30, 31, 90, 91, 200] {
            events.push(event("P1", EventType::TshLab, d));
        }
        let config = FusionConfig::with_window(30);
        let episodes = select_index_events(&events, &config);
        let links = assign_events(&episodes, &events, &config);

        for link in &links {
            assert!(link.delta_days.abs() <= 30);
            assert!(link.within_window);
        }
    }

    #[test]
    fn narrow_window_assignment_is_subset_of_wide() {
        let mut events = vec![event("P1", EventType::Surgery, 60)];
        for d in [35u32, 45, 50, 55, 60, 65, 72, 88] {
            events.push(event("P1", EventType::Ultrasound, d));
        }
        let narrow_cfg = FusionConfig::with_window(14);
        let wide_cfg = FusionConfig::with_window(30);
        let episodes = select_index_events(&events, &narrow_cfg);

        let narrow: HashSet<Uuid> = assign_events(&episodes, &events, &narrow_cfg)
            .iter()
            .map(|l| l.event_id)
            .collect();
        let wide: HashSet<Uuid> = assign_events(&episodes, &events, &wide_cfg)
            .iter()
            .map(|l| l.event_id)
            .collect();

        assert!(narrow.is_subset(&wide));
        assert!(narrow.len() < wide.len());
    }

    #[test]
    fn events_never_cross_patients() {
        let events = vec![
            event("P1", EventType::Surgery, 100),
            event("P2", EventType::Ultrasound, 100),
        ];
        let config = FusionConfig::default();
        let episodes = select_index_events(&events, &config);
        let links = assign_events(&episodes, &events, &config);

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].event_type, EventType::Surgery);
    }

    #[test]
    fn delta_days_is_signed() {
        assert_eq!(delta_days(day(95), day(100)), -5);
        assert_eq!(delta_days(day(100), day(95)), 5);
        assert_eq!(delta_days(day(7), day(7)), 0);
    }
}
