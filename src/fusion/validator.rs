use std::collections::HashMap;

use uuid::Uuid;

use crate::config::FusionConfig;
use crate::models::enums::SurgeryRelationship;

use super::types::{
    CoverageStats, FindingSeverity, FusionOutcome, ValidationCheck, ValidationFinding,
    ValidationReport,
};

/// Assignment rates below this fraction raise a coverage warning.
const LOW_ASSIGNMENT_RATE: f64 = 0.5;

/// Post-hoc consistency checks over a run's output tables.
///
/// The validator only reports; it never raises and never mutates. A
/// non-empty `errors` list means the feature table should not be handed
/// to modeling as-is.
pub fn validate(outcome: &FusionOutcome, config: &FusionConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    check_duplicate_assignment(outcome, &mut report);
    check_window_bound(outcome, config, &mut report);
    check_surgery_sanity(outcome, &mut report);
    report.coverage = coverage_stats(outcome, &mut report);

    report
}

/// (a) No event may be assigned to more than one episode.
fn check_duplicate_assignment(outcome: &FusionOutcome, report: &mut ValidationReport) {
    let mut assignments: HashMap<Uuid, Vec<&str>> = HashMap::new();
    for link in &outcome.event_links {
        assignments
            .entry(link.event_id)
            .or_default()
            .push(link.episode_id.as_str());
    }
    let mut duplicates: Vec<(&Uuid, &Vec<&str>)> = assignments
        .iter()
        .filter(|(_, episodes)| episodes.len() > 1)
        .collect();
    duplicates.sort_by_key(|(event_id, _)| **event_id);
    for (event_id, episodes) in duplicates {
        report.push(ValidationFinding {
            severity: FindingSeverity::Error,
            check: ValidationCheck::DuplicateAssignment,
            message: format!(
                "event {event_id} assigned to {} episodes: {}",
                episodes.len(),
                episodes.join(", ")
            ),
        });
    }
}

/// (b) Every link must respect the configured window.
fn check_window_bound(
    outcome: &FusionOutcome,
    config: &FusionConfig,
    report: &mut ValidationReport,
) {
    for link in &outcome.event_links {
        if link.delta_days.abs() > config.time_window_days {
            report.push(ValidationFinding {
                severity: FindingSeverity::Error,
                check: ValidationCheck::WindowExceeded,
                message: format!(
                    "event {} in {} has |delta_days| = {} > window {}",
                    link.event_id,
                    link.episode_id,
                    link.delta_days.abs(),
                    config.time_window_days
                ),
            });
        }
    }
}

/// (c) A preop-classified row must not have days_to_surgery > 0 under the
/// documented sign convention.
fn check_surgery_sanity(outcome: &FusionOutcome, report: &mut ValidationReport) {
    let Some(surgery_links) = &outcome.surgery_links else {
        return;
    };
    for link in surgery_links {
        if link.relationship == SurgeryRelationship::Preop
            && link.days_to_surgery.is_some_and(|d| d > 0)
        {
            report.push(ValidationFinding {
                severity: FindingSeverity::Error,
                check: ValidationCheck::SurgerySanity,
                message: format!(
                    "preop row in {} has days_to_surgery = {}",
                    link.episode_id,
                    link.days_to_surgery.unwrap_or_default()
                ),
            });
        }
    }
}

/// (d) Coverage statistics, with a warning when assignment is low.
fn coverage_stats(outcome: &FusionOutcome, report: &mut ValidationReport) -> CoverageStats {
    let mut per_patient: HashMap<&str, usize> = HashMap::new();
    for episode in &outcome.episodes {
        *per_patient.entry(episode.patient_id.as_str()).or_default() += 1;
    }

    let patients = per_patient.len();
    let episodes = outcome.episodes.len();
    let assigned = outcome.summary.assigned_events;
    let unassigned = outcome.summary.unassigned_events;
    let total = assigned + unassigned;

    let assignment_rate = if total == 0 {
        1.0
    } else {
        assigned as f64 / total as f64
    };
    if assignment_rate < LOW_ASSIGNMENT_RATE {
        report.push(ValidationFinding {
            severity: FindingSeverity::Warning,
            check: ValidationCheck::Coverage,
            message: format!(
                "only {:.0}% of events fell inside an episode window",
                assignment_rate * 100.0
            ),
        });
    }

    CoverageStats {
        patients,
        episodes,
        mean_episodes_per_patient: if patients == 0 {
            0.0
        } else {
            episodes as f64 / patients as f64
        },
        max_episodes_per_patient: per_patient.values().copied().max().unwrap_or(0),
        assigned_events: assigned,
        unassigned_events: unassigned,
        assignment_rate,
    }
}
