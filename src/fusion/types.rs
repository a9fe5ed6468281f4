use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    CytologyResult, DiagnosticEvent, Episode, EpisodeEventLink, EpisodeFeatures,
    EpisodeSurgeryLink, ImagingFinding, LabResult, MolecularResult, SurgeryRecord,
};

// ---------------------------------------------------------------------------
// EventSnapshot — pre-assembled input for one fusion run
// ---------------------------------------------------------------------------

/// All input tables for one run, held in memory. The caller loads whatever
/// source it has (files, a database, a test fixture), builds this snapshot,
/// and hands it to the engine. This keeps the fusion logic pure and
/// testable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub events: Vec<DiagnosticEvent>,
    pub surgeries: Vec<SurgeryRecord>,
    pub imaging: Vec<ImagingFinding>,
    pub cytology: Vec<CytologyResult>,
    pub molecular: Vec<MolecularResult>,
    pub labs: Vec<LabResult>,
}

impl EventSnapshot {
    pub fn imaging_for(&self, event_id: Uuid) -> Option<&ImagingFinding> {
        self.imaging.iter().find(|f| f.event_id == event_id)
    }

    pub fn cytology_for(&self, event_id: Uuid) -> Option<&CytologyResult> {
        self.cytology.iter().find(|c| c.event_id == event_id)
    }

    pub fn molecular_for(&self, event_id: Uuid) -> Option<&MolecularResult> {
        self.molecular.iter().find(|m| m.event_id == event_id)
    }

    pub fn labs_for(&self, event_id: Uuid) -> Option<&LabResult> {
        self.labs.iter().find(|l| l.event_id == event_id)
    }

    /// Structural integrity check, run before any fusion stage. These are
    /// the only conditions that abort a run; everything downstream is a
    /// validation finding, not an error.
    pub fn check_integrity(&self) -> Result<(), FusionError> {
        let mut seen = HashSet::with_capacity(self.events.len());
        for event in &self.events {
            if event.patient_id.trim().is_empty() {
                return Err(FusionError::EmptyPatientId(event.event_id));
            }
            if !seen.insert(event.event_id) {
                return Err(FusionError::DuplicateEventId(event.event_id));
            }
        }
        for surgery in &self.surgeries {
            if surgery.patient_id.trim().is_empty() {
                return Err(FusionError::EmptyPatientId(surgery.surgery_id));
            }
        }

        let orphan = |table: &'static str, id: Uuid| FusionError::UnknownEvent {
            table,
            event_id: id,
        };
        for f in &self.imaging {
            if !seen.contains(&f.event_id) {
                return Err(orphan("imaging", f.event_id));
            }
        }
        for c in &self.cytology {
            if !seen.contains(&c.event_id) {
                return Err(orphan("cytology", c.event_id));
            }
        }
        for m in &self.molecular {
            if !seen.contains(&m.event_id) {
                return Err(orphan("molecular", m.event_id));
            }
        }
        for l in &self.labs {
            if !seen.contains(&l.event_id) {
                return Err(orphan("labs", l.event_id));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FusionError
// ---------------------------------------------------------------------------

/// Structural input problems. Raised immediately; never used for
/// business-rule findings (those go through the validator's report).
#[derive(Error, Debug)]
pub enum FusionError {
    #[error("duplicate event id in input: {0}")]
    DuplicateEventId(Uuid),

    #[error("{table} attribute row references unknown event id: {event_id}")]
    UnknownEvent {
        table: &'static str,
        event_id: Uuid,
    },

    #[error("record {0} has an empty patient id")]
    EmptyPatientId(Uuid),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

// ---------------------------------------------------------------------------
// FusionOutcome & RunSummary
// ---------------------------------------------------------------------------

/// The assembled output tables of one run, plus a run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionOutcome {
    pub episodes: Vec<Episode>,
    pub event_links: Vec<EpisodeEventLink>,
    /// None when no surgery data was supplied; Some (possibly with
    /// `no_surgery` rows) otherwise.
    pub surgery_links: Option<Vec<EpisodeSurgeryLink>>,
    pub features: Vec<EpisodeFeatures>,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub patients: usize,
    pub input_events: usize,
    pub episodes: usize,
    pub assigned_events: usize,
    /// Events outside every window of their patient. An expected outcome,
    /// not an error.
    pub unassigned_events: usize,
    pub surgery_links: usize,
    pub processing_time_ms: u64,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Validation report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FindingSeverity {
    Warning,
    Error,
}

/// One consistency finding. Reported, never raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub severity: FindingSeverity,
    pub check: ValidationCheck,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationCheck {
    DuplicateAssignment,
    WindowExceeded,
    SurgerySanity,
    Coverage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverageStats {
    pub patients: usize,
    pub episodes: usize,
    pub mean_episodes_per_patient: f64,
    pub max_episodes_per_patient: usize,
    pub assigned_events: usize,
    pub unassigned_events: usize,
    /// assigned / (assigned + unassigned); 1.0 when there were no events.
    pub assignment_rate: f64,
}

/// Post-hoc consistency report over a run's output tables. The validator
/// only describes; it never mutates or rejects the tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationFinding>,
    pub warnings: Vec<ValidationFinding>,
    pub coverage: CoverageStats,
}

impl ValidationReport {
    /// True when the output is safe to hand to modeling.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn push(&mut self, finding: ValidationFinding) {
        match finding.severity {
            FindingSeverity::Error => self.errors.push(finding),
            FindingSeverity::Warning => self.warnings.push(finding),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Group episodes by patient id, preserving input order within each group.
pub(crate) fn episodes_by_patient(episodes: &[Episode]) -> HashMap<&str, Vec<&Episode>> {
    let mut by_patient: HashMap<&str, Vec<&Episode>> = HashMap::new();
    for episode in episodes {
        by_patient
            .entry(episode.patient_id.as_str())
            .or_default()
            .push(episode);
    }
    by_patient
}
