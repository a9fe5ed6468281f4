//! Fusion configuration.
//!
//! Every knob the engine honors lives here as an explicit, immutable value
//! passed to each component. There is no module-level mutable state; two
//! engines with different configs can run side by side in the same process.

use serde::{Deserialize, Serialize};

use crate::fusion::FusionError;
use crate::models::enums::EventType;

/// Default symmetric assignment window (days). Presets of 14 and 45 are
/// also common in study protocols.
pub const DEFAULT_TIME_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_PREOP_WINDOW_DAYS: i64 = 90;
pub const DEFAULT_POSTOP_WINDOW_DAYS: i64 = 365;

/// Parameters for one fusion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Symmetric window: an event belongs to an episode when
    /// `|event_date - index_event_date| <= time_window_days`.
    pub time_window_days: i64,
    /// Event types eligible to anchor an episode, in priority order.
    /// Position in this list is the episode's `priority_rank`.
    pub index_event_types: Vec<EventType>,
    /// Days before a surgery within which an episode counts as pre-operative.
    pub preop_window_days: i64,
    /// Days after a surgery within which an episode counts as post-operative.
    pub postop_window_days: i64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            time_window_days: DEFAULT_TIME_WINDOW_DAYS,
            index_event_types: vec![
                EventType::Surgery,
                EventType::FnaBiopsy,
                EventType::MolecularTest,
                EventType::MajorImaging,
            ],
            preop_window_days: DEFAULT_PREOP_WINDOW_DAYS,
            postop_window_days: DEFAULT_POSTOP_WINDOW_DAYS,
        }
    }
}

impl FusionConfig {
    /// Default config with a different assignment window.
    pub fn with_window(time_window_days: i64) -> Self {
        Self {
            time_window_days,
            ..Self::default()
        }
    }

    /// Priority rank of an index-eligible event type (position in the
    /// configured order), or None for non-eligible types.
    pub fn priority_rank(&self, event_type: EventType) -> Option<usize> {
        self.index_event_types.iter().position(|t| *t == event_type)
    }

    /// Reject structurally unusable configs before a run starts.
    pub fn validate(&self) -> Result<(), FusionError> {
        if self.time_window_days <= 0 {
            return Err(FusionError::InvalidConfig(format!(
                "time_window_days must be positive, got {}",
                self.time_window_days
            )));
        }
        if self.preop_window_days < 0 || self.postop_window_days < 0 {
            return Err(FusionError::InvalidConfig(
                "surgery windows must be non-negative".into(),
            ));
        }
        if self.index_event_types.is_empty() {
            return Err(FusionError::InvalidConfig(
                "index_event_types must not be empty".into(),
            ));
        }
        for (i, t) in self.index_event_types.iter().enumerate() {
            if self.index_event_types[..i].contains(t) {
                return Err(FusionError::InvalidConfig(format!(
                    "duplicate index event type: {}",
                    t.as_str()
                )));
            }
        }
        Ok(())
    }
}
