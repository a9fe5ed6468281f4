//! Epifuse fuses heterogeneous clinical diagnostic events into diagnostic
//! episodes: temporal clusters anchored on a clinically significant index
//! event, each with a model-ready feature record.
//!
//! The library is a pure, in-memory batch transform. Build an
//! [`fusion::EventSnapshot`] from whatever source you have, run it through a
//! [`fusion::FusionEngine`], audit the result with [`fusion::validate`], and
//! optionally persist the output tables with [`store::persist_outcome`].

pub mod config;
pub mod fusion;
pub mod models;
pub mod store;

use tracing_subscriber::EnvFilter;

pub use config::FusionConfig;
pub use fusion::{FusionEngine, FusionError, FusionOutcome, ValidationReport};

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for binaries and test harnesses embedding the engine.
/// Honors `RUST_LOG`; falls back to info-level output for this crate.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("epifuse=info")),
        )
        .init();
}
