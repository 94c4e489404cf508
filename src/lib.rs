//! Bugloop - On-device behavioral analytics and lifecycle engine
//!
//! Bugloop tracks recurring self-defeating behaviors ("bugs") and turns a
//! user's history into three kinds of output:
//!
//! - **Diagnostics**: pattern detectors scan analytics events and weekly
//!   self-reports, gated by a per-type cooldown → detected patterns
//! - **Lifecycle**: a four-state machine (identified → active → stable →
//!   resolved) driven by quiet weeks and crash bursts
//! - **Streaks**: consecutive engaged days with a weekly freeze token
//!
//! Storage stays outside the crate behind the traits in [`repository`].

pub mod config;
pub mod detectors;
pub mod diagnostics;
pub mod error;
pub mod lifecycle;
pub mod recommendations;
pub mod repository;
pub mod streak;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{DetectorConfig, EngineConfig};
pub use detectors::{default_detectors, PatternDetector};
pub use diagnostics::DiagnosticEngine;
pub use error::{EngineError, Result};
pub use lifecycle::BugLifecycleService;
pub use recommendations::{recommendations_for, ActionType, Recommendation};
pub use repository::MemoryStore;
pub use streak::StreakService;

/// Bugloop version
pub const BUGLOOP_VERSION: &str = env!("CARGO_PKG_VERSION");
