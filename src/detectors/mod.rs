//! Pattern detectors
//!
//! Each detector looks for one [`PatternType`] in a user's analytics events and
//! weekly diagnostics. Detectors are pure: everything they use, including the
//! reference time, is passed in, and they never touch storage. The
//! diagnostics engine runs them in order and owns cooldowns and persistence.
//!
//! Diagnostics are always handed over most recent first.

mod avoidance;
mod contextual;
mod correlated;
mod improvement;
mod plateau;
mod regression;
mod temporal;

pub use avoidance::AvoidanceDetector;
pub use contextual::ContextualSpikeDetector;
pub use correlated::CorrelatedBugsDetector;
pub use improvement::ImprovementDetector;
pub use plateau::PlateauDetector;
pub use regression::RegressionDetector;
pub use temporal::TemporalCrashDetector;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::DetectorConfig;
use crate::types::{AnalyticsEvent, DetectedPattern, EventType, PatternType, WeeklyDiagnostic};

/// Trait for pattern detectors
pub trait PatternDetector {
    /// Pattern type this detector produces
    fn pattern_type(&self) -> PatternType;

    /// Events required before the detector is worth running
    fn minimum_data_points(&self) -> usize;

    /// Inspect the history and return a pattern if the signal is present
    fn analyze(
        &self,
        events: &[AnalyticsEvent],
        diagnostics: &[WeeklyDiagnostic],
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Option<DetectedPattern>;
}

/// The built-in detectors, one per pattern type, in run order
pub fn default_detectors(config: &DetectorConfig) -> Vec<Box<dyn PatternDetector>> {
    vec![
        Box::new(RegressionDetector::new()),
        Box::new(AvoidanceDetector::from_config(config)),
        Box::new(TemporalCrashDetector::from_config(config)),
        Box::new(ContextualSpikeDetector::from_config(config)),
        Box::new(CorrelatedBugsDetector::from_config(config)),
        Box::new(PlateauDetector::from_config(config)),
        Box::new(ImprovementDetector::from_config(config)),
    ]
}

/// Events of `event_type` that happened within `window_days` before `now`
fn recent_of_type<'a>(
    events: &'a [AnalyticsEvent],
    event_type: EventType,
    now: DateTime<Utc>,
    window_days: i64,
) -> impl Iterator<Item = &'a AnalyticsEvent> {
    let cutoff = now - Duration::days(window_days);
    events
        .iter()
        .filter(move |e| e.event_type == event_type && e.timestamp > cutoff && e.timestamp <= now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_detectors_cover_every_type_once() {
        let detectors = default_detectors(&DetectorConfig::default());
        let types: HashSet<PatternType> = detectors.iter().map(|d| d.pattern_type()).collect();

        assert_eq!(detectors.len(), PatternType::ALL.len());
        for pattern_type in PatternType::ALL {
            assert!(types.contains(&pattern_type), "missing {pattern_type:?}");
        }
    }

    #[test]
    fn test_detectors_are_quiet_without_history() {
        let now = crate::testutil::t0();
        for detector in default_detectors(&DetectorConfig::default()) {
            assert!(detector.analyze(&[], &[], Uuid::new_v4(), now).is_none());
        }
    }
}
