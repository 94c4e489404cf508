//! Cross-bug co-occurrence
//!
//! Two bugs that crash on the same calendar day again and again probably feed
//! each other.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::{recent_of_type, PatternDetector};
use crate::config::DetectorConfig;
use crate::types::{
    AnalyticsEvent, DetectedPattern, EventType, PatternSeverity, PatternType, WeeklyDiagnostic,
};

/// Same-day crash co-occurrence detector
#[derive(Debug, Clone)]
pub struct CorrelatedBugsDetector {
    min_days: usize,
    window_days: i64,
}

impl CorrelatedBugsDetector {
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            min_days: config.correlated_min_days,
            window_days: config.trailing_window_days,
        }
    }
}

impl PatternDetector for CorrelatedBugsDetector {
    fn pattern_type(&self) -> PatternType {
        PatternType::CorrelatedBugs
    }

    fn minimum_data_points(&self) -> usize {
        // Two crashes per shared day
        self.min_days.saturating_mul(2)
    }

    fn analyze(
        &self,
        events: &[AnalyticsEvent],
        _diagnostics: &[WeeklyDiagnostic],
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Option<DetectedPattern> {
        let mut bugs_by_day: BTreeMap<NaiveDate, BTreeSet<Uuid>> = BTreeMap::new();
        for crash in recent_of_type(events, EventType::CrashLogged, now, self.window_days) {
            if let Some(bug_id) = crash.bug_id {
                bugs_by_day
                    .entry(crash.timestamp.date_naive())
                    .or_default()
                    .insert(bug_id);
            }
        }

        let mut shared_days: BTreeMap<(Uuid, Uuid), usize> = BTreeMap::new();
        for bugs in bugs_by_day.values() {
            let bugs: Vec<Uuid> = bugs.iter().copied().collect();
            for (i, &a) in bugs.iter().enumerate() {
                for &b in &bugs[i + 1..] {
                    *shared_days.entry((a, b)).or_default() += 1;
                }
            }
        }

        let ((a, b), days) = shared_days
            .into_iter()
            .filter(|&(_, days)| days >= self.min_days)
            .fold(None::<((Uuid, Uuid), usize)>, |best, candidate| match best {
                Some(b) if b.1 >= candidate.1 => Some(b),
                _ => Some(candidate),
            })?;

        Some(
            DetectedPattern::new(
                user_id,
                PatternType::CorrelatedBugs,
                PatternSeverity::Observation,
                "Two bugs tend to crash together",
                format!(
                    "On {days} days in the last {} days both bugs crashed on the same day.",
                    self.window_days
                ),
                now,
            )
            .with_bugs([a, b])
            .with_data_points(days as u32),
        )
    }
}
