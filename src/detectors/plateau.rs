//! Plateau detection
//!
//! A bug whose weekly intensity has not moved for several weeks even though
//! the user keeps applying fixes for it.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::PatternDetector;
use crate::config::DetectorConfig;
use crate::types::{
    AnalyticsEvent, BugIntensity, DetectedPattern, EventType, PatternSeverity, PatternType,
    WeeklyDiagnostic,
};

/// Unchanged-intensity-despite-effort detector
#[derive(Debug, Clone)]
pub struct PlateauDetector {
    weeks: usize,
    min_applied: usize,
}

impl PlateauDetector {
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            weeks: config.plateau_weeks,
            min_applied: config.plateau_min_applied,
        }
    }

    /// Intensity shared by every week in the span, if it never changed
    fn flat_intensity(span: &[WeeklyDiagnostic], bug_id: Uuid) -> Option<BugIntensity> {
        let first = span.first()?.response_for(bug_id)?.intensity;
        span.iter()
            .all(|d| d.response_for(bug_id).map(|r| r.intensity) == Some(first))
            .then_some(first)
    }
}

impl PatternDetector for PlateauDetector {
    fn pattern_type(&self) -> PatternType {
        PatternType::Plateau
    }

    fn minimum_data_points(&self) -> usize {
        self.min_applied
    }

    fn analyze(
        &self,
        events: &[AnalyticsEvent],
        diagnostics: &[WeeklyDiagnostic],
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Option<DetectedPattern> {
        if diagnostics.len() < self.weeks {
            return None;
        }
        let span = &diagnostics[..self.weeks];
        let span_start = span.last()?.week_starting.and_hms_opt(0, 0, 0)?.and_utc();

        let mut bug_ids: Vec<Uuid> = span[0].responses.iter().map(|r| r.bug_id).collect();
        bug_ids.sort();

        for bug_id in bug_ids {
            let Some(intensity) = Self::flat_intensity(span, bug_id) else {
                continue;
            };
            if intensity == BugIntensity::Quiet {
                continue;
            }

            let applied = events
                .iter()
                .filter(|e| {
                    e.event_type == EventType::FixApplied
                        && e.bug_id == Some(bug_id)
                        && e.timestamp >= span_start
                        && e.timestamp <= now
                })
                .count();
            if applied < self.min_applied {
                continue;
            }

            let level = match intensity {
                BugIntensity::Loud => "loud",
                _ => "present",
            };

            return Some(
                DetectedPattern::new(
                    user_id,
                    PatternType::Plateau,
                    PatternSeverity::Observation,
                    "Progress has stalled",
                    format!(
                        "This bug has stayed {level} for {} weeks while you applied {applied} fixes. \
                         It may be time to try a different fix.",
                        self.weeks
                    ),
                    now,
                )
                .with_bugs([bug_id])
                .with_data_points(applied as u32),
            );
        }

        None
    }
}
