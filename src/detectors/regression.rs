//! Self-reported regression
//!
//! A bug that was quiet for two straight weeks and is back this week. Crash
//! driven regressions of resolved bugs are raised by the lifecycle service.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::PatternDetector;
use crate::types::{
    AnalyticsEvent, BugIntensity, DetectedPattern, PatternSeverity, PatternType, WeeklyDiagnostic,
};

/// Quiet weeks that must precede the relapse
const QUIET_WEEKS_BEFORE: usize = 2;

/// Quiet-then-back detector
#[derive(Debug, Clone, Default)]
pub struct RegressionDetector;

impl RegressionDetector {
    pub fn new() -> Self {
        Self
    }
}

impl PatternDetector for RegressionDetector {
    fn pattern_type(&self) -> PatternType {
        PatternType::Regression
    }

    fn minimum_data_points(&self) -> usize {
        1
    }

    fn analyze(
        &self,
        _events: &[AnalyticsEvent],
        diagnostics: &[WeeklyDiagnostic],
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Option<DetectedPattern> {
        let (latest, previous) = diagnostics.split_first()?;
        if previous.len() < QUIET_WEEKS_BEFORE {
            return None;
        }
        let previous = &previous[..QUIET_WEEKS_BEFORE];

        let mut relapsed: Vec<(Uuid, BugIntensity)> = latest
            .responses
            .iter()
            .filter(|r| r.intensity != BugIntensity::Quiet)
            .filter(|r| {
                previous.iter().all(|d| {
                    d.response_for(r.bug_id).map(|p| p.intensity) == Some(BugIntensity::Quiet)
                })
            })
            .map(|r| (r.bug_id, r.intensity))
            .collect();
        // Loudest first, then by id
        relapsed.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let &(_, intensity) = relapsed.first()?;
        let level = if intensity == BugIntensity::Loud { "loud" } else { "present" };

        Some(
            DetectedPattern::new(
                user_id,
                PatternType::Regression,
                PatternSeverity::Alert,
                "A quiet bug is back",
                format!(
                    "After {QUIET_WEEKS_BEFORE} quiet weeks this bug was {level} again this week."
                ),
                now,
            )
            .with_bugs(relapsed.iter().map(|&(id, _)| id))
            .with_data_points((QUIET_WEEKS_BEFORE + 1) as u32),
        )
    }
}
