//! Improvement detection
//!
//! Positive signal: a bug's weekly intensity has trended down without ever
//! bouncing back up.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::PatternDetector;
use crate::config::DetectorConfig;
use crate::types::{
    AnalyticsEvent, BugIntensity, DetectedPattern, PatternSeverity, PatternType, WeeklyDiagnostic,
};

/// Downward-trend detector
#[derive(Debug, Clone)]
pub struct ImprovementDetector {
    weeks: usize,
}

impl ImprovementDetector {
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            weeks: config.improvement_weeks,
        }
    }

    /// Levels oldest first, or `None` if any week lacks a response
    fn levels(span: &[WeeklyDiagnostic], bug_id: Uuid) -> Option<Vec<u8>> {
        span.iter()
            .rev()
            .map(|d| d.response_for(bug_id).map(|r| r.intensity.level()))
            .collect()
    }
}

impl PatternDetector for ImprovementDetector {
    fn pattern_type(&self) -> PatternType {
        PatternType::Improvement
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
        if diagnostics.len() < self.weeks {
            return None;
        }
        let span = &diagnostics[..self.weeks];

        let mut best: Option<(Uuid, u8, u8)> = None;
        let mut bug_ids: Vec<Uuid> = span[0].responses.iter().map(|r| r.bug_id).collect();
        bug_ids.sort();

        for bug_id in bug_ids {
            let Some(levels) = Self::levels(span, bug_id) else {
                continue;
            };
            let never_rises = levels.windows(2).all(|w| w[1] <= w[0]);
            let (first, last) = (levels[0], levels[levels.len() - 1]);
            if !never_rises || last >= first {
                continue;
            }
            if best.map_or(true, |(_, f, l)| first - last > f - l) {
                best = Some((bug_id, first, last));
            }
        }

        let (bug_id, first, last) = best?;
        let describe = |level: u8| match level {
            2 => "loud",
            1 => "present",
            _ => "quiet",
        };
        let now_quiet = last == BugIntensity::Quiet.level();

        Some(
            DetectedPattern::new(
                user_id,
                PatternType::Improvement,
                PatternSeverity::Observation,
                if now_quiet { "A bug has gone quiet" } else { "A bug is getting quieter" },
                format!(
                    "Over {} weeks this bug went from {} to {} without slipping back.",
                    self.weeks,
                    describe(first),
                    describe(last)
                ),
                now,
            )
            .with_bugs([bug_id])
            .with_data_points(self.weeks as u32),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{t0, weekly_history};
    use chrono::Duration;

    fn detector() -> ImprovementDetector {
        ImprovementDetector::from_config(&DetectorConfig::default())
    }

    #[test]
    fn test_downward_trend() {
        let user = Uuid::new_v4();
        let bug = Uuid::new_v4();
        let history = weekly_history(
            user,
            &[
                &[(bug, BugIntensity::Loud)],
                &[(bug, BugIntensity::Present)],
                &[(bug, BugIntensity::Present)],
                &[(bug, BugIntensity::Quiet)],
            ],
        );

        let pattern = detector()
            .analyze(&[], &history, user, t0() + Duration::weeks(4))
            .unwrap();

        assert_eq!(pattern.pattern_type, PatternType::Improvement);
        assert_eq!(pattern.title, "A bug has gone quiet");
        assert!(pattern.body.contains("from loud to quiet"));
    }

    #[test]
    fn test_bounce_is_not_improvement() {
        let user = Uuid::new_v4();
        let bug = Uuid::new_v4();
        let history = weekly_history(
            user,
            &[
                &[(bug, BugIntensity::Loud)],
                &[(bug, BugIntensity::Quiet)],
                &[(bug, BugIntensity::Present)],
                &[(bug, BugIntensity::Quiet)],
            ],
        );

        assert!(detector()
            .analyze(&[], &history, user, t0() + Duration::weeks(4))
            .is_none());
    }

    #[test]
    fn test_flat_is_not_improvement() {
        let user = Uuid::new_v4();
        let bug = Uuid::new_v4();
        let present = [(bug, BugIntensity::Present)];
        let history = weekly_history(user, &[&present, &present, &present, &present]);

        assert!(detector()
            .analyze(&[], &history, user, t0() + Duration::weeks(4))
            .is_none());
    }

    #[test]
    fn test_needs_full_span() {
        let user = Uuid::new_v4();
        let bug = Uuid::new_v4();
        let history = weekly_history(
            user,
            &[&[(bug, BugIntensity::Loud)], &[(bug, BugIntensity::Quiet)]],
        );

        assert!(detector()
            .analyze(&[], &history, user, t0() + Duration::weeks(2))
            .is_none());
    }
}
