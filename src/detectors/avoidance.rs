//! Avoidance detection
//!
//! Flags a bug whose assigned fixes are skipped materially more often than
//! they are applied.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::PatternDetector;
use crate::config::DetectorConfig;
use crate::types::{
    AnalyticsEvent, DetectedPattern, EventType, PatternSeverity, PatternType, WeeklyDiagnostic,
};

#[derive(Debug, Default, Clone, Copy)]
struct FixTally {
    skipped: u32,
    applied: u32,
}

impl FixTally {
    fn sample(&self) -> u32 {
        self.skipped + self.applied
    }

    fn skip_rate(&self) -> f64 {
        if self.sample() == 0 {
            return 0.0;
        }
        self.skipped as f64 / self.sample() as f64
    }
}

/// Skip-vs-apply detector
#[derive(Debug, Clone)]
pub struct AvoidanceDetector {
    min_points: usize,
    skip_ratio: f64,
    window_days: i64,
}

impl AvoidanceDetector {
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            min_points: config.avoidance_min_points,
            skip_ratio: config.avoidance_skip_ratio,
            window_days: config.trailing_window_days,
        }
    }
}

impl PatternDetector for AvoidanceDetector {
    fn pattern_type(&self) -> PatternType {
        PatternType::Avoidance
    }

    fn minimum_data_points(&self) -> usize {
        self.min_points
    }

    fn analyze(
        &self,
        events: &[AnalyticsEvent],
        _diagnostics: &[WeeklyDiagnostic],
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Option<DetectedPattern> {
        let cutoff = now - Duration::days(self.window_days);

        let mut tallies: BTreeMap<Uuid, FixTally> = BTreeMap::new();
        for event in events
            .iter()
            .filter(|e| e.timestamp > cutoff && e.timestamp <= now)
        {
            let Some(bug_id) = event.bug_id else { continue };
            match event.event_type {
                EventType::FixSkipped => tallies.entry(bug_id).or_default().skipped += 1,
                EventType::FixApplied => tallies.entry(bug_id).or_default().applied += 1,
                _ => {}
            }
        }

        // Worst offender wins; BTreeMap order keeps ties deterministic
        let mut worst: Option<(Uuid, FixTally)> = None;
        for (bug_id, tally) in tallies {
            let qualifies = tally.sample() as usize >= self.min_points
                && tally.skipped > 0
                && tally.skipped as f64 >= self.skip_ratio * tally.applied as f64;
            if !qualifies {
                continue;
            }
            if worst.map_or(true, |(_, w)| tally.skip_rate() > w.skip_rate()) {
                worst = Some((bug_id, tally));
            }
        }

        let (bug_id, tally) = worst?;
        let pct = tally.skip_rate() * 100.0;

        Some(
            DetectedPattern::new(
                user_id,
                PatternType::Avoidance,
                PatternSeverity::Insight,
                "You keep skipping this fix",
                format!(
                    "Skipped {} of the last {} fixes ({:.0}% skip rate, {} skipped vs {} applied).",
                    tally.skipped,
                    tally.sample(),
                    pct,
                    tally.skipped,
                    tally.applied
                ),
                now,
            )
            .with_bugs([bug_id])
            .with_data_points(tally.sample()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{event, events, t0};

    fn detector() -> AvoidanceDetector {
        AvoidanceDetector::from_config(&DetectorConfig::default())
    }

    fn history(bug: Uuid, user: Uuid, skipped: usize, applied: usize) -> Vec<AnalyticsEvent> {
        let start = t0() - Duration::days(10);
        let mut history = events(user, EventType::FixSkipped, Some(bug), start, skipped, Duration::hours(5));
        history.extend(events(user, EventType::FixApplied, Some(bug), start, applied, Duration::hours(7)));
        history
    }

    #[test]
    fn test_flags_skip_heavy_bug() {
        let user = Uuid::new_v4();
        let bug = Uuid::new_v4();
        let history = history(bug, user, 6, 2);

        let pattern = detector().analyze(&history, &[], user, t0()).unwrap();

        assert_eq!(pattern.pattern_type, PatternType::Avoidance);
        assert_eq!(pattern.severity, PatternSeverity::Insight);
        assert!(pattern.related_bug_ids.contains(&bug));
        assert_eq!(pattern.data_points, 8);
        assert!(pattern.body.contains("75%"));
    }

    #[test]
    fn test_balanced_history_is_not_avoidance() {
        let user = Uuid::new_v4();
        let bug = Uuid::new_v4();
        // 4 skipped vs 3 applied is below 1.5x
        let history = history(bug, user, 4, 3);

        assert!(detector().analyze(&history, &[], user, t0()).is_none());
    }

    #[test]
    fn test_ratio_boundary_is_inclusive() {
        let user = Uuid::new_v4();
        let bug = Uuid::new_v4();
        let history = history(bug, user, 3, 2);

        assert!(detector().analyze(&history, &[], user, t0()).is_some());
    }

    #[test]
    fn test_requires_minimum_sample() {
        let user = Uuid::new_v4();
        let bug = Uuid::new_v4();
        let history = history(bug, user, 4, 0);

        assert!(detector().analyze(&history, &[], user, t0()).is_none());
    }

    #[test]
    fn test_ignores_events_outside_window() {
        let user = Uuid::new_v4();
        let bug = Uuid::new_v4();
        let old = t0() - Duration::days(45);
        let history = events(user, EventType::FixSkipped, Some(bug), old, 8, Duration::hours(1));

        assert!(detector().analyze(&history, &[], user, t0()).is_none());
    }

    #[test]
    fn test_picks_highest_skip_rate() {
        let user = Uuid::new_v4();
        let mild = Uuid::new_v4();
        let severe = Uuid::new_v4();
        let mut all = history(mild, user, 6, 3);
        all.extend(history(severe, user, 6, 0));
        all.push(event(user, EventType::FixAssigned, Some(severe), t0() - Duration::days(1)));

        let pattern = detector().analyze(&all, &[], user, t0()).unwrap();
        assert!(pattern.related_bug_ids.contains(&severe));
        assert!(!pattern.related_bug_ids.contains(&mild));
    }
}
