//! Temporal crash clustering
//!
//! Looks for crashes concentrated in one part of the day (4-hour blocks) or on
//! one weekday.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::{recent_of_type, PatternDetector};
use crate::config::DetectorConfig;
use crate::types::{
    AnalyticsEvent, DetectedPattern, EventType, PatternSeverity, PatternType, WeeklyDiagnostic,
};

const BLOCK_HOURS: u8 = 4;

const BLOCK_LABELS: [&str; 6] = [
    "late at night (00:00-04:00)",
    "early in the morning (04:00-08:00)",
    "in the morning (08:00-12:00)",
    "in the afternoon (12:00-16:00)",
    "in the evening (16:00-20:00)",
    "at night (20:00-24:00)",
];

const WEEKDAY_LABELS: [&str; 7] = [
    "Mondays",
    "Tuesdays",
    "Wednesdays",
    "Thursdays",
    "Fridays",
    "Saturdays",
    "Sundays",
];

#[derive(Debug, Clone, Copy)]
enum Bucket {
    Block(usize),
    Weekday(usize),
}

impl Bucket {
    fn of_block(event: &AnalyticsEvent) -> usize {
        (event.hour_of_day.min(23) / BLOCK_HOURS) as usize
    }

    fn of_weekday(event: &AnalyticsEvent) -> usize {
        (event.day_of_week.clamp(1, 7) - 1) as usize
    }

    fn contains(self, event: &AnalyticsEvent) -> bool {
        match self {
            Bucket::Block(i) => Self::of_block(event) == i,
            Bucket::Weekday(i) => Self::of_weekday(event) == i,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Bucket::Block(i) => BLOCK_LABELS[i],
            Bucket::Weekday(i) => WEEKDAY_LABELS[i],
        }
    }
}

/// Crash time-of-day / weekday detector
#[derive(Debug, Clone)]
pub struct TemporalCrashDetector {
    min_crashes: usize,
    share: f64,
    window_days: i64,
}

impl TemporalCrashDetector {
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            min_crashes: config.temporal_min_crashes,
            share: config.temporal_share,
            window_days: config.trailing_window_days,
        }
    }

    /// Index and count of the fullest bucket, lowest index on ties
    fn busiest(counts: &[usize]) -> (usize, usize) {
        counts
            .iter()
            .enumerate()
            .fold((0, 0), |best, (i, &c)| if c > best.1 { (i, c) } else { best })
    }
}

impl PatternDetector for TemporalCrashDetector {
    fn pattern_type(&self) -> PatternType {
        PatternType::TemporalCrash
    }

    fn minimum_data_points(&self) -> usize {
        self.min_crashes
    }

    fn analyze(
        &self,
        events: &[AnalyticsEvent],
        _diagnostics: &[WeeklyDiagnostic],
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Option<DetectedPattern> {
        let crashes: Vec<&AnalyticsEvent> =
            recent_of_type(events, EventType::CrashLogged, now, self.window_days).collect();
        let total = crashes.len();
        if total < self.min_crashes {
            return None;
        }

        let mut by_block = [0usize; BLOCK_LABELS.len()];
        let mut by_weekday = [0usize; WEEKDAY_LABELS.len()];
        for crash in &crashes {
            by_block[Bucket::of_block(crash)] += 1;
            by_weekday[Bucket::of_weekday(crash)] += 1;
        }

        let needed = self.share * total as f64;

        let (block, block_count) = Self::busiest(&by_block);
        let (bucket, count) = if block_count as f64 >= needed {
            (Bucket::Block(block), block_count)
        } else {
            let (day, day_count) = Self::busiest(&by_weekday);
            if (day_count as f64) < needed {
                return None;
            }
            (Bucket::Weekday(day), day_count)
        };
        let label = bucket.label();

        let bugs: BTreeSet<Uuid> = crashes
            .iter()
            .filter(|e| bucket.contains(e))
            .filter_map(|e| e.bug_id)
            .collect();

        Some(
            DetectedPattern::new(
                user_id,
                PatternType::TemporalCrash,
                PatternSeverity::Insight,
                format!("Crashes cluster {label}"),
                format!(
                    "{count} of your last {total} crashes happened {label}. \
                     Plan a fix ahead of that window."
                ),
                now,
            )
            .with_bugs(bugs)
            .with_data_points(total as u32),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{event, t0};
    use chrono::{Duration, TimeZone};

    fn detector() -> TemporalCrashDetector {
        TemporalCrashDetector::from_config(&DetectorConfig::default())
    }

    fn crash_at(user: Uuid, bug: Uuid, y: i32, m: u32, d: u32, h: u32) -> AnalyticsEvent {
        event(
            user,
            EventType::CrashLogged,
            Some(bug),
            Utc.with_ymd_and_hms(y, m, d, h, 30, 0).unwrap(),
        )
    }

    #[test]
    fn test_late_night_cluster() {
        let user = Uuid::new_v4();
        let bug = Uuid::new_v4();
        let history = vec![
            crash_at(user, bug, 2024, 1, 2, 1),
            crash_at(user, bug, 2024, 1, 4, 2),
            crash_at(user, bug, 2024, 1, 6, 0),
            crash_at(user, bug, 2024, 1, 9, 3),
            crash_at(user, bug, 2024, 1, 10, 14),
        ];

        let pattern = detector().analyze(&history, &[], user, t0()).unwrap();

        assert_eq!(pattern.pattern_type, PatternType::TemporalCrash);
        assert!(pattern.title.contains("late at night"));
        assert!(pattern.body.starts_with("4 of your last 5"));
        assert!(pattern.related_bug_ids.contains(&bug));
    }

    #[test]
    fn test_weekday_cluster_when_hours_spread() {
        let user = Uuid::new_v4();
        let bug = Uuid::new_v4();
        // Saturdays 2023-12-23, 12-30, 2024-01-06, 01-13 at different hours, one Tuesday
        let history = vec![
            crash_at(user, bug, 2023, 12, 23, 1),
            crash_at(user, bug, 2023, 12, 30, 9),
            crash_at(user, bug, 2024, 1, 6, 13),
            crash_at(user, bug, 2024, 1, 13, 18),
            crash_at(user, bug, 2024, 1, 9, 22),
        ];

        let pattern = detector().analyze(&history, &[], user, t0()).unwrap();
        assert!(pattern.title.contains("Saturdays"));
    }

    #[test]
    fn test_spread_out_crashes_are_not_clustered() {
        let user = Uuid::new_v4();
        let bug = Uuid::new_v4();
        let history: Vec<AnalyticsEvent> = (0..6)
            .map(|i| {
                event(
                    user,
                    EventType::CrashLogged,
                    Some(bug),
                    t0() - Duration::days(1 + i) - Duration::hours(4 * i),
                )
            })
            .collect();

        assert!(detector().analyze(&history, &[], user, t0()).is_none());
    }

    #[test]
    fn test_too_few_crashes() {
        let user = Uuid::new_v4();
        let bug = Uuid::new_v4();
        let history = vec![
            crash_at(user, bug, 2024, 1, 2, 1),
            crash_at(user, bug, 2024, 1, 4, 1),
            crash_at(user, bug, 2024, 1, 6, 1),
        ];

        assert!(detector().analyze(&history, &[], user, t0()).is_none());
    }
}
