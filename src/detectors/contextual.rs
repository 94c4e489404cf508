//! Contextual spike detection
//!
//! Finds a context (reported with weekly diagnostics) that keeps showing up
//! whenever a bug is loud.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::PatternDetector;
use crate::config::DetectorConfig;
use crate::types::{
    AnalyticsEvent, BugIntensity, DetectedPattern, PatternSeverity, PatternType, WeeklyDiagnostic,
};

/// Loud-responses-by-context detector
#[derive(Debug, Clone)]
pub struct ContextualSpikeDetector {
    min_loud: usize,
    window_days: i64,
}

impl ContextualSpikeDetector {
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            min_loud: config.contextual_min_loud,
            window_days: config.trailing_window_days,
        }
    }
}

impl PatternDetector for ContextualSpikeDetector {
    fn pattern_type(&self) -> PatternType {
        PatternType::ContextualSpike
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
        let cutoff = now - Duration::days(self.window_days);

        let mut total_loud = 0usize;
        let mut by_context: BTreeMap<String, (usize, BTreeSet<Uuid>)> = BTreeMap::new();
        for response in diagnostics
            .iter()
            .filter(|d| d.completed_at > cutoff && d.completed_at <= now)
            .flat_map(|d| d.responses.iter())
            .filter(|r| r.intensity == BugIntensity::Loud)
        {
            total_loud += 1;
            let Some(context) = response.primary_context.as_deref() else {
                continue;
            };
            let context = context.trim().to_lowercase();
            if context.is_empty() {
                continue;
            }
            let entry = by_context.entry(context).or_default();
            entry.0 += 1;
            entry.1.insert(response.bug_id);
        }

        let (context, (count, bugs)) = by_context
            .into_iter()
            .fold(None::<(String, (usize, BTreeSet<Uuid>))>, |best, candidate| {
                match best {
                    Some(b) if b.1 .0 >= candidate.1 .0 => Some(b),
                    _ => Some(candidate),
                }
            })?;

        if count < self.min_loud || count * 2 < total_loud {
            return None;
        }

        Some(
            DetectedPattern::new(
                user_id,
                PatternType::ContextualSpike,
                PatternSeverity::Insight,
                format!("Loud weeks keep pointing at \"{context}\""),
                format!(
                    "{count} of {total_loud} loud ratings in recent weeks named \"{context}\" \
                     as the main context."
                ),
                now,
            )
            .with_bugs(bugs)
            .with_data_points(count as u32),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{t0, weekly_history};

    fn detector() -> ContextualSpikeDetector {
        ContextualSpikeDetector::from_config(&DetectorConfig::default())
    }

    fn with_context(
        mut history: Vec<WeeklyDiagnostic>,
        contexts: &[Option<&str>],
    ) -> Vec<WeeklyDiagnostic> {
        // contexts are given oldest first
        for (diagnostic, context) in history.iter_mut().rev().zip(contexts) {
            for response in &mut diagnostic.responses {
                response.primary_context = context.map(str::to_string);
            }
        }
        history
    }

    #[test]
    fn test_repeated_context_is_spike() {
        let user = Uuid::new_v4();
        let bug = Uuid::new_v4();
        let loud = [(bug, BugIntensity::Loud)];
        let history = with_context(
            weekly_history(user, &[&loud, &loud, &loud, &loud]),
            &[Some("Work"), Some("work "), Some("home"), Some("WORK")],
        );
        let now = t0() + Duration::weeks(3) + Duration::days(1);

        let pattern = detector().analyze(&[], &history, user, now).unwrap();

        assert_eq!(pattern.pattern_type, PatternType::ContextualSpike);
        assert!(pattern.title.contains("\"work\""));
        assert_eq!(pattern.data_points, 3);
        assert!(pattern.related_bug_ids.contains(&bug));
    }

    #[test]
    fn test_scattered_contexts_are_not_spike() {
        let user = Uuid::new_v4();
        let bug = Uuid::new_v4();
        let loud = [(bug, BugIntensity::Loud)];
        let history = with_context(
            weekly_history(user, &[&loud, &loud, &loud, &loud]),
            &[Some("work"), Some("home"), Some("commute"), Some("family")],
        );
        let now = t0() + Duration::weeks(3) + Duration::days(1);

        assert!(detector().analyze(&[], &history, user, now).is_none());
    }

    #[test]
    fn test_quiet_weeks_do_not_count() {
        let user = Uuid::new_v4();
        let bug = Uuid::new_v4();
        let quiet = [(bug, BugIntensity::Quiet)];
        let history = with_context(
            weekly_history(user, &[&quiet, &quiet, &quiet, &quiet]),
            &[Some("work"), Some("work"), Some("work"), Some("work")],
        );
        let now = t0() + Duration::weeks(3) + Duration::days(1);

        assert!(detector().analyze(&[], &history, user, now).is_none());
    }
}
