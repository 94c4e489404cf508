//! Diagnostics engine
//!
//! Runs the pattern detectors over a user's history, enforces the per-type
//! cooldown, persists what they find, and picks which pattern to surface.
//!
//! Pipeline: load events + diagnostics → for each detector: data gate →
//! cooldown gate → analyze → persist

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::detectors::{default_detectors, PatternDetector};
use crate::error::Result;
use crate::repository::{
    AnalyticsEventRepository, PatternRepository, UserRepository, WeeklyDiagnosticRepository,
};
use crate::types::DetectedPattern;

/// Orchestrates pattern detection for a user
pub struct DiagnosticEngine<'a> {
    events: &'a dyn AnalyticsEventRepository,
    diagnostics: &'a dyn WeeklyDiagnosticRepository,
    patterns: &'a dyn PatternRepository,
    users: &'a dyn UserRepository,
    detectors: Vec<Box<dyn PatternDetector>>,
    config: EngineConfig,
}

impl<'a> DiagnosticEngine<'a> {
    /// Create an engine with the default configuration and detector set
    pub fn new(
        events: &'a dyn AnalyticsEventRepository,
        diagnostics: &'a dyn WeeklyDiagnosticRepository,
        patterns: &'a dyn PatternRepository,
        users: &'a dyn UserRepository,
    ) -> Self {
        Self::build(events, diagnostics, patterns, users, EngineConfig::default())
    }

    /// Create an engine with a specific configuration.
    ///
    /// Fails with `InvalidConfig` if the configuration does not validate.
    pub fn with_config(
        events: &'a dyn AnalyticsEventRepository,
        diagnostics: &'a dyn WeeklyDiagnosticRepository,
        patterns: &'a dyn PatternRepository,
        users: &'a dyn UserRepository,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(events, diagnostics, patterns, users, config))
    }

    fn build(
        events: &'a dyn AnalyticsEventRepository,
        diagnostics: &'a dyn WeeklyDiagnosticRepository,
        patterns: &'a dyn PatternRepository,
        users: &'a dyn UserRepository,
        config: EngineConfig,
    ) -> Self {
        let detectors = default_detectors(&config.detectors);
        Self {
            events,
            diagnostics,
            patterns,
            users,
            detectors,
            config,
        }
    }

    /// Replace the detector list (run in the given order)
    pub fn with_detectors(mut self, detectors: Vec<Box<dyn PatternDetector>>) -> Self {
        self.detectors = detectors;
        self
    }

    /// Run every detector for the user and return newly persisted patterns
    pub fn run_diagnostics(&self, user_id: Uuid) -> Result<Vec<DetectedPattern>> {
        self.run_diagnostics_at(user_id, Utc::now())
    }

    /// [`run_diagnostics`](Self::run_diagnostics) with an explicit reference time
    pub fn run_diagnostics_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<DetectedPattern>> {
        let events = self.events.get_for_user(user_id)?;
        let diagnostics = self.diagnostics.get_for_user(user_id)?;
        let cooldown_start = now - Duration::days(self.config.pattern_cooldown_days);

        info!(
            %user_id,
            events = events.len(),
            diagnostics = diagnostics.len(),
            "running diagnostics"
        );

        let mut found = Vec::new();
        for detector in &self.detectors {
            let pattern_type = detector.pattern_type();

            if events.len() < detector.minimum_data_points() {
                debug!(?pattern_type, needed = detector.minimum_data_points(), "not enough events");
                continue;
            }

            let recent = self
                .patterns
                .get_recent_by_type(pattern_type, user_id, cooldown_start)?;
            if !recent.is_empty() {
                debug!(?pattern_type, "pattern type in cooldown");
                continue;
            }

            if let Some(pattern) = detector.analyze(&events, &diagnostics, user_id, now) {
                self.patterns.save(&pattern)?;
                info!(?pattern_type, severity = ?pattern.severity, id = %pattern.id, "pattern detected");
                found.push(pattern);
            }
        }

        if let Some(mut user) = self.users.get_by_id(user_id)? {
            user.last_diagnostics_run_at = Some(now);
            self.users.save(&user)?;
        }

        info!(%user_id, detected = found.len(), "diagnostics finished");
        Ok(found)
    }

    /// Whether the scheduled diagnostics interval has elapsed
    pub fn should_run_diagnostics(&self, user_id: Uuid) -> Result<bool> {
        self.should_run_diagnostics_at(user_id, Utc::now())
    }

    /// [`should_run_diagnostics`](Self::should_run_diagnostics) with an explicit reference time
    pub fn should_run_diagnostics_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let last_run = self
            .users
            .get_by_id(user_id)?
            .and_then(|u| u.last_diagnostics_run_at);

        Ok(match last_run {
            None => true,
            Some(at) => now - at > Duration::days(self.config.diagnostics_interval_days),
        })
    }

    /// Highest-severity unviewed pattern, newest first among equals
    pub fn get_pattern_to_surface(&self, user_id: Uuid) -> Result<Option<DetectedPattern>> {
        let unviewed = self.patterns.get_unviewed(user_id)?;
        Ok(rank_for_surfacing(unviewed).into_iter().next())
    }

    /// Unviewed patterns in surfacing order
    pub fn unviewed_patterns(&self, user_id: Uuid) -> Result<Vec<DetectedPattern>> {
        Ok(rank_for_surfacing(self.patterns.get_unviewed(user_id)?))
    }

    /// Stamp `viewed_at`. No-op for unknown ids or already viewed patterns.
    pub fn mark_pattern_viewed(&self, pattern_id: Uuid) -> Result<()> {
        self.mark_pattern_viewed_at(pattern_id, Utc::now())
    }

    pub fn mark_pattern_viewed_at(&self, pattern_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let Some(mut pattern) = self.patterns.get_by_id(pattern_id)? else {
            return Ok(());
        };
        if pattern.viewed_at.is_none() {
            pattern.viewed_at = Some(now);
            self.patterns.save(&pattern)?;
        }
        Ok(())
    }

    /// Stamp `dismissed_at`. No-op for unknown ids or already dismissed patterns.
    pub fn dismiss_pattern(&self, pattern_id: Uuid) -> Result<()> {
        self.dismiss_pattern_at(pattern_id, Utc::now())
    }

    pub fn dismiss_pattern_at(&self, pattern_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let Some(mut pattern) = self.patterns.get_by_id(pattern_id)? else {
            return Ok(());
        };
        if pattern.dismissed_at.is_none() {
            pattern.dismissed_at = Some(now);
            self.patterns.save(&pattern)?;
        }
        Ok(())
    }
}

/// Sort by severity rank, then detection time (newest first), then id
fn rank_for_surfacing(mut patterns: Vec<DetectedPattern>) -> Vec<DetectedPattern> {
    patterns.sort_by(|a, b| {
        b.severity
            .rank()
            .cmp(&a.severity.rank())
            .then(b.detected_at.cmp(&a.detected_at))
            .then(a.id.cmp(&b.id))
    });
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;
    use crate::testutil::{events, seeded_store, t0};
    use crate::types::{EventType, PatternSeverity, PatternType, UserProfile, WeeklyDiagnostic};
    use pretty_assertions::assert_eq;

    fn engine(store: &MemoryStore) -> DiagnosticEngine<'_> {
        DiagnosticEngine::new(store, store, store, store)
    }

    /// Always reports a pattern of the given type
    struct Always(PatternType, usize);

    impl PatternDetector for Always {
        fn pattern_type(&self) -> PatternType {
            self.0
        }

        fn minimum_data_points(&self) -> usize {
            self.1
        }

        fn analyze(
            &self,
            _events: &[crate::types::AnalyticsEvent],
            _diagnostics: &[WeeklyDiagnostic],
            user_id: Uuid,
            now: DateTime<Utc>,
        ) -> Option<DetectedPattern> {
            Some(DetectedPattern::new(
                user_id,
                self.0,
                PatternSeverity::Insight,
                "always",
                "",
                now,
            ))
        }
    }

    fn seed_avoidance(store: &MemoryStore, user: Uuid) {
        let bug = Uuid::new_v4();
        let start = t0() - Duration::days(5);
        for e in events(user, EventType::FixSkipped, Some(bug), start, 6, Duration::hours(6)) {
            store.insert_event(e).unwrap();
        }
    }

    #[test]
    fn test_run_persists_patterns_and_stamps_user() {
        let (store, user) = seeded_store();
        seed_avoidance(&store, user.id);

        let found = engine(&store).run_diagnostics_at(user.id, t0()).unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pattern_type, PatternType::Avoidance);
        assert_eq!(store.pattern_count().unwrap(), 1);

        let user = UserRepository::get_by_id(&store, user.id).unwrap().unwrap();
        assert_eq!(user.last_diagnostics_run_at, Some(t0()));
    }

    #[test]
    fn test_cooldown_blocks_then_reopens() {
        let (store, user) = seeded_store();
        seed_avoidance(&store, user.id);
        let engine = engine(&store);

        let first = engine.run_diagnostics_at(user.id, t0()).unwrap();
        assert_eq!(first.len(), 1);

        // Within 14 days: suppressed, even once viewed and dismissed
        engine.mark_pattern_viewed_at(first[0].id, t0()).unwrap();
        engine.dismiss_pattern_at(first[0].id, t0()).unwrap();
        let second = engine
            .run_diagnostics_at(user.id, t0() + Duration::days(13))
            .unwrap();
        assert!(second.iter().all(|p| p.pattern_type != PatternType::Avoidance));

        // Window reopens after 14 days; keep the signal inside the trailing window
        for e in events(
            user.id,
            EventType::FixSkipped,
            first[0].related_bug_ids.iter().next().copied(),
            t0() + Duration::days(10),
            6,
            Duration::hours(6),
        ) {
            store.insert_event(e).unwrap();
        }
        let third = engine
            .run_diagnostics_at(user.id, t0() + Duration::days(14))
            .unwrap();
        assert_eq!(
            third.iter().filter(|p| p.pattern_type == PatternType::Avoidance).count(),
            1
        );
    }

    #[test]
    fn test_detector_gated_on_event_count() {
        let (store, user) = seeded_store();
        let engine = engine(&store).with_detectors(vec![Box::new(Always(PatternType::Plateau, 1))]);

        assert!(engine.run_diagnostics_at(user.id, t0()).unwrap().is_empty());

        for e in events(user.id, EventType::FixAssigned, None, t0(), 1, Duration::hours(1)) {
            store.insert_event(e).unwrap();
        }
        assert_eq!(engine.run_diagnostics_at(user.id, t0()).unwrap().len(), 1);
    }

    #[test]
    fn test_cooldown_is_per_type() {
        let (store, user) = seeded_store();
        let engine = engine(&store).with_detectors(vec![
            Box::new(Always(PatternType::Plateau, 0)),
            Box::new(Always(PatternType::Improvement, 0)),
        ]);

        store
            .insert_pattern(DetectedPattern::new(
                user.id,
                PatternType::Plateau,
                PatternSeverity::Observation,
                "earlier",
                "",
                t0() - Duration::days(3),
            ))
            .unwrap();

        let found = engine.run_diagnostics_at(user.id, t0()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pattern_type, PatternType::Improvement);
    }

    #[test]
    fn test_cooldown_is_per_user() {
        let (store, user) = seeded_store();
        let other = UserProfile::new(Uuid::new_v4());
        store.insert_user(other.clone()).unwrap();
        let engine = engine(&store).with_detectors(vec![Box::new(Always(PatternType::Plateau, 0))]);

        assert_eq!(engine.run_diagnostics_at(user.id, t0()).unwrap().len(), 1);
        assert_eq!(engine.run_diagnostics_at(other.id, t0()).unwrap().len(), 1);
    }

    #[test]
    fn test_storage_failure_propagates() {
        let (mut store, user) = seeded_store();
        store.fail_writes();
        let engine = DiagnosticEngine::new(&store, &store, &store, &store)
            .with_detectors(vec![Box::new(Always(PatternType::Plateau, 0))]);

        assert!(engine.run_diagnostics_at(user.id, t0()).is_err());
        assert_eq!(store.pattern_count().unwrap(), 0);
    }

    #[test]
    fn test_with_config_rejects_oversized_window() {
        let (store, _user) = seeded_store();
        let config = EngineConfig {
            pattern_cooldown_days: 1_000_000_000,
            ..EngineConfig::default()
        };

        let result = DiagnosticEngine::with_config(&store, &store, &store, &store, config);
        assert!(matches!(result, Err(crate::error::EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_should_run_diagnostics_schedule() {
        let (store, user) = seeded_store();
        let engine = engine(&store).with_detectors(vec![]);

        assert!(engine.should_run_diagnostics_at(user.id, t0()).unwrap());

        engine.run_diagnostics_at(user.id, t0()).unwrap();
        assert!(!engine.should_run_diagnostics_at(user.id, t0() + Duration::days(7)).unwrap());
        assert!(engine
            .should_run_diagnostics_at(user.id, t0() + Duration::days(7) + Duration::seconds(1))
            .unwrap());
    }

    #[test]
    fn test_alert_surfaces_over_earlier_observation() {
        let (store, user) = seeded_store();
        let observation = DetectedPattern::new(
            user.id,
            PatternType::Improvement,
            PatternSeverity::Observation,
            "observation",
            "",
            t0(),
        );
        let alert = DetectedPattern::new(
            user.id,
            PatternType::Regression,
            PatternSeverity::Alert,
            "alert",
            "",
            t0() - Duration::days(1),
        );
        store.insert_pattern(observation.clone()).unwrap();
        store.insert_pattern(alert.clone()).unwrap();

        let engine = engine(&store);
        let surfaced = engine.get_pattern_to_surface(user.id).unwrap().unwrap();
        assert_eq!(surfaced.id, alert.id);

        engine.mark_pattern_viewed_at(alert.id, t0()).unwrap();
        let surfaced = engine.get_pattern_to_surface(user.id).unwrap().unwrap();
        assert_eq!(surfaced.id, observation.id);

        engine.mark_pattern_viewed_at(observation.id, t0()).unwrap();
        assert!(engine.get_pattern_to_surface(user.id).unwrap().is_none());
    }

    #[test]
    fn test_same_severity_prefers_newest() {
        let (store, user) = seeded_store();
        let older = DetectedPattern::new(
            user.id,
            PatternType::Avoidance,
            PatternSeverity::Insight,
            "older",
            "",
            t0() - Duration::days(2),
        );
        let newer = DetectedPattern::new(
            user.id,
            PatternType::TemporalCrash,
            PatternSeverity::Insight,
            "newer",
            "",
            t0(),
        );
        store.insert_pattern(newer.clone()).unwrap();
        store.insert_pattern(older.clone()).unwrap();

        let ranked = engine(&store).unviewed_patterns(user.id).unwrap();
        let titles: Vec<&str> = ranked.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["newer", "older"]);
    }

    #[test]
    fn test_view_and_dismiss_are_idempotent() {
        let (store, user) = seeded_store();
        let pattern = DetectedPattern::new(
            user.id,
            PatternType::Plateau,
            PatternSeverity::Observation,
            "p",
            "",
            t0(),
        );
        store.insert_pattern(pattern.clone()).unwrap();
        let engine = engine(&store);

        engine.mark_pattern_viewed_at(pattern.id, t0()).unwrap();
        engine
            .mark_pattern_viewed_at(pattern.id, t0() + Duration::days(1))
            .unwrap();
        engine.dismiss_pattern_at(pattern.id, t0()).unwrap();
        engine.dismiss_pattern_at(pattern.id, t0() + Duration::days(1)).unwrap();

        let stored = PatternRepository::get_by_id(&store, pattern.id).unwrap().unwrap();
        assert_eq!(stored.viewed_at, Some(t0()));
        assert_eq!(stored.dismissed_at, Some(t0()));

        // Unknown ids are ignored
        assert!(engine.mark_pattern_viewed_at(Uuid::new_v4(), t0()).is_ok());
        assert!(engine.dismiss_pattern_at(Uuid::new_v4(), t0()).is_ok());
    }
}
