//! Bug lifecycle state machine
//!
//! ```text
//! identified --activate--> active --4 quiet weeks--> stable --resolve--> resolved
//!                            ^                                              |
//!                            +------- reactivate / 3 crashes in 14d --------+
//! any --deactivate--> identified
//! ```
//!
//! Manual transitions are driven by the user; automatic ones are evaluated
//! by [`BugLifecycleService::run_lifecycle_checks`] after a new weekly
//! diagnostic or crash is recorded. Every operation is a no-op when the bug
//! does not exist or is not in the required state.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::repository::{
    BugRepository, CrashRepository, PatternRepository, WeeklyDiagnosticRepository,
};
use crate::types::{
    Bug, BugIntensity, BugStatus, DetectedPattern, LifecycleTransition, PatternSeverity,
    PatternType, WeeklyDiagnostic,
};

/// Drives status transitions of tracked bugs
pub struct BugLifecycleService<'a> {
    bugs: &'a dyn BugRepository,
    diagnostics: &'a dyn WeeklyDiagnosticRepository,
    crashes: &'a dyn CrashRepository,
    patterns: &'a dyn PatternRepository,
    config: EngineConfig,
}

impl<'a> BugLifecycleService<'a> {
    pub fn new(
        bugs: &'a dyn BugRepository,
        diagnostics: &'a dyn WeeklyDiagnosticRepository,
        crashes: &'a dyn CrashRepository,
        patterns: &'a dyn PatternRepository,
    ) -> Self {
        Self::build(bugs, diagnostics, crashes, patterns, EngineConfig::default())
    }

    /// Fails with `InvalidConfig` if the configuration does not validate
    pub fn with_config(
        bugs: &'a dyn BugRepository,
        diagnostics: &'a dyn WeeklyDiagnosticRepository,
        crashes: &'a dyn CrashRepository,
        patterns: &'a dyn PatternRepository,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(bugs, diagnostics, crashes, patterns, config))
    }

    fn build(
        bugs: &'a dyn BugRepository,
        diagnostics: &'a dyn WeeklyDiagnosticRepository,
        crashes: &'a dyn CrashRepository,
        patterns: &'a dyn PatternRepository,
        config: EngineConfig,
    ) -> Self {
        Self {
            bugs,
            diagnostics,
            crashes,
            patterns,
            config,
        }
    }

    // ------------------------------------------------------------------
    // Manual transitions
    // ------------------------------------------------------------------

    /// identified → active
    pub fn activate(&self, bug_id: Uuid) -> Result<bool> {
        self.activate_at(bug_id, Utc::now())
    }

    pub fn activate_at(&self, bug_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        self.transition(bug_id, BugStatus::Identified, BugStatus::Active, now)
            .map(|t| t.is_some())
    }

    /// stable → resolved
    pub fn resolve(&self, bug_id: Uuid) -> Result<bool> {
        self.resolve_at(bug_id, Utc::now())
    }

    pub fn resolve_at(&self, bug_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        self.transition(bug_id, BugStatus::Stable, BugStatus::Resolved, now)
            .map(|t| t.is_some())
    }

    /// resolved → active, at the user's request
    pub fn reactivate(&self, bug_id: Uuid) -> Result<bool> {
        self.reactivate_at(bug_id, Utc::now())
    }

    pub fn reactivate_at(&self, bug_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        self.transition(bug_id, BugStatus::Resolved, BugStatus::Active, now)
            .map(|t| t.is_some())
    }

    /// any → identified, clearing all lifecycle timestamps
    pub fn deactivate(&self, bug_id: Uuid) -> Result<bool> {
        self.deactivate_at(bug_id, Utc::now())
    }

    pub fn deactivate_at(&self, bug_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let Some(mut bug) = self.bugs.get_by_id(bug_id)? else {
            return Ok(false);
        };
        let from = bug.status;
        apply(&mut bug, BugStatus::Identified, now);
        self.bugs.save(&bug)?;
        info!(bug = %bug.slug, ?from, "bug deactivated");
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Automatic transitions
    // ------------------------------------------------------------------

    /// active → stable when the latest weekly diagnostics are all quiet for the bug
    pub fn check_for_stability_transition(&self, user_id: Uuid, bug_id: Uuid) -> Result<bool> {
        self.check_for_stability_transition_at(user_id, bug_id, Utc::now())
    }

    pub fn check_for_stability_transition_at(
        &self,
        user_id: Uuid,
        bug_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(bug) = self.bugs.get_by_id(bug_id)? else {
            return Ok(false);
        };
        Ok(self.stability_check(user_id, bug, now)?.is_some())
    }

    /// resolved → active when enough crashes land inside the regression window.
    /// Emits an alert pattern when it fires.
    pub fn check_for_regression(&self, user_id: Uuid, bug_id: Uuid) -> Result<bool> {
        self.check_for_regression_at(user_id, bug_id, Utc::now())
    }

    pub fn check_for_regression_at(
        &self,
        user_id: Uuid,
        bug_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(bug) = self.bugs.get_by_id(bug_id)? else {
            return Ok(false);
        };
        Ok(self.regression_check(user_id, bug, now)?.is_some())
    }

    /// Evaluate every active bug for stability and every resolved bug for
    /// regression. Returns the transitions that happened.
    pub fn run_lifecycle_checks(&self, user_id: Uuid) -> Result<Vec<LifecycleTransition>> {
        self.run_lifecycle_checks_at(user_id, Utc::now())
    }

    pub fn run_lifecycle_checks_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<LifecycleTransition>> {
        let mut transitions = Vec::new();

        for bug in self.bugs.get_all()? {
            let transition = match bug.status {
                BugStatus::Active => self.stability_check(user_id, bug, now)?,
                BugStatus::Resolved => self.regression_check(user_id, bug, now)?,
                BugStatus::Identified | BugStatus::Stable => None,
            };
            transitions.extend(transition);
        }

        Ok(transitions)
    }

    fn stability_check(
        &self,
        user_id: Uuid,
        mut bug: Bug,
        now: DateTime<Utc>,
    ) -> Result<Option<LifecycleTransition>> {
        if bug.status != BugStatus::Active {
            return Ok(None);
        }

        let weeks = self.config.stability_weeks;
        let recent = self.diagnostics.get_recent(user_id, weeks)?;
        if !quiet_for_weeks(&recent, bug.id, weeks) {
            return Ok(None);
        }

        apply(&mut bug, BugStatus::Stable, now);
        self.bugs.save(&bug)?;
        info!(bug = %bug.slug, weeks, "bug stable");
        Ok(Some(transition_of(&bug, BugStatus::Active)))
    }

    fn regression_check(
        &self,
        user_id: Uuid,
        mut bug: Bug,
        now: DateTime<Utc>,
    ) -> Result<Option<LifecycleTransition>> {
        if bug.status != BugStatus::Resolved {
            return Ok(None);
        }

        let window_start = now - Duration::days(self.config.regression_window_days);
        let crash_count = self
            .crashes
            .get_for_user(user_id)?
            .iter()
            .filter(|c| c.bug_id == Some(bug.id))
            .filter(|c| c.crashed_at >= window_start && c.crashed_at <= now)
            .count();
        if crash_count < self.config.regression_crash_threshold {
            return Ok(None);
        }

        apply(&mut bug, BugStatus::Active, now);
        self.bugs.save(&bug)?;

        let alert = DetectedPattern::new(
            user_id,
            PatternType::Regression,
            PatternSeverity::Alert,
            format!("{} is back", bug.title),
            format!(
                "{} crashed {crash_count} times in the last {} days, so it has been reopened.",
                bug.title, self.config.regression_window_days
            ),
            now,
        )
        .with_bugs([bug.id])
        .with_data_points(crash_count as u32);
        self.patterns.save(&alert)?;

        warn!(bug = %bug.slug, crash_count, "resolved bug regressed");
        Ok(Some(transition_of(&bug, BugStatus::Resolved)))
    }

    /// Load, check the required state, apply and persist
    fn transition(
        &self,
        bug_id: Uuid,
        from: BugStatus,
        to: BugStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<LifecycleTransition>> {
        let Some(mut bug) = self.bugs.get_by_id(bug_id)? else {
            return Ok(None);
        };
        if bug.status != from {
            return Ok(None);
        }

        apply(&mut bug, to, now);
        self.bugs.save(&bug)?;
        info!(bug = %bug.slug, ?from, ?to, "bug transitioned");
        Ok(Some(transition_of(&bug, from)))
    }
}

/// The latest `weeks` diagnostics exist and each rates the bug quiet.
/// A missing response counts as not quiet.
fn quiet_for_weeks(recent: &[WeeklyDiagnostic], bug_id: Uuid, weeks: usize) -> bool {
    recent.len() >= weeks
        && recent[..weeks].iter().all(|d| {
            d.response_for(bug_id)
                .is_some_and(|r| r.intensity == BugIntensity::Quiet)
        })
}

/// Apply the field effects of entering `to`
fn apply(bug: &mut Bug, to: BugStatus, now: DateTime<Utc>) {
    debug_assert!(bug.status.can_transition_to(to));

    match to {
        BugStatus::Active => {
            bug.is_active = true;
            if bug.status == BugStatus::Identified {
                bug.activated_at = Some(now);
            }
            bug.stable_at = None;
            bug.resolved_at = None;
        }
        BugStatus::Stable => {
            bug.stable_at = Some(now);
        }
        BugStatus::Resolved => {
            bug.is_active = false;
            bug.resolved_at = Some(now);
        }
        BugStatus::Identified => {
            bug.is_active = false;
            bug.activated_at = None;
            bug.stable_at = None;
            bug.resolved_at = None;
        }
    }
    bug.status = to;
    bug.updated_at = now;
}

fn transition_of(bug: &Bug, from: BugStatus) -> LifecycleTransition {
    LifecycleTransition {
        bug_id: bug.id,
        bug_slug: bug.slug.clone(),
        from,
        to: bug.status,
    }
}
