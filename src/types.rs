//! Core data types
//!
//! This module defines the entities the engine reads and mutates (bugs,
//! analytics events, weekly diagnostics, crashes, detected patterns, user
//! profile) and the closed enumerations they are built from.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// Lifecycle status of a tracked bug
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BugStatus {
    Identified,
    Active,
    Stable,
    Resolved,
}

impl BugStatus {
    /// Whether `self -> next` is an edge of the lifecycle graph.
    ///
    /// ```text
    /// identified -> active -> stable -> resolved
    ///                  ^                    |
    ///                  +--------------------+
    /// any -> identified
    /// ```
    pub fn can_transition_to(self, next: BugStatus) -> bool {
        matches!(
            (self, next),
            (_, BugStatus::Identified)
                | (BugStatus::Identified, BugStatus::Active)
                | (BugStatus::Active, BugStatus::Stable)
                | (BugStatus::Stable, BugStatus::Resolved)
                | (BugStatus::Resolved, BugStatus::Active)
        )
    }
}

/// Self-reported intensity of a bug for one week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BugIntensity {
    Quiet,
    Present,
    Loud,
}

impl BugIntensity {
    /// Numeric level (quiet = 0, present = 1, loud = 2)
    pub fn level(self) -> u8 {
        match self {
            BugIntensity::Quiet => 0,
            BugIntensity::Present => 1,
            BugIntensity::Loud => 2,
        }
    }
}

/// Analytics event types recorded by the user-facing flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CrashLogged,
    CrashRebooted,
    FixAssigned,
    FixApplied,
    FixSkipped,
    FixFailed,
    FixShared,
    WeeklyCompleted,
    PatternViewed,
    PatternDismissed,
}

/// Severity of a detected pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSeverity {
    Alert,
    Insight,
    Observation,
}

impl PatternSeverity {
    /// Surfacing rank: alert (3) > insight (2) > observation (1)
    pub fn rank(self) -> u8 {
        match self {
            PatternSeverity::Alert => 3,
            PatternSeverity::Insight => 2,
            PatternSeverity::Observation => 1,
        }
    }
}

/// Closed set of analytic pattern types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Avoidance,
    TemporalCrash,
    ContextualSpike,
    CorrelatedBugs,
    Plateau,
    Regression,
    Improvement,
}

impl PatternType {
    /// Every pattern type, in declaration order
    pub const ALL: [PatternType; 7] = [
        PatternType::Avoidance,
        PatternType::TemporalCrash,
        PatternType::ContextualSpike,
        PatternType::CorrelatedBugs,
        PatternType::Plateau,
        PatternType::Regression,
        PatternType::Improvement,
    ];
}

/// A tracked recurring behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bug {
    pub id: Uuid,
    /// Stable short identifier (e.g. "doom-scrolling")
    pub slug: String,
    pub title: String,
    pub description: String,
    pub status: BugStatus,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stable_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Bug {
    /// Create a bug in the initial `identified` state
    pub fn new(slug: impl Into<String>, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            slug: slug.into(),
            title: title.into(),
            description: String::new(),
            status: BugStatus::Identified,
            is_active: false,
            activated_at: None,
            stable_at: None,
            resolved_at: None,
            updated_at: now,
        }
    }
}

/// An append-only analytics event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_type: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bug_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_id: Option<Uuid>,
    /// Day of week, 1 = Monday .. 7 = Sunday
    pub day_of_week: u8,
    /// Hour of day, 0-23
    pub hour_of_day: u8,
    pub timestamp: DateTime<Utc>,
}

impl AnalyticsEvent {
    /// Create an event. Day-of-week and hour-of-day are taken in the
    /// timestamp's own zone, so pass the user's local time; the stored
    /// timestamp is UTC.
    pub fn new<Tz: TimeZone>(
        user_id: Uuid,
        event_type: EventType,
        bug_id: Option<Uuid>,
        timestamp: DateTime<Tz>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            event_type,
            bug_id,
            fix_id: None,
            day_of_week: timestamp.weekday().number_from_monday() as u8,
            hour_of_day: timestamp.hour() as u8,
            timestamp: timestamp.with_timezone(&Utc),
        }
    }
}

/// One bug's rating inside a weekly diagnostic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BugDiagnosticResponse {
    pub bug_id: Uuid,
    pub intensity: BugIntensity,
    /// Where the bug showed up most (e.g. "work", "evenings")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_context: Option<String>,
}

/// A user's weekly self-report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyDiagnostic {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Monday of the ISO week this diagnostic belongs to
    pub week_starting: NaiveDate,
    pub responses: Vec<BugDiagnosticResponse>,
    pub completed_at: DateTime<Utc>,
}

impl WeeklyDiagnostic {
    /// Build a diagnostic, anchoring it to the week of `completed_at`.
    ///
    /// Fails if two responses name the same bug.
    pub fn new(
        user_id: Uuid,
        responses: Vec<BugDiagnosticResponse>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self> {
        let diagnostic = Self {
            id: Uuid::new_v4(),
            user_id,
            week_starting: week_anchor(completed_at.date_naive()),
            responses,
            completed_at,
        };
        diagnostic.validate()?;
        Ok(diagnostic)
    }

    /// Check that `week_starting` is a Monday and that no bug is rated twice
    pub fn validate(&self) -> Result<()> {
        if week_anchor(self.week_starting) != self.week_starting {
            return Err(EngineError::InvalidDiagnostic(format!(
                "week_starting {} is not a Monday",
                self.week_starting
            )));
        }

        let mut seen = HashSet::new();
        for response in &self.responses {
            if !seen.insert(response.bug_id) {
                return Err(EngineError::InvalidDiagnostic(format!(
                    "duplicate response for bug {}",
                    response.bug_id
                )));
            }
        }
        Ok(())
    }

    /// Response recorded for a bug, if any
    pub fn response_for(&self, bug_id: Uuid) -> Option<&BugDiagnosticResponse> {
        self.responses.iter().find(|r| r.bug_id == bug_id)
    }
}

/// Monday of the ISO week containing `date`
pub fn week_anchor(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// A logged crash (an occurrence of the bug)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crash {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bug_id: Option<Uuid>,
    pub crashed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebooted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Crash {
    pub fn new(user_id: Uuid, bug_id: Option<Uuid>, crashed_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            bug_id,
            crashed_at,
            rebooted_at: None,
            note: None,
        }
    }

    /// Mark the crash as rebooted. The first reboot time sticks.
    pub fn reboot(&mut self, at: DateTime<Utc>) -> bool {
        if self.rebooted_at.is_some() {
            return false;
        }
        self.rebooted_at = Some(at);
        true
    }
}

/// An analytic finding produced by a detector or the lifecycle service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pattern_type: PatternType,
    pub severity: PatternSeverity,
    pub title: String,
    pub body: String,
    pub related_bug_ids: BTreeSet<Uuid>,
    /// Number of observations backing the finding
    pub data_points: u32,
    pub detected_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dismissed_at: Option<DateTime<Utc>>,
}

impl DetectedPattern {
    pub fn new(
        user_id: Uuid,
        pattern_type: PatternType,
        severity: PatternSeverity,
        title: impl Into<String>,
        body: impl Into<String>,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            pattern_type,
            severity,
            title: title.into(),
            body: body.into(),
            related_bug_ids: BTreeSet::new(),
            data_points: 0,
            detected_at,
            viewed_at: None,
            dismissed_at: None,
        }
    }

    pub fn with_bugs(mut self, bug_ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.related_bug_ids.extend(bug_ids);
        self
    }

    pub fn with_data_points(mut self, data_points: u32) -> Self {
        self.data_points = data_points;
        self
    }
}

/// Streak-relevant subset of the user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_engagement_date: Option<NaiveDate>,
    #[serde(default)]
    pub streak_freeze_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_freeze_reset_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_diagnostics_run_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            current_streak: 0,
            longest_streak: 0,
            last_engagement_date: None,
            streak_freeze_available: false,
            last_freeze_reset_date: None,
            last_diagnostics_run_at: None,
        }
    }
}

/// Read-only streak snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakInfo {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_engagement_date: Option<NaiveDate>,
    pub freeze_available: bool,
}

/// A lifecycle transition that actually happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleTransition {
    pub bug_id: Uuid,
    pub bug_slug: String,
    pub from: BugStatus,
    pub to: BugStatus,
}
