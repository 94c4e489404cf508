//! Repository collaborators
//!
//! The engine never owns persistence. It reads and writes through these
//! traits; any storage (SQL, key-value, files) can sit behind them. Every
//! call may fail with [`EngineError::Storage`](crate::error::EngineError),
//! which the services propagate without retrying.

mod memory;

pub use memory::MemoryStore;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{
    AnalyticsEvent, Bug, Crash, DetectedPattern, PatternType, UserProfile, WeeklyDiagnostic,
};

/// Storage for tracked bugs
pub trait BugRepository {
    fn get_by_id(&self, id: Uuid) -> Result<Option<Bug>>;
    fn get_all(&self) -> Result<Vec<Bug>>;
    /// Bugs with `is_active == true`
    fn get_active(&self) -> Result<Vec<Bug>>;
    /// Insert or replace by id
    fn save(&self, bug: &Bug) -> Result<()>;
}

/// Storage for weekly self-reports
pub trait WeeklyDiagnosticRepository {
    /// All diagnostics for a user, most recent first
    fn get_for_user(&self, user_id: Uuid) -> Result<Vec<WeeklyDiagnostic>>;
    /// At most `limit` diagnostics, most recent first
    fn get_recent(&self, user_id: Uuid, limit: usize) -> Result<Vec<WeeklyDiagnostic>>;
    fn get_for_week(
        &self,
        week_starting: NaiveDate,
        user_id: Uuid,
    ) -> Result<Option<WeeklyDiagnostic>>;
    /// Store a diagnostic. Fails with `InvalidDiagnostic` if it does not
    /// validate and with `DuplicateWeek` when the user already has one for
    /// the same week anchor.
    fn save(&self, diagnostic: &WeeklyDiagnostic) -> Result<()>;
}

/// Storage for logged crashes
pub trait CrashRepository {
    fn get_for_user(&self, user_id: Uuid) -> Result<Vec<Crash>>;
    fn save(&self, crash: &Crash) -> Result<()>;
}

/// Storage for detected patterns
pub trait PatternRepository {
    fn get_for_user(&self, user_id: Uuid) -> Result<Vec<DetectedPattern>>;
    /// Patterns of `pattern_type` detected after `since`.
    ///
    /// Callers express a "within N days" window as `now - N days`.
    fn get_recent_by_type(
        &self,
        pattern_type: PatternType,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<DetectedPattern>>;
    /// Patterns that have not been viewed yet
    fn get_unviewed(&self, user_id: Uuid) -> Result<Vec<DetectedPattern>>;
    fn get_by_id(&self, id: Uuid) -> Result<Option<DetectedPattern>>;
    /// Insert or replace by id
    fn save(&self, pattern: &DetectedPattern) -> Result<()>;
}

/// Append-only analytics log
pub trait AnalyticsEventRepository {
    fn get_for_user(&self, user_id: Uuid) -> Result<Vec<AnalyticsEvent>>;
    fn save(&self, event: &AnalyticsEvent) -> Result<()>;
}

/// User profile storage
pub trait UserRepository {
    /// The device's (single) user, if one exists
    fn get(&self) -> Result<Option<UserProfile>>;
    fn get_by_id(&self, id: Uuid) -> Result<Option<UserProfile>>;
    fn save(&self, user: &UserProfile) -> Result<()>;
}
