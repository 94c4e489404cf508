//! In-memory repository
//!
//! An arena of entities keyed by id that implements every repository trait.
//! The whole store serializes to JSON so a CLI or test can persist it between
//! runs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    AnalyticsEventRepository, BugRepository, CrashRepository, PatternRepository, UserRepository,
    WeeklyDiagnosticRepository,
};
use crate::error::{EngineError, Result};
use crate::types::{
    AnalyticsEvent, Bug, Crash, DetectedPattern, PatternType, UserProfile, WeeklyDiagnostic,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    bugs: BTreeMap<Uuid, Bug>,
    #[serde(default)]
    events: Vec<AnalyticsEvent>,
    #[serde(default)]
    diagnostics: Vec<WeeklyDiagnostic>,
    #[serde(default)]
    crashes: Vec<Crash>,
    #[serde(default)]
    patterns: Vec<DetectedPattern>,
    #[serde(default)]
    users: BTreeMap<Uuid, UserProfile>,
}

impl StoreState {
    fn validate(&self) -> Result<()> {
        let mut weeks = HashSet::new();
        for diagnostic in &self.diagnostics {
            diagnostic.validate()?;
            if !weeks.insert((diagnostic.user_id, diagnostic.week_starting)) {
                return Err(EngineError::DuplicateWeek {
                    user_id: diagnostic.user_id,
                    week_starting: diagnostic.week_starting,
                });
            }
        }
        Ok(())
    }
}

/// Mutex-guarded store implementing all repository traits
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from JSON. Weekly diagnostics are checked the same way
    /// as on insert.
    pub fn from_json(json: &str) -> Result<Self> {
        let state: StoreState = serde_json::from_str(json)?;
        state.validate()?;
        Ok(Self {
            state: Mutex::new(state),
            fail_writes: false,
        })
    }

    /// Serialize the store to JSON
    pub fn to_json(&self) -> Result<String> {
        let state = self.lock()?;
        Ok(serde_json::to_string_pretty(&*state)?)
    }

    /// Make every subsequent write fail with a storage error
    #[cfg(test)]
    pub(crate) fn fail_writes(&mut self) {
        self.fail_writes = true;
    }

    pub fn insert_bug(&self, bug: Bug) -> Result<()> {
        BugRepository::save(self, &bug)
    }

    pub fn insert_user(&self, user: UserProfile) -> Result<()> {
        UserRepository::save(self, &user)
    }

    pub fn insert_event(&self, event: AnalyticsEvent) -> Result<()> {
        AnalyticsEventRepository::save(self, &event)
    }

    pub fn insert_diagnostic(&self, diagnostic: WeeklyDiagnostic) -> Result<()> {
        WeeklyDiagnosticRepository::save(self, &diagnostic)
    }

    pub fn insert_crash(&self, crash: Crash) -> Result<()> {
        CrashRepository::save(self, &crash)
    }

    pub fn insert_pattern(&self, pattern: DetectedPattern) -> Result<()> {
        PatternRepository::save(self, &pattern)
    }

    /// Number of stored patterns across all users
    pub fn pattern_count(&self) -> Result<usize> {
        Ok(self.lock()?.patterns.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| EngineError::Storage("memory store lock poisoned".to_string()))
    }

    fn lock_for_write(&self) -> Result<MutexGuard<'_, StoreState>> {
        if self.fail_writes {
            return Err(EngineError::Storage("write rejected".to_string()));
        }
        self.lock()
    }
}

/// Most recent completion first
fn sort_diagnostics(diagnostics: &mut [WeeklyDiagnostic]) {
    diagnostics.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
}

impl BugRepository for MemoryStore {
    fn get_by_id(&self, id: Uuid) -> Result<Option<Bug>> {
        Ok(self.lock()?.bugs.get(&id).cloned())
    }

    fn get_all(&self) -> Result<Vec<Bug>> {
        Ok(self.lock()?.bugs.values().cloned().collect())
    }

    fn get_active(&self) -> Result<Vec<Bug>> {
        Ok(self
            .lock()?
            .bugs
            .values()
            .filter(|b| b.is_active)
            .cloned()
            .collect())
    }

    fn save(&self, bug: &Bug) -> Result<()> {
        self.lock_for_write()?.bugs.insert(bug.id, bug.clone());
        Ok(())
    }
}

impl WeeklyDiagnosticRepository for MemoryStore {
    fn get_for_user(&self, user_id: Uuid) -> Result<Vec<WeeklyDiagnostic>> {
        let mut diagnostics: Vec<WeeklyDiagnostic> = self
            .lock()?
            .diagnostics
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        sort_diagnostics(&mut diagnostics);
        Ok(diagnostics)
    }

    fn get_recent(&self, user_id: Uuid, limit: usize) -> Result<Vec<WeeklyDiagnostic>> {
        let mut diagnostics = WeeklyDiagnosticRepository::get_for_user(self, user_id)?;
        diagnostics.truncate(limit);
        Ok(diagnostics)
    }

    fn get_for_week(
        &self,
        week_starting: NaiveDate,
        user_id: Uuid,
    ) -> Result<Option<WeeklyDiagnostic>> {
        Ok(self
            .lock()?
            .diagnostics
            .iter()
            .find(|d| d.user_id == user_id && d.week_starting == week_starting)
            .cloned())
    }

    fn save(&self, diagnostic: &WeeklyDiagnostic) -> Result<()> {
        diagnostic.validate()?;
        let mut state = self.lock_for_write()?;

        let clash = state.diagnostics.iter().any(|d| {
            d.id != diagnostic.id
                && d.user_id == diagnostic.user_id
                && d.week_starting == diagnostic.week_starting
        });
        if clash {
            return Err(EngineError::DuplicateWeek {
                user_id: diagnostic.user_id,
                week_starting: diagnostic.week_starting,
            });
        }

        match state.diagnostics.iter_mut().find(|d| d.id == diagnostic.id) {
            Some(existing) => *existing = diagnostic.clone(),
            None => state.diagnostics.push(diagnostic.clone()),
        }
        Ok(())
    }
}

impl CrashRepository for MemoryStore {
    fn get_for_user(&self, user_id: Uuid) -> Result<Vec<Crash>> {
        Ok(self
            .lock()?
            .crashes
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    fn save(&self, crash: &Crash) -> Result<()> {
        let mut state = self.lock_for_write()?;
        match state.crashes.iter_mut().find(|c| c.id == crash.id) {
            Some(existing) => *existing = crash.clone(),
            None => state.crashes.push(crash.clone()),
        }
        Ok(())
    }
}

impl PatternRepository for MemoryStore {
    fn get_for_user(&self, user_id: Uuid) -> Result<Vec<DetectedPattern>> {
        Ok(self
            .lock()?
            .patterns
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    fn get_recent_by_type(
        &self,
        pattern_type: PatternType,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<DetectedPattern>> {
        Ok(self
            .lock()?
            .patterns
            .iter()
            .filter(|p| p.user_id == user_id && p.pattern_type == pattern_type)
            .filter(|p| p.detected_at > since)
            .cloned()
            .collect())
    }

    fn get_unviewed(&self, user_id: Uuid) -> Result<Vec<DetectedPattern>> {
        Ok(self
            .lock()?
            .patterns
            .iter()
            .filter(|p| p.user_id == user_id && p.viewed_at.is_none())
            .cloned()
            .collect())
    }

    fn get_by_id(&self, id: Uuid) -> Result<Option<DetectedPattern>> {
        Ok(self.lock()?.patterns.iter().find(|p| p.id == id).cloned())
    }

    fn save(&self, pattern: &DetectedPattern) -> Result<()> {
        let mut state = self.lock_for_write()?;
        match state.patterns.iter_mut().find(|p| p.id == pattern.id) {
            Some(existing) => *existing = pattern.clone(),
            None => state.patterns.push(pattern.clone()),
        }
        Ok(())
    }
}

impl AnalyticsEventRepository for MemoryStore {
    fn get_for_user(&self, user_id: Uuid) -> Result<Vec<AnalyticsEvent>> {
        Ok(self
            .lock()?
            .events
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    fn save(&self, event: &AnalyticsEvent) -> Result<()> {
        self.lock_for_write()?.events.push(event.clone());
        Ok(())
    }
}

impl UserRepository for MemoryStore {
    fn get(&self) -> Result<Option<UserProfile>> {
        Ok(self.lock()?.users.values().next().cloned())
    }

    fn get_by_id(&self, id: Uuid) -> Result<Option<UserProfile>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    fn save(&self, user: &UserProfile) -> Result<()> {
        self.lock_for_write()?.users.insert(user.id, user.clone());
        Ok(())
    }
}
