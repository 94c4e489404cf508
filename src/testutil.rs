//! Shared fixtures for unit tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::repository::MemoryStore;
use crate::types::{
    AnalyticsEvent, BugDiagnosticResponse, BugIntensity, EventType, UserProfile, WeeklyDiagnostic,
};

/// Monday 2024-01-15 09:00 UTC
pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
}

pub(crate) fn event(
    user_id: Uuid,
    event_type: EventType,
    bug_id: Option<Uuid>,
    at: DateTime<Utc>,
) -> AnalyticsEvent {
    AnalyticsEvent::new(user_id, event_type, bug_id, at)
}

/// `count` events spaced `spacing` apart, starting at `start`
pub(crate) fn events(
    user_id: Uuid,
    event_type: EventType,
    bug_id: Option<Uuid>,
    start: DateTime<Utc>,
    count: usize,
    spacing: Duration,
) -> Vec<AnalyticsEvent> {
    (0..count)
        .map(|i| event(user_id, event_type, bug_id, start + spacing * i as i32))
        .collect()
}

/// Diagnostic completed `week` weeks after `t0()`
pub(crate) fn diagnostic(
    user_id: Uuid,
    week: i64,
    ratings: &[(Uuid, BugIntensity)],
) -> WeeklyDiagnostic {
    let responses = ratings
        .iter()
        .map(|&(bug_id, intensity)| BugDiagnosticResponse {
            bug_id,
            intensity,
            primary_context: None,
        })
        .collect();
    WeeklyDiagnostic::new(user_id, responses, t0() + Duration::weeks(week)).unwrap()
}

/// Weekly diagnostics given oldest first, returned most recent first
pub(crate) fn weekly_history(
    user_id: Uuid,
    weeks: &[&[(Uuid, BugIntensity)]],
) -> Vec<WeeklyDiagnostic> {
    let mut history: Vec<WeeklyDiagnostic> = weeks
        .iter()
        .enumerate()
        .map(|(week, ratings)| diagnostic(user_id, week as i64, ratings))
        .collect();
    history.reverse();
    history
}

/// Store holding a single fresh user
pub(crate) fn seeded_store() -> (MemoryStore, UserProfile) {
    let store = MemoryStore::new();
    let user = UserProfile::new(Uuid::new_v4());
    store.insert_user(user.clone()).unwrap();
    (store, user)
}
