//! Engagement streaks
//!
//! Counts consecutive engaged calendar days. One missed day can be bridged by
//! a streak freeze, which renews once every freeze window (7 days by default).
//! A broken streak restarts at 1 without any signal beyond the number itself.

use chrono::{DateTime, NaiveDate, TimeZone};
use tracing::debug;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::repository::UserRepository;
use crate::types::{AnalyticsEvent, EventType, StreakInfo, UserProfile};

/// Gap (in days) that a freeze can bridge: exactly one missed day
const FREEZE_BRIDGEABLE_GAP: i64 = 2;

/// Streak accumulator over the user profile
pub struct StreakService<'a> {
    users: &'a dyn UserRepository,
    config: EngineConfig,
}

impl<'a> StreakService<'a> {
    pub fn new(users: &'a dyn UserRepository) -> Self {
        Self {
            users,
            config: EngineConfig::default(),
        }
    }

    /// Fails with `InvalidConfig` if the configuration does not validate
    pub fn with_config(users: &'a dyn UserRepository, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { users, config })
    }

    /// Record that the user engaged at `date` (normalized to its local
    /// calendar day). Returns the updated streak, or `None` for unknown users.
    pub fn record_engagement<Tz: TimeZone>(
        &self,
        user_id: Uuid,
        date: DateTime<Tz>,
    ) -> Result<Option<StreakInfo>> {
        self.record_engagement_on(user_id, date.date_naive())
    }

    /// Record engagement on a calendar day
    pub fn record_engagement_on(
        &self,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<Option<StreakInfo>> {
        let Some(mut user) = self.users.get_by_id(user_id)? else {
            return Ok(None);
        };

        self.advance(&mut user, today);
        self.users.save(&user)?;

        debug!(%user_id, current_streak = user.current_streak, "engagement recorded");
        Ok(Some(streak_info(&user)))
    }

    /// Feed a fix-completion event into the streak, counting it on the
    /// calendar day it fell on in `tz` (the user's zone). Other event types
    /// are ignored.
    pub fn record_event<Tz: TimeZone>(
        &self,
        event: &AnalyticsEvent,
        tz: &Tz,
    ) -> Result<Option<StreakInfo>> {
        if event.event_type != EventType::FixApplied {
            return Ok(None);
        }
        self.record_engagement(event.user_id, event.timestamp.with_timezone(tz))
    }

    /// Current streak snapshot, `None` for unknown users
    pub fn get_streak_info(&self, user_id: Uuid) -> Result<Option<StreakInfo>> {
        Ok(self.users.get_by_id(user_id)?.as_ref().map(streak_info))
    }

    fn advance(&self, user: &mut UserProfile, today: NaiveDate) {
        self.refresh_freeze(user, today);

        let Some(last) = user.last_engagement_date else {
            user.current_streak = 1;
            user.longest_streak = user.longest_streak.max(1);
            user.last_engagement_date = Some(today);
            return;
        };

        let gap = (today - last).num_days();
        if gap <= 0 {
            // Same day, or a late report for a day already covered
            return;
        }

        if gap == 1 {
            user.current_streak += 1;
        } else if gap == FREEZE_BRIDGEABLE_GAP && user.streak_freeze_available {
            user.streak_freeze_available = false;
            user.current_streak += 1;
        } else {
            user.current_streak = 1;
        }

        user.longest_streak = user.longest_streak.max(user.current_streak);
        user.last_engagement_date = Some(today);
    }

    /// Renew the freeze once the window since the last renewal has elapsed
    fn refresh_freeze(&self, user: &mut UserProfile, today: NaiveDate) {
        match user.last_freeze_reset_date {
            None => {
                user.last_freeze_reset_date = Some(today);
                user.streak_freeze_available = true;
            }
            Some(anchor) if (today - anchor).num_days() >= self.config.freeze_window_days => {
                user.last_freeze_reset_date = Some(today);
                user.streak_freeze_available = true;
            }
            Some(_) => {}
        }
    }
}

fn streak_info(user: &UserProfile) -> StreakInfo {
    StreakInfo {
        current_streak: user.current_streak,
        longest_streak: user.longest_streak,
        last_engagement_date: user.last_engagement_date,
        freeze_available: user.streak_freeze_available,
    }
}
