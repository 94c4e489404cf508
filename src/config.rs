//! Engine configuration
//!
//! All windows and thresholds used by the diagnostics, lifecycle and streak
//! services live here. Defaults reproduce the product behavior; a JSON file
//! can override any subset of fields.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Days a detected pattern suppresses new detections of its type
pub const DEFAULT_PATTERN_COOLDOWN_DAYS: i64 = 14;

/// Minimum days between scheduled diagnostics runs
pub const DEFAULT_DIAGNOSTICS_INTERVAL_DAYS: i64 = 7;

/// Consecutive quiet weeks required for `active -> stable`
pub const DEFAULT_STABILITY_WEEKS: usize = 4;

/// Lookback for crash-driven regression
pub const DEFAULT_REGRESSION_WINDOW_DAYS: i64 = 14;

/// Crashes within the regression window that reopen a resolved bug
pub const DEFAULT_REGRESSION_CRASH_THRESHOLD: usize = 3;

/// Days between streak freeze renewals
pub const DEFAULT_FREEZE_WINDOW_DAYS: i64 = 7;

/// Upper bound for any day window (about ten years)
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pattern_cooldown_days: i64,
    pub diagnostics_interval_days: i64,
    pub stability_weeks: usize,
    pub regression_window_days: i64,
    pub regression_crash_threshold: usize,
    pub freeze_window_days: i64,
    pub detectors: DetectorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pattern_cooldown_days: DEFAULT_PATTERN_COOLDOWN_DAYS,
            diagnostics_interval_days: DEFAULT_DIAGNOSTICS_INTERVAL_DAYS,
            stability_weeks: DEFAULT_STABILITY_WEEKS,
            regression_window_days: DEFAULT_REGRESSION_WINDOW_DAYS,
            regression_crash_threshold: DEFAULT_REGRESSION_CRASH_THRESHOLD,
            freeze_window_days: DEFAULT_FREEZE_WINDOW_DAYS,
            detectors: DetectorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject windows and thresholds that would disable a check outright
    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("pattern_cooldown_days", self.pattern_cooldown_days),
            ("diagnostics_interval_days", self.diagnostics_interval_days),
            ("regression_window_days", self.regression_window_days),
            ("freeze_window_days", self.freeze_window_days),
            ("detectors.trailing_window_days", self.detectors.trailing_window_days),
        ];
        for (name, days) in windows {
            if days <= 0 {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be positive, got {days}"
                )));
            }
            if days > MAX_WINDOW_DAYS {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be at most {MAX_WINDOW_DAYS} days, got {days}"
                )));
            }
        }

        if self.stability_weeks == 0 {
            return Err(EngineError::InvalidConfig(
                "stability_weeks must be at least 1".to_string(),
            ));
        }
        if self.regression_crash_threshold == 0 {
            return Err(EngineError::InvalidConfig(
                "regression_crash_threshold must be at least 1".to_string(),
            ));
        }

        self.detectors.validate()
    }
}

/// Thresholds for the built-in pattern detectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Event lookback used by event-driven detectors
    pub trailing_window_days: i64,
    /// Minimum skip + apply events for one bug
    pub avoidance_min_points: usize,
    /// Skips must be at least this multiple of applications
    pub avoidance_skip_ratio: f64,
    /// Minimum logged crashes before looking for time clustering
    pub temporal_min_crashes: usize,
    /// Share of crashes that one time bucket must hold (0-1)
    pub temporal_share: f64,
    /// Loud responses sharing a context before it counts as a spike
    pub contextual_min_loud: usize,
    /// Days on which two bugs both crashed
    pub correlated_min_days: usize,
    /// Weeks of unchanged intensity that make a plateau
    pub plateau_weeks: usize,
    /// Fix applications inside the plateau span
    pub plateau_min_applied: usize,
    /// Weeks inspected for a downward intensity trend
    pub improvement_weeks: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            trailing_window_days: 30,
            avoidance_min_points: 5,
            avoidance_skip_ratio: 1.5,
            temporal_min_crashes: 5,
            temporal_share: 0.5,
            contextual_min_loud: 3,
            correlated_min_days: 3,
            plateau_weeks: 4,
            plateau_min_applied: 3,
            improvement_weeks: 4,
        }
    }
}

impl DetectorConfig {
    fn validate(&self) -> Result<()> {
        if !(self.temporal_share > 0.0 && self.temporal_share <= 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "detectors.temporal_share must be in (0, 1], got {}",
                self.temporal_share
            )));
        }
        if self.avoidance_skip_ratio <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "detectors.avoidance_skip_ratio must be positive, got {}",
                self.avoidance_skip_ratio
            )));
        }
        if self.plateau_weeks < 2 || self.improvement_weeks < 2 {
            return Err(EngineError::InvalidConfig(
                "detectors.plateau_weeks and detectors.improvement_weeks need at least 2 weeks"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
