//! Recommendation dispatch
//!
//! Maps each pattern type to a fixed, priority-ordered list of suggested
//! actions. The match is exhaustive, so adding a pattern type without
//! recommendations fails to compile.

use serde::Serialize;

use crate::types::{DetectedPattern, PatternType};

/// Kind of action a recommendation asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Swap the current fix for a smaller or different one
    SwapFix,
    /// Write down what happened before the bug fired
    Reflect,
    /// Schedule a fix ahead of a risky time window
    ScheduleFix,
    /// Prepare for a recurring situation
    PlanForContext,
    /// Work on two bugs together
    PairBugs,
    /// Review the current approach
    ReviewApproach,
    /// Acknowledge progress
    Celebrate,
}

/// One suggested action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub action_type: ActionType,
    pub title: &'static str,
    pub description: &'static str,
    /// 1 = most important
    pub priority: u8,
}

const fn rec(
    action_type: ActionType,
    title: &'static str,
    description: &'static str,
    priority: u8,
) -> Recommendation {
    Recommendation {
        action_type,
        title,
        description,
        priority,
    }
}

const AVOIDANCE: [Recommendation; 2] = [
    rec(
        ActionType::SwapFix,
        "Shrink the fix",
        "Pick a version of the fix small enough that skipping it feels silly.",
        1,
    ),
    rec(
        ActionType::Reflect,
        "Name the resistance",
        "Next time you skip, note in one line what made it feel hard.",
        2,
    ),
];

const TEMPORAL_CRASH: [Recommendation; 2] = [
    rec(
        ActionType::ScheduleFix,
        "Get ahead of the window",
        "Set your fix for just before the time crashes usually happen.",
        1,
    ),
    rec(
        ActionType::Reflect,
        "Look at the lead-up",
        "Write down what usually happens in the hour before a crash.",
        2,
    ),
];

const CONTEXTUAL_SPIKE: [Recommendation; 2] = [
    rec(
        ActionType::PlanForContext,
        "Plan for the trigger",
        "Decide in advance what you will do the next time you are in this context.",
        1,
    ),
    rec(
        ActionType::Reflect,
        "Map the context",
        "List what about this context makes the bug louder.",
        2,
    ),
];

const CORRELATED_BUGS: [Recommendation; 2] = [
    rec(
        ActionType::PairBugs,
        "Work them together",
        "Pick one fix that addresses both bugs at once.",
        1,
    ),
    rec(
        ActionType::Reflect,
        "Find the common root",
        "Note what tends to set off both bugs on the same day.",
        2,
    ),
];

const PLATEAU: [Recommendation; 2] = [
    rec(
        ActionType::SwapFix,
        "Try a different fix",
        "The current fix has stopped moving the needle. Switch to another one for a week.",
        1,
    ),
    rec(
        ActionType::ReviewApproach,
        "Review what changed",
        "Compare this month with the weeks when the bug was improving.",
        2,
    ),
];

const REGRESSION: [Recommendation; 2] = [
    rec(
        ActionType::ReviewApproach,
        "Go back to what worked",
        "Restart the fix that got this bug quiet in the first place.",
        1,
    ),
    rec(
        ActionType::Reflect,
        "Spot the trigger",
        "Write down what changed in the days before the bug came back.",
        2,
    ),
];

const IMPROVEMENT: [Recommendation; 2] = [
    rec(
        ActionType::Celebrate,
        "Notice the progress",
        "Take a moment to acknowledge how far this bug has come.",
        1,
    ),
    rec(
        ActionType::ReviewApproach,
        "Keep the routine",
        "Keep doing the fix that is working, even on good days.",
        2,
    ),
];

/// Recommendations for a pattern type, most important first
pub fn recommendations_for(pattern_type: PatternType) -> &'static [Recommendation] {
    match pattern_type {
        PatternType::Avoidance => &AVOIDANCE,
        PatternType::TemporalCrash => &TEMPORAL_CRASH,
        PatternType::ContextualSpike => &CONTEXTUAL_SPIKE,
        PatternType::CorrelatedBugs => &CORRELATED_BUGS,
        PatternType::Plateau => &PLATEAU,
        PatternType::Regression => &REGRESSION,
        PatternType::Improvement => &IMPROVEMENT,
    }
}

impl DetectedPattern {
    /// Recommendations matching this pattern's type
    pub fn recommendations(&self) -> &'static [Recommendation] {
        recommendations_for(self.pattern_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_is_total_and_ordered() {
        for pattern_type in PatternType::ALL {
            let recs = recommendations_for(pattern_type);
            assert!(!recs.is_empty(), "{pattern_type:?} has no recommendations");

            for (i, rec) in recs.iter().enumerate() {
                assert_eq!(rec.priority as usize, i + 1);
                assert!(!rec.title.is_empty());
            }
        }
    }

    #[test]
    fn test_pattern_uses_its_type() {
        let pattern = DetectedPattern::new(
            uuid::Uuid::new_v4(),
            PatternType::Improvement,
            crate::types::PatternSeverity::Observation,
            "t",
            "b",
            chrono::Utc::now(),
        );
        assert_eq!(pattern.recommendations()[0].action_type, ActionType::Celebrate);
    }
}
