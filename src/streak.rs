//! Day-boundary streak arithmetic.
//!
//! Comparison is by calendar day (`NaiveDate`), never elapsed hours, so
//! timezone and DST shifts cannot break or double-count a streak.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Outcome of evaluating one activity day against the last recorded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakTransition {
    /// First qualifying activity ever; streak starts at 1.
    Started,
    /// Same calendar day as the last activity; nothing changes.
    SameDay,
    /// Exactly one calendar day later; streak extends by 1.
    Continued,
    /// More than one day elapsed; streak resets to 1.
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub transition: StreakTransition,
    pub is_new_day: bool,
    pub streak_broken: bool,
}

impl StreakUpdate {
    /// New streak value given the previous one.
    pub fn apply(&self, previous_streak: u32) -> u32 {
        match self.transition {
            StreakTransition::Started | StreakTransition::Reset => 1,
            StreakTransition::SameDay => previous_streak,
            StreakTransition::Continued => previous_streak + 1,
        }
    }
}

/// Classify `today` against the last activity date.
pub fn evaluate(last_activity: Option<NaiveDate>, today: NaiveDate) -> StreakUpdate {
    let transition = match last_activity {
        None => StreakTransition::Started,
        Some(last) if last == today => StreakTransition::SameDay,
        Some(last) if last.succ_opt() == Some(today) => StreakTransition::Continued,
        Some(last) if last > today => {
            // Clock went backwards across a day boundary; treat as same day
            // rather than resetting an otherwise valid streak.
            StreakTransition::SameDay
        }
        Some(_) => StreakTransition::Reset,
    };

    StreakUpdate {
        transition,
        is_new_day: !matches!(transition, StreakTransition::SameDay),
        streak_broken: matches!(transition, StreakTransition::Reset),
    }
}
