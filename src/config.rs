//! Static configuration tables for the progression engine.
//!
//! Base rewards per activity, streak multiplier tiers, difficulty
//! multipliers, the level XP threshold table, and the SM-2 scheduling
//! constants all live here so the reward math stays data-driven.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{ActivityType, Difficulty, InterviewVerdict, SrsRating};

/// Current schema version written next to the persisted state.
pub const SCHEMA_VERSION: u32 = 1;

/// Credits granted when a fresh account is bootstrapped.
pub const STARTING_CREDITS: i64 = 500;

/// Notification history cap, most-recent-first.
pub const NOTIFICATION_HISTORY_CAP: usize = 50;

/// Default weekly practice goal in minutes.
pub const DEFAULT_WEEKLY_GOAL_MINUTES: u32 = 120;

// ============================================================================
// Per-activity base rewards
// ============================================================================

/// Base reward row for one activity type.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityConfig {
    pub base_xp: i64,
    pub base_credits: i64,
    /// Credits spent up-front before any reward is computed. Insufficient
    /// balance turns the spend into a no-op, not an error.
    pub credit_cost: Option<i64>,
    /// Whether this activity counts toward the daily streak.
    pub streak_eligible: bool,
    pub apply_streak_multiplier: bool,
    pub apply_difficulty_multiplier: bool,
}

/// Full reward configuration: the per-activity table plus multiplier tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardConfig {
    pub activities: HashMap<ActivityType, ActivityConfig>,
    /// `(minimum streak days, multiplier)`, checked highest tier first.
    pub streak_tiers: Vec<(u32, f64)>,
    /// Credits for reaching a new level: `round(base * growth^(level-1))`.
    pub level_up_bonus_base: f64,
    pub level_up_bonus_growth: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        let mut activities = HashMap::new();
        activities.insert(
            ActivityType::QuestionCompleted,
            ActivityConfig {
                base_xp: 10,
                base_credits: 0,
                credit_cost: None,
                streak_eligible: true,
                apply_streak_multiplier: true,
                // Difficulty is already encoded in the per-difficulty XP
                // override; applying the multiplier on top would double-count.
                apply_difficulty_multiplier: false,
            },
        );
        activities.insert(
            ActivityType::QuizAnswered,
            ActivityConfig {
                base_xp: 15,
                base_credits: 5,
                credit_cost: None,
                streak_eligible: true,
                apply_streak_multiplier: true,
                apply_difficulty_multiplier: true,
            },
        );
        activities.insert(
            ActivityType::VoiceInterviewCompleted,
            ActivityConfig {
                base_xp: 100,
                base_credits: 25,
                credit_cost: None,
                streak_eligible: true,
                apply_streak_multiplier: true,
                apply_difficulty_multiplier: false,
            },
        );
        activities.insert(
            ActivityType::SrsReviewCompleted,
            ActivityConfig {
                base_xp: 10,
                base_credits: 1,
                credit_cost: None,
                streak_eligible: true,
                apply_streak_multiplier: true,
                apply_difficulty_multiplier: false,
            },
        );
        activities.insert(
            ActivityType::DailyLogin,
            ActivityConfig {
                base_xp: 5,
                base_credits: 10,
                credit_cost: None,
                streak_eligible: true,
                apply_streak_multiplier: true,
                apply_difficulty_multiplier: false,
            },
        );
        activities.insert(
            ActivityType::SessionStarted,
            ActivityConfig {
                base_xp: 0,
                base_credits: 0,
                credit_cost: None,
                streak_eligible: false,
                apply_streak_multiplier: false,
                apply_difficulty_multiplier: false,
            },
        );
        activities.insert(
            ActivityType::QuestionViewed,
            ActivityConfig {
                base_xp: 0,
                base_credits: 0,
                credit_cost: Some(5),
                streak_eligible: false,
                apply_streak_multiplier: false,
                apply_difficulty_multiplier: false,
            },
        );

        Self {
            activities,
            streak_tiers: vec![(100, 3.0), (30, 2.0), (14, 1.75), (7, 1.5), (3, 1.25)],
            level_up_bonus_base: 50.0,
            level_up_bonus_growth: 1.2,
        }
    }
}

impl RewardConfig {
    /// Look up the reward row for an activity. Unknown types fall back to a
    /// zero-reward default rather than failing.
    pub fn activity(&self, activity: ActivityType) -> ActivityConfig {
        self.activities.get(&activity).copied().unwrap_or_default()
    }

    /// Streak multiplier for the given streak length. A streak of zero (no
    /// streak yet) maps to 1.0, never 0.
    pub fn streak_multiplier(&self, streak_days: u32) -> f64 {
        self.streak_tiers
            .iter()
            .find(|(min_days, _)| streak_days >= *min_days)
            .map(|(_, multiplier)| *multiplier)
            .unwrap_or(1.0)
    }

    /// Bonus credits for reaching `level`.
    pub fn level_up_bonus(&self, level: u32) -> i64 {
        let exponent = level.saturating_sub(1) as f64;
        (self.level_up_bonus_base * self.level_up_bonus_growth.powf(exponent)).round() as i64
    }
}

// ============================================================================
// Type-specific reward overrides
// ============================================================================

/// XP for completing a question of a given difficulty.
pub fn question_xp(difficulty: Difficulty) -> i64 {
    match difficulty {
        Difficulty::Beginner => 10,
        Difficulty::Intermediate => 20,
        Difficulty::Advanced => 30,
    }
}

/// XP multiplier applied when an activity opts into difficulty scaling.
pub fn difficulty_multiplier(difficulty: Difficulty) -> f64 {
    match difficulty {
        Difficulty::Beginner => 1.0,
        Difficulty::Intermediate => 1.5,
        Difficulty::Advanced => 2.0,
    }
}

/// XP for a quiz answer.
pub fn quiz_xp(is_correct: bool) -> i64 {
    if is_correct {
        15
    } else {
        0
    }
}

/// Credit delta for a quiz answer. Wrong answers debit and are clamped to
/// the current balance by the processor.
pub fn quiz_credits(is_correct: bool) -> i64 {
    if is_correct {
        5
    } else {
        -2
    }
}

/// XP for a spaced-repetition review by self-reported rating.
pub fn srs_xp(rating: SrsRating) -> i64 {
    match rating {
        SrsRating::Again => 2,
        SrsRating::Hard => 5,
        SrsRating::Good => 10,
        SrsRating::Easy => 15,
    }
}

/// Credit delta for a spaced-repetition review.
pub fn srs_credits(rating: SrsRating) -> i64 {
    match rating {
        SrsRating::Again => -1,
        SrsRating::Hard => 0,
        SrsRating::Good => 1,
        SrsRating::Easy => 2,
    }
}

/// XP for a finished voice interview by verdict.
pub fn voice_xp(verdict: InterviewVerdict) -> i64 {
    match verdict {
        InterviewVerdict::Pass => 100,
        InterviewVerdict::Borderline => 50,
        InterviewVerdict::Fail => 25,
    }
}

/// Credit reward for a finished voice interview.
pub fn voice_credits(verdict: InterviewVerdict) -> i64 {
    match verdict {
        InterviewVerdict::Pass => 25,
        InterviewVerdict::Borderline => 10,
        InterviewVerdict::Fail => 0,
    }
}

// ============================================================================
// Level thresholds
// ============================================================================

/// One row of the level table.
#[derive(Debug, Clone, Copy)]
pub struct LevelThreshold {
    pub level: u32,
    pub xp_required: i64,
}

/// Level thresholds, sorted by XP. Levels 1-20 are dense; past the dense
/// range the table jumps to sparse levels 25/30/35/40/45/50.
pub static LEVEL_THRESHOLDS: &[LevelThreshold] = &[
    LevelThreshold { level: 1, xp_required: 0 },
    LevelThreshold { level: 2, xp_required: 100 },
    LevelThreshold { level: 3, xp_required: 250 },
    LevelThreshold { level: 4, xp_required: 450 },
    LevelThreshold { level: 5, xp_required: 700 },
    LevelThreshold { level: 6, xp_required: 1_000 },
    LevelThreshold { level: 7, xp_required: 1_350 },
    LevelThreshold { level: 8, xp_required: 1_750 },
    LevelThreshold { level: 9, xp_required: 2_200 },
    LevelThreshold { level: 10, xp_required: 2_700 },
    LevelThreshold { level: 11, xp_required: 3_250 },
    LevelThreshold { level: 12, xp_required: 3_850 },
    LevelThreshold { level: 13, xp_required: 4_500 },
    LevelThreshold { level: 14, xp_required: 5_200 },
    LevelThreshold { level: 15, xp_required: 5_950 },
    LevelThreshold { level: 16, xp_required: 6_750 },
    LevelThreshold { level: 17, xp_required: 7_600 },
    LevelThreshold { level: 18, xp_required: 8_500 },
    LevelThreshold { level: 19, xp_required: 9_450 },
    LevelThreshold { level: 20, xp_required: 10_450 },
    LevelThreshold { level: 25, xp_required: 16_000 },
    LevelThreshold { level: 30, xp_required: 23_000 },
    LevelThreshold { level: 35, xp_required: 31_000 },
    LevelThreshold { level: 40, xp_required: 40_000 },
    LevelThreshold { level: 45, xp_required: 50_000 },
    LevelThreshold { level: 50, xp_required: 61_000 },
];

/// Level for a total XP amount. Pure and monotonic; level is always derived
/// from XP through this function, never stored independently.
pub fn level_for_xp(total_xp: i64) -> u32 {
    LEVEL_THRESHOLDS
        .iter()
        .rev()
        .find(|row| total_xp >= row.xp_required)
        .map(|row| row.level)
        .unwrap_or(1)
}

/// XP required for the next level, if any.
pub fn next_level_threshold(total_xp: i64) -> Option<LevelThreshold> {
    LEVEL_THRESHOLDS
        .iter()
        .find(|row| row.xp_required > total_xp)
        .copied()
}

// ============================================================================
// SM-2 constants
// ============================================================================

/// Spaced-repetition scheduling constants (SM-2 variant).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsParams {
    pub initial_ease: f64,
    pub min_ease: f64,
    /// Scores at or above this count as a successful repetition.
    pub pass_score: u32,
    /// Scores at or above this, with enough repetitions, mark mastery.
    pub mastery_score: u32,
    pub mastery_repetitions: u32,
    pub first_interval_days: u32,
    pub second_interval_days: u32,
}

impl Default for SrsParams {
    fn default() -> Self {
        Self {
            initial_ease: 2.5,
            min_ease: 1.3,
            pass_score: 80,
            mastery_score: 90,
            mastery_repetitions: 3,
            first_interval_days: 1,
            second_interval_days: 6,
        }
    }
}
