//! Shared types for the progression engine: activity events, account state,
//! per-question review records, achievements, and the per-event reward
//! result returned to the UI layer.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config;

// ============================================================================
// Activity events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    QuestionCompleted,
    QuizAnswered,
    VoiceInterviewCompleted,
    SrsReviewCompleted,
    DailyLogin,
    SessionStarted,
    QuestionViewed,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuestionCompleted => "question_completed",
            Self::QuizAnswered => "quiz_answered",
            Self::VoiceInterviewCompleted => "voice_interview_completed",
            Self::SrsReviewCompleted => "srs_review_completed",
            Self::DailyLogin => "daily_login",
            Self::SessionStarted => "session_started",
            Self::QuestionViewed => "question_viewed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "beginner" => Self::Beginner,
            "advanced" => Self::Advanced,
            _ => Self::Intermediate,
        }
    }
}

/// Self-reported review rating, mapped onto the scheduler's 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SrsRating {
    Again,
    Hard,
    Good,
    Easy,
}

impl SrsRating {
    pub fn score(&self) -> u32 {
        match self {
            Self::Again => 30,
            Self::Hard => 80,
            Self::Good => 90,
            Self::Easy => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewVerdict {
    Pass,
    Borderline,
    Fail,
}

/// Optional payload attached to an activity event. Which fields matter
/// depends on the activity type; unexpected extras are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<SrsRating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<InterviewVerdict>,
    /// Raw 0-100 score; takes precedence over `rating` for scheduling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

/// One discrete user activity. Immutable; only its side effects are
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    #[serde(rename = "type")]
    pub event_type: ActivityType,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: ActivityData,
}

impl ActivityEvent {
    pub fn new(event_type: ActivityType, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type,
            timestamp,
            data: ActivityData::default(),
        }
    }

    pub fn with_data(mut self, data: ActivityData) -> Self {
        self.data = data;
        self
    }
}

// ============================================================================
// Account state
// ============================================================================

/// Canonical account state, one record per local user.
///
/// Invariants maintained by the ledger: `credit_balance >= 0`,
/// `longest_streak >= current_streak`, and `level` is always
/// `config::level_for_xp(total_xp)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgressState {
    pub total_xp: i64,
    pub level: u32,
    pub credit_balance: i64,
    pub total_credits_earned: i64,
    pub total_credits_spent: i64,

    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<NaiveDate>,

    pub questions_completed: u32,
    pub beginner_completed: u32,
    pub intermediate_completed: u32,
    pub advanced_completed: u32,
    #[serde(default)]
    pub channel_progress: HashMap<String, u32>,

    pub quiz_correct: u32,
    pub quiz_wrong: u32,
    pub voice_interviews_completed: u32,
    pub voice_interviews_passed: u32,
    pub srs_reviews_completed: u32,
    pub daily_logins: u32,

    pub sessions_started: u32,
    pub session_activities: u32,
    pub daily_activity_count: u32,
    pub weekly_practice_minutes: u32,
    pub weekly_goal_minutes: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProgressState {
    /// Default bootstrap state with the fixed starting credit bonus.
    pub fn bootstrap(now: DateTime<Utc>) -> Self {
        Self {
            total_xp: 0,
            level: 1,
            credit_balance: config::STARTING_CREDITS,
            total_credits_earned: config::STARTING_CREDITS,
            total_credits_spent: 0,
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            questions_completed: 0,
            beginner_completed: 0,
            intermediate_completed: 0,
            advanced_completed: 0,
            channel_progress: HashMap::new(),
            quiz_correct: 0,
            quiz_wrong: 0,
            voice_interviews_completed: 0,
            voice_interviews_passed: 0,
            srs_reviews_completed: 0,
            daily_logins: 0,
            sessions_started: 0,
            session_activities: 0,
            daily_activity_count: 0,
            weekly_practice_minutes: 0,
            weekly_goal_minutes: config::DEFAULT_WEEKLY_GOAL_MINUTES,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Per-question review state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum SrsStatus {
    #[default]
    New,
    Learning,
    Reviewing,
    Mastered,
}

impl SrsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Reviewing => "reviewing",
            Self::Mastered => "mastered",
        }
    }
}

/// One record per `(user, question)`; created on first attempt, mutated on
/// every subsequent attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionProgress {
    pub question_id: String,
    pub attempts: u32,
    pub best_score: u32,
    pub average_score: f64,
    pub last_score: u32,

    /// Review interval in days, always at least 1.
    pub interval_days: u32,
    /// Ease factor, floored at the configured minimum (1.3).
    pub ease_factor: f64,
    pub repetitions: u32,
    pub next_review: DateTime<Utc>,
    pub status: SrsStatus,
    /// Derived: `status == Mastered`.
    pub mastered: bool,

    pub first_seen: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuestionProgress {
    pub fn new(question_id: &str, now: DateTime<Utc>) -> Self {
        let params = config::SrsParams::default();
        Self {
            question_id: question_id.to_string(),
            attempts: 0,
            best_score: 0,
            average_score: 0.0,
            last_score: 0,
            interval_days: params.first_interval_days,
            ease_factor: params.initial_ease,
            repetitions: 0,
            next_review: now,
            status: SrsStatus::New,
            mastered: false,
            first_seen: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Achievements
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementReward {
    pub xp: i64,
    pub credits: i64,
}

/// Unlockable achievement record. `unlocked` is a one-way transition; once
/// set it is never reset and the reward is never paid again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub achievement_id: String,
    pub name: String,
    pub description: String,
    pub tier: u8,
    pub icon: String,
    pub threshold: f64,
    pub current_value: f64,
    /// Progress toward the threshold, 0-100.
    pub progress: f64,
    pub unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<DateTime<Utc>>,
    pub reward: AchievementReward,
}

// ============================================================================
// Per-event results and notifications
// ============================================================================

/// Streak slice of a reward result.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakInfo {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub is_new_day: bool,
    pub streak_broken: bool,
}

/// Ephemeral result of processing one activity event. UI-facing only,
/// never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardResult {
    pub xp_earned: i64,
    pub credits_earned: i64,
    pub credits_spent: i64,
    pub leveled_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_level: Option<u32>,
    pub level_up_bonus: i64,
    pub achievements_unlocked: Vec<Achievement>,
    pub streak: StreakInfo,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    LevelUp,
    AchievementUnlocked,
    StreakMilestone,
}

/// Queued UI notification; capped, most-recent-first history with a
/// lifecycle independent from the progress state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardNotification {
    pub id: u64,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Summaries and bulk transfer
// ============================================================================

/// Aggregate snapshot for the caller-facing `get_progress_summary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub level: u32,
    pub total_xp: i64,
    pub xp_into_level: i64,
    /// XP still needed for the next level; `None` at the table's top.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xp_to_next_level: Option<i64>,
    pub credit_balance: i64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub questions_completed: u32,
    /// Fraction of attempted questions currently mastered, 0.0-1.0.
    pub mastery_rate: f64,
    pub achievements_unlocked: u32,
    pub weekly_practice_minutes: u32,
    pub weekly_goal_minutes: u32,
}

/// Backup/restore blob. Import validates the whole blob before committing;
/// malformed input is rejected without partial application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBlob {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub progress: UserProgressState,
    pub questions: HashMap<String, QuestionProgress>,
    pub achievements: Vec<Achievement>,
    pub notifications: Vec<RewardNotification>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_event_serde_round_trip() {
        let event = ActivityEvent::new(ActivityType::QuestionCompleted, Utc::now()).with_data(
            ActivityData {
                difficulty: Some(Difficulty::Advanced),
                question_id: Some("q-42".to_string()),
                score: Some(88),
                ..Default::default()
            },
        );

        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("\"type\":\"question_completed\""));
        assert!(json.contains("\"difficulty\":\"advanced\""));

        let back: ActivityEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.event_type, ActivityType::QuestionCompleted);
        assert_eq!(back.data.score, Some(88));
    }

    #[test]
    fn test_event_without_data_deserializes() {
        let json = r#"{"type":"daily_login","timestamp":"2026-08-29T08:00:00Z"}"#;
        let event: ActivityEvent = serde_json::from_str(json).expect("deserialize");
        assert_eq!(event.event_type, ActivityType::DailyLogin);
        assert!(event.data.question_id.is_none());
    }

    #[test]
    fn test_bootstrap_state_defaults() {
        let state = UserProgressState::bootstrap(Utc::now());
        assert_eq!(state.level, 1);
        assert_eq!(state.credit_balance, 500);
        assert_eq!(state.total_credits_earned, 500);
        assert_eq!(state.current_streak, 0);
        assert!(state.last_activity_date.is_none());
    }

    #[test]
    fn test_difficulty_parse_falls_back_to_intermediate() {
        assert_eq!(Difficulty::parse("ADVANCED"), Difficulty::Advanced);
        assert_eq!(Difficulty::parse("gibberish"), Difficulty::Intermediate);
    }

    #[test]
    fn test_rating_scores_are_ordered() {
        assert!(SrsRating::Again.score() < SrsRating::Hard.score());
        assert!(SrsRating::Hard.score() < SrsRating::Good.score());
        assert!(SrsRating::Good.score() < SrsRating::Easy.score());
    }
}
