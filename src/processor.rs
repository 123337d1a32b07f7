//! Activity processor: the orchestration layer over the ledger, streak
//! tracker, scheduler, and achievement engine.
//!
//! `process_activity` is synchronous and run-to-completion; the caller is
//! responsible for serializing calls. Listeners fire after state has been
//! persisted, in registration order, so a panicking listener can never
//! corrupt ledger state.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::achievements::{AchievementEngine, CounterSnapshot};
use crate::config::{self, ActivityConfig, RewardConfig};
use crate::ledger::{Counter, ProgressLedger};
use crate::store::KeyValueStore;
use crate::types::{
    ActivityData, ActivityEvent, ActivityType, Difficulty, ExportBlob, InterviewVerdict,
    NotificationKind, ProgressSummary, RewardResult, StreakInfo,
};

/// Handle returned by `add_listener`; pass back to `remove_listener` to
/// unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn Fn(&RewardResult)>;

pub struct ActivityProcessor {
    config: RewardConfig,
    ledger: ProgressLedger,
    achievements: AchievementEngine,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: u64,
}

impl ActivityProcessor {
    pub fn new(store: Arc<dyn KeyValueStore>, user_id: &str, now: DateTime<Utc>) -> Self {
        Self::with_config(RewardConfig::default(), store, user_id, now)
    }

    pub fn with_config(
        config: RewardConfig,
        store: Arc<dyn KeyValueStore>,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let ledger = ProgressLedger::load(Arc::clone(&store), user_id, now);
        let achievements = AchievementEngine::load(store, user_id);
        Self {
            config,
            ledger,
            achievements,
            listeners: Vec::new(),
            next_listener_id: 1,
        }
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    pub fn achievements(&self) -> &AchievementEngine {
        &self.achievements
    }

    /// Whether the last persist left durable storage behind the in-memory
    /// state.
    pub fn persistence_degraded(&self) -> bool {
        self.ledger.persistence_degraded() || self.achievements.persistence_degraded()
    }

    // ========== Event processing ==========

    /// Process one activity event and return the structured reward result.
    /// Never fails: unknown configurations degrade to zero rewards.
    pub fn process_activity(&mut self, event: &ActivityEvent) -> RewardResult {
        let now = event.timestamp;
        let cfg = self.config.activity(event.event_type);

        let streak = if cfg.streak_eligible {
            self.ledger.touch_streak(now.date_naive(), now)
        } else {
            self.ledger.streak_snapshot()
        };

        let xp = self.compute_xp(event, &cfg, streak);
        let credit_delta = self.compute_credit_delta(event, &cfg, streak);

        // Up-front cost comes out before any reward lands; an insufficient
        // balance turns the spend into a no-op.
        let mut credits_spent = 0;
        if let Some(cost) = cfg.credit_cost {
            let outcome = self.ledger.spend_credits(cost, now);
            if outcome.success {
                credits_spent = cost;
            }
        }

        let mut xp_earned = xp;
        let mut credits_earned = 0i64;
        let mut leveled_up = false;
        let mut new_level = None;
        let mut level_up_bonus = 0i64;

        let change = self.ledger.add_xp(xp, now);
        if change.leveled_up() {
            leveled_up = true;
            new_level = Some(change.new_level);
            level_up_bonus += self.grant_level_up_bonus(change.new_level, now, &mut credits_earned);
        }

        credits_earned += self.ledger.add_credits(credit_delta, now);

        self.update_counters(event, now);

        let snapshot =
            CounterSnapshot::from_state(self.ledger.progress(), self.ledger.mastery_rate());
        let unlocked = self
            .achievements
            .evaluate(event.event_type, &snapshot, now);
        for achievement in &unlocked {
            xp_earned += achievement.reward.xp;
            let change = self.ledger.add_xp(achievement.reward.xp, now);
            if change.leveled_up() {
                leveled_up = true;
                new_level = Some(change.new_level);
                level_up_bonus +=
                    self.grant_level_up_bonus(change.new_level, now, &mut credits_earned);
            }
            credits_earned += self.ledger.add_credits(achievement.reward.credits, now);
            self.ledger.push_notification(
                NotificationKind::AchievementUnlocked,
                &achievement.name,
                &achievement.description,
                now,
            );
        }

        self.ledger.persist();
        self.achievements.persist();

        let result = RewardResult {
            xp_earned,
            credits_earned,
            credits_spent,
            leveled_up,
            new_level,
            level_up_bonus,
            achievements_unlocked: unlocked,
            streak: StreakInfo {
                current_streak: self.ledger.progress().current_streak,
                longest_streak: self.ledger.progress().longest_streak,
                is_new_day: streak.is_new_day,
                streak_broken: streak.streak_broken,
            },
            summary: String::new(),
        };
        let result = RewardResult {
            summary: build_summary(&result),
            ..result
        };

        tracing::debug!(
            activity = event.event_type.as_str(),
            xp = result.xp_earned,
            credits = result.credits_earned,
            "activity processed"
        );

        // Listeners run strictly after persistence, in registration order.
        for (_, listener) in &self.listeners {
            listener(&result);
        }
        result
    }

    fn compute_xp(&self, event: &ActivityEvent, cfg: &ActivityConfig, streak: StreakInfo) -> i64 {
        let data = &event.data;
        let mut xp = match event.event_type {
            ActivityType::QuestionCompleted => data
                .difficulty
                .map(config::question_xp)
                .unwrap_or(cfg.base_xp),
            ActivityType::QuizAnswered => {
                data.is_correct.map(config::quiz_xp).unwrap_or(cfg.base_xp)
            }
            ActivityType::SrsReviewCompleted => {
                data.rating.map(config::srs_xp).unwrap_or(cfg.base_xp)
            }
            ActivityType::VoiceInterviewCompleted => {
                data.verdict.map(config::voice_xp).unwrap_or(cfg.base_xp)
            }
            _ => cfg.base_xp,
        };

        // Streak first, then difficulty; each rounded independently.
        if cfg.apply_streak_multiplier {
            xp = apply_multiplier(xp, self.config.streak_multiplier(streak.current_streak));
        }
        if cfg.apply_difficulty_multiplier {
            if let Some(difficulty) = data.difficulty {
                xp = apply_multiplier(xp, config::difficulty_multiplier(difficulty));
            }
        }
        xp
    }

    fn compute_credit_delta(
        &self,
        event: &ActivityEvent,
        cfg: &ActivityConfig,
        streak: StreakInfo,
    ) -> i64 {
        let data = &event.data;
        let mut credits = match event.event_type {
            ActivityType::QuizAnswered => data
                .is_correct
                .map(config::quiz_credits)
                .unwrap_or(cfg.base_credits),
            ActivityType::SrsReviewCompleted => data
                .rating
                .map(config::srs_credits)
                .unwrap_or(cfg.base_credits),
            ActivityType::VoiceInterviewCompleted => data
                .verdict
                .map(config::voice_credits)
                .unwrap_or(cfg.base_credits),
            _ => cfg.base_credits,
        };

        if credits > 0 {
            if cfg.apply_streak_multiplier {
                credits =
                    apply_multiplier(credits, self.config.streak_multiplier(streak.current_streak));
            }
            if cfg.apply_difficulty_multiplier {
                if let Some(difficulty) = data.difficulty {
                    credits = apply_multiplier(credits, config::difficulty_multiplier(difficulty));
                }
            }
        } else if credits < 0 {
            // Debits never drive the balance below zero.
            credits = credits.max(-self.ledger.progress().credit_balance);
        }
        credits
    }

    fn grant_level_up_bonus(
        &mut self,
        level: u32,
        now: DateTime<Utc>,
        credits_earned: &mut i64,
    ) -> i64 {
        let bonus = self.config.level_up_bonus(level);
        *credits_earned += self.ledger.add_credits(bonus, now);
        self.ledger.push_notification(
            NotificationKind::LevelUp,
            &format!("Level {level}"),
            &format!("You reached level {level} and earned {bonus} bonus credits"),
            now,
        );
        bonus
    }

    fn update_counters(&mut self, event: &ActivityEvent, now: DateTime<Utc>) {
        let data = &event.data;

        if event.event_type == ActivityType::SessionStarted {
            self.ledger.increment(Counter::SessionsStarted, 1, now);
            self.ledger.reset_session_counters(now);
        } else {
            self.ledger.increment(Counter::SessionActivities, 1, now);
            self.ledger.increment(Counter::DailyActivityCount, 1, now);
        }
        if let Some(minutes) = data.duration_minutes {
            self.ledger
                .increment(Counter::WeeklyPracticeMinutes, minutes, now);
        }

        match event.event_type {
            ActivityType::QuestionCompleted => {
                self.ledger.increment(Counter::QuestionsCompleted, 1, now);
                match data.difficulty {
                    Some(Difficulty::Beginner) => {
                        self.ledger.increment(Counter::BeginnerCompleted, 1, now)
                    }
                    Some(Difficulty::Intermediate) => {
                        self.ledger.increment(Counter::IntermediateCompleted, 1, now)
                    }
                    Some(Difficulty::Advanced) => {
                        self.ledger.increment(Counter::AdvancedCompleted, 1, now)
                    }
                    None => {}
                }
                if let Some(channel) = &data.channel {
                    self.ledger.increment_channel(channel, now);
                }
                self.record_question_attempt(event, now);
            }
            ActivityType::QuizAnswered => match data.is_correct {
                Some(true) => self.ledger.increment(Counter::QuizCorrect, 1, now),
                Some(false) | None => self.ledger.increment(Counter::QuizWrong, 1, now),
            },
            ActivityType::VoiceInterviewCompleted => {
                self.ledger
                    .increment(Counter::VoiceInterviewsCompleted, 1, now);
                if data.verdict == Some(InterviewVerdict::Pass) {
                    self.ledger
                        .increment(Counter::VoiceInterviewsPassed, 1, now);
                }
            }
            ActivityType::SrsReviewCompleted => {
                self.ledger.increment(Counter::SrsReviewsCompleted, 1, now);
                self.record_question_attempt(event, now);
            }
            ActivityType::DailyLogin => {
                self.ledger.increment(Counter::DailyLogins, 1, now);
            }
            ActivityType::SessionStarted | ActivityType::QuestionViewed => {}
        }
    }

    /// Feed the scheduler when the event names a question and carries a
    /// usable score source.
    fn record_question_attempt(&mut self, event: &ActivityEvent, now: DateTime<Utc>) {
        let Some(question_id) = &event.data.question_id else {
            return;
        };
        let Some(score) = effective_score(&event.data) else {
            return;
        };
        self.ledger.record_attempt(question_id, score, now);
    }

    // ========== Caller-facing queries ==========

    pub fn can_afford(&self, amount: i64) -> bool {
        amount >= 0 && self.ledger.progress().credit_balance >= amount
    }

    pub fn get_progress_summary(&self) -> ProgressSummary {
        let state = self.ledger.progress();
        let level_floor = config::LEVEL_THRESHOLDS
            .iter()
            .rev()
            .find(|row| state.total_xp >= row.xp_required)
            .map(|row| row.xp_required)
            .unwrap_or(0);
        let xp_to_next_level =
            config::next_level_threshold(state.total_xp).map(|row| row.xp_required - state.total_xp);

        ProgressSummary {
            level: state.level,
            total_xp: state.total_xp,
            xp_into_level: state.total_xp - level_floor,
            xp_to_next_level,
            credit_balance: state.credit_balance,
            current_streak: state.current_streak,
            longest_streak: state.longest_streak,
            questions_completed: state.questions_completed,
            mastery_rate: self.ledger.mastery_rate(),
            achievements_unlocked: self.achievements.unlocked_count(),
            weekly_practice_minutes: state.weekly_practice_minutes,
            weekly_goal_minutes: state.weekly_goal_minutes,
        }
    }

    // ========== Listeners ==========

    /// Register a listener invoked synchronously after each processed
    /// activity, in registration order.
    pub fn add_listener(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    // ========== Bulk transfer ==========

    pub fn export_blob(&self, now: DateTime<Utc>) -> ExportBlob {
        ExportBlob {
            version: config::SCHEMA_VERSION,
            exported_at: now,
            progress: self.ledger.progress().clone(),
            questions: self.ledger.snapshot_questions(),
            achievements: self.achievements.snapshot(),
            notifications: self.ledger.snapshot_notifications(),
        }
    }

    /// Serialize the full engine state for backup.
    pub fn export_data(&self, now: DateTime<Utc>) -> String {
        serde_json::to_string(&self.export_blob(now)).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "export serialization failed");
            String::new()
        })
    }

    /// Replace the full engine state from a backup blob. The blob is
    /// validated as a whole before anything is applied; malformed or
    /// unknown-version input is rejected without partial effects.
    pub fn import_data(&mut self, raw: &str) -> bool {
        let blob: ExportBlob = match serde_json::from_str(raw) {
            Ok(blob) => blob,
            Err(err) => {
                tracing::warn!(error = %err, "rejecting malformed import blob");
                return false;
            }
        };
        if blob.version != config::SCHEMA_VERSION {
            tracing::warn!(version = blob.version, "rejecting import with unknown schema version");
            return false;
        }

        if self
            .ledger
            .replace(blob.progress, blob.questions, blob.notifications)
            .is_err()
        {
            return false;
        }
        self.achievements.replace(blob.achievements);
        true
    }
}

/// `round(value * multiplier)` as specified; multipliers apply to the
/// running value one at a time, never pre-combined.
fn apply_multiplier(value: i64, multiplier: f64) -> i64 {
    (value as f64 * multiplier).round() as i64
}

fn effective_score(data: &ActivityData) -> Option<u32> {
    data.score
        .or_else(|| data.rating.map(|r| r.score()))
        .or_else(|| data.is_correct.map(|c| if c { 90 } else { 40 }))
}

fn build_summary(result: &RewardResult) -> String {
    let mut parts = Vec::new();
    if result.xp_earned > 0 {
        parts.push(format!("+{} XP", result.xp_earned));
    }
    if result.credits_earned > 0 {
        parts.push(format!("+{} credits", result.credits_earned));
    } else if result.credits_earned < 0 {
        parts.push(format!("{} credits", result.credits_earned));
    }
    if result.credits_spent > 0 {
        parts.push(format!("-{} credits spent", result.credits_spent));
    }
    if let Some(level) = result.new_level {
        parts.push(format!("Level up! Now level {level}"));
    }
    for achievement in &result.achievements_unlocked {
        parts.push(format!("Unlocked: {}", achievement.name));
    }
    if result.streak.is_new_day && result.streak.current_streak > 1 {
        parts.push(format!("{}-day streak", result.streak.current_streak));
    }
    if parts.is_empty() {
        "No rewards".to_string()
    } else {
        parts.join(", ")
    }
}
