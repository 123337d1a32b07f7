//! Canonical account-state store.
//!
//! The ledger exclusively owns the `UserProgressState`, the per-question
//! review records, and the bounded notification history. Every mutation
//! goes through its API; level is always recomputed from XP and the credit
//! balance can never go negative.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{self, SrsParams};
use crate::store::{keys, KeyValueStore, StoreError};
use crate::streak;
use crate::types::{
    NotificationKind, QuestionProgress, RewardNotification, StreakInfo, UserProgressState,
};
use crate::{srs, ProgressionResult};

/// Result of a spend attempt. Insufficient balance is a failure result,
/// never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendOutcome {
    pub success: bool,
    pub balance: i64,
}

/// Level transition reported by `add_xp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub previous_level: u32,
    pub new_level: u32,
}

impl LevelChange {
    pub fn leveled_up(&self) -> bool {
        self.new_level > self.previous_level
    }
}

/// Ledger counters addressable through `increment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    QuestionsCompleted,
    BeginnerCompleted,
    IntermediateCompleted,
    AdvancedCompleted,
    QuizCorrect,
    QuizWrong,
    VoiceInterviewsCompleted,
    VoiceInterviewsPassed,
    SrsReviewsCompleted,
    DailyLogins,
    SessionsStarted,
    SessionActivities,
    DailyActivityCount,
    WeeklyPracticeMinutes,
}

pub struct ProgressLedger {
    store: Arc<dyn KeyValueStore>,
    user_id: String,
    state: UserProgressState,
    questions: HashMap<String, QuestionProgress>,
    notifications: VecDeque<RewardNotification>,
    next_notification_id: u64,
    srs_params: SrsParams,
    persistence_degraded: bool,
}

impl ProgressLedger {
    /// Load the ledger for a user, bootstrapping the default state when
    /// nothing is persisted yet. Corrupt values are logged and replaced by
    /// defaults; availability wins over the broken data.
    pub fn load(store: Arc<dyn KeyValueStore>, user_id: &str, now: DateTime<Utc>) -> Self {
        let state = read_json(store.as_ref(), &keys::progress(user_id))
            .unwrap_or_else(|| UserProgressState::bootstrap(now));
        let questions: HashMap<String, QuestionProgress> =
            read_json(store.as_ref(), &keys::questions(user_id)).unwrap_or_default();
        let notifications: VecDeque<RewardNotification> =
            read_json(store.as_ref(), &keys::notifications(user_id)).unwrap_or_default();

        if let Ok(None) = store.get(keys::SCHEMA_VERSION) {
            let _ = store.set(keys::SCHEMA_VERSION, &config::SCHEMA_VERSION.to_string());
        }

        let next_notification_id = notifications
            .iter()
            .map(|n| n.id + 1)
            .max()
            .unwrap_or(1);

        Self {
            store,
            user_id: user_id.to_string(),
            state,
            questions,
            notifications,
            next_notification_id,
            srs_params: SrsParams::default(),
            persistence_degraded: false,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn progress(&self) -> &UserProgressState {
        &self.state
    }

    /// Apply a partial update to the progress state. Level and streak
    /// invariants are re-established afterwards, so the closure cannot
    /// leave the state inconsistent.
    pub fn update_progress<F>(&mut self, now: DateTime<Utc>, apply: F)
    where
        F: FnOnce(&mut UserProgressState),
    {
        apply(&mut self.state);
        self.state.level = config::level_for_xp(self.state.total_xp);
        self.state.longest_streak = self.state.longest_streak.max(self.state.current_streak);
        self.state.credit_balance = self.state.credit_balance.max(0);
        self.state.updated_at = now;
    }

    // ========== XP and credits ==========

    /// Add XP and recompute the level from the threshold table.
    pub fn add_xp(&mut self, amount: i64, now: DateTime<Utc>) -> LevelChange {
        let previous_level = self.state.level;
        self.state.total_xp += amount.max(0);
        self.state.level = config::level_for_xp(self.state.total_xp);
        self.state.updated_at = now;

        let change = LevelChange {
            previous_level,
            new_level: self.state.level,
        };
        if change.leveled_up() {
            tracing::info!(
                user_id = %self.user_id,
                level = change.new_level,
                "level up"
            );
        }
        change
    }

    /// Add (or debit) credits. Debits are clamped so the balance never goes
    /// below zero; the applied delta is returned.
    pub fn add_credits(&mut self, delta: i64, now: DateTime<Utc>) -> i64 {
        let applied = delta.max(-self.state.credit_balance);
        self.state.credit_balance += applied;
        if applied > 0 {
            self.state.total_credits_earned += applied;
        }
        self.state.updated_at = now;
        applied
    }

    /// Spend credits. Rejects without side effects when the balance is
    /// insufficient.
    pub fn spend_credits(&mut self, amount: i64, now: DateTime<Utc>) -> SpendOutcome {
        if amount < 0 || amount > self.state.credit_balance {
            return SpendOutcome {
                success: false,
                balance: self.state.credit_balance,
            };
        }
        self.state.credit_balance -= amount;
        self.state.total_credits_spent += amount;
        self.state.updated_at = now;
        SpendOutcome {
            success: true,
            balance: self.state.credit_balance,
        }
    }

    // ========== Counters ==========

    pub fn increment(&mut self, counter: Counter, amount: u32, now: DateTime<Utc>) {
        let slot = match counter {
            Counter::QuestionsCompleted => &mut self.state.questions_completed,
            Counter::BeginnerCompleted => &mut self.state.beginner_completed,
            Counter::IntermediateCompleted => &mut self.state.intermediate_completed,
            Counter::AdvancedCompleted => &mut self.state.advanced_completed,
            Counter::QuizCorrect => &mut self.state.quiz_correct,
            Counter::QuizWrong => &mut self.state.quiz_wrong,
            Counter::VoiceInterviewsCompleted => &mut self.state.voice_interviews_completed,
            Counter::VoiceInterviewsPassed => &mut self.state.voice_interviews_passed,
            Counter::SrsReviewsCompleted => &mut self.state.srs_reviews_completed,
            Counter::DailyLogins => &mut self.state.daily_logins,
            Counter::SessionsStarted => &mut self.state.sessions_started,
            Counter::SessionActivities => &mut self.state.session_activities,
            Counter::DailyActivityCount => &mut self.state.daily_activity_count,
            Counter::WeeklyPracticeMinutes => &mut self.state.weekly_practice_minutes,
        };
        *slot += amount;
        self.state.updated_at = now;
    }

    pub fn increment_channel(&mut self, channel: &str, now: DateTime<Utc>) {
        *self
            .state
            .channel_progress
            .entry(channel.to_string())
            .or_insert(0) += 1;
        self.state.updated_at = now;
    }

    /// A new session resets the per-session counters.
    pub fn reset_session_counters(&mut self, now: DateTime<Utc>) {
        self.state.session_activities = 0;
        self.state.updated_at = now;
    }

    // ========== Streak ==========

    /// Apply the day-boundary streak transition for `today`. Idempotent
    /// within a calendar day; resets the daily activity counter whenever a
    /// new day starts.
    pub fn touch_streak(&mut self, today: NaiveDate, now: DateTime<Utc>) -> StreakInfo {
        let update = streak::evaluate(self.state.last_activity_date, today);
        self.state.current_streak = update.apply(self.state.current_streak);
        self.state.longest_streak = self.state.longest_streak.max(self.state.current_streak);
        if update.is_new_day {
            self.state.daily_activity_count = 0;
            self.state.last_activity_date = Some(today);
        }
        self.state.updated_at = now;

        StreakInfo {
            current_streak: self.state.current_streak,
            longest_streak: self.state.longest_streak,
            is_new_day: update.is_new_day,
            streak_broken: update.streak_broken,
        }
    }

    /// Streak slice without mutating anything, for non-streak-eligible
    /// events.
    pub fn streak_snapshot(&self) -> StreakInfo {
        StreakInfo {
            current_streak: self.state.current_streak,
            longest_streak: self.state.longest_streak,
            is_new_day: false,
            streak_broken: false,
        }
    }

    // ========== Question progress ==========

    /// Record one scored attempt on a question, creating the record on
    /// first contact and running the review scheduler.
    pub fn record_attempt(
        &mut self,
        question_id: &str,
        score: u32,
        now: DateTime<Utc>,
    ) -> &QuestionProgress {
        let record = self
            .questions
            .entry(question_id.to_string())
            .or_insert_with(|| QuestionProgress::new(question_id, now));
        srs::review(record, score, now, &self.srs_params);
        record
    }

    pub fn question(&self, question_id: &str) -> Option<&QuestionProgress> {
        self.questions.get(question_id)
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Records due for review: `next_review <= now` and not mastered.
    pub fn due_for_review(&self, now: DateTime<Utc>) -> Vec<&QuestionProgress> {
        let mut due: Vec<&QuestionProgress> = self
            .questions
            .values()
            .filter(|record| srs::is_due(record, now))
            .collect();
        due.sort_by_key(|record| record.next_review);
        due
    }

    /// Fraction of attempted questions currently mastered. Zero records
    /// report 0.0, never NaN.
    pub fn mastery_rate(&self) -> f64 {
        if self.questions.is_empty() {
            return 0.0;
        }
        let mastered = self.questions.values().filter(|q| q.mastered).count();
        mastered as f64 / self.questions.len() as f64
    }

    // ========== Notifications ==========

    /// Queue a notification, most-recent-first, trimming past the cap.
    pub fn push_notification(
        &mut self,
        kind: NotificationKind,
        title: &str,
        body: &str,
        now: DateTime<Utc>,
    ) {
        let id = self.next_notification_id;
        self.next_notification_id += 1;
        self.notifications.push_front(RewardNotification {
            id,
            kind,
            title: title.to_string(),
            body: body.to_string(),
            created_at: now,
        });
        self.notifications
            .truncate(config::NOTIFICATION_HISTORY_CAP);
    }

    pub fn notifications(&self) -> impl Iterator<Item = &RewardNotification> {
        self.notifications.iter()
    }

    // ========== Persistence ==========

    pub fn persistence_degraded(&self) -> bool {
        self.persistence_degraded
    }

    /// Write all ledger slices to the store. A capacity failure triggers a
    /// bounded cleanup (the cached notification history is dropped) and one
    /// retry; if that also fails the in-memory state stays authoritative
    /// and the ledger is marked degraded.
    pub fn persist(&mut self) {
        match self.try_persist() {
            Ok(()) => {
                self.persistence_degraded = false;
            }
            Err(StoreError::CapacityExceeded { key }) => {
                tracing::warn!(key = %key, "store capacity exceeded, trimming history and retrying");
                self.notifications.clear();
                if let Err(err) = self.try_persist() {
                    tracing::warn!(error = %err, "persist retry failed, running degraded");
                    self.persistence_degraded = true;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "persist failed, running degraded");
                self.persistence_degraded = true;
            }
        }
    }

    fn try_persist(&self) -> Result<(), StoreError> {
        let progress = serde_json::to_string(&self.state)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        let questions = serde_json::to_string(&self.questions)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        let notifications = serde_json::to_string(&self.notifications)
            .map_err(|e| StoreError::Io(e.to_string()))?;

        self.store.set(&keys::progress(&self.user_id), &progress)?;
        self.store.set(&keys::questions(&self.user_id), &questions)?;
        self.store
            .set(&keys::notifications(&self.user_id), &notifications)?;
        self.store
            .set(keys::SCHEMA_VERSION, &config::SCHEMA_VERSION.to_string())?;
        Ok(())
    }

    // ========== Bulk transfer ==========

    pub fn snapshot_questions(&self) -> HashMap<String, QuestionProgress> {
        self.questions.clone()
    }

    pub fn snapshot_notifications(&self) -> Vec<RewardNotification> {
        self.notifications.iter().cloned().collect()
    }

    /// Replace all ledger state from a validated import blob.
    pub fn replace(
        &mut self,
        state: UserProgressState,
        questions: HashMap<String, QuestionProgress>,
        notifications: Vec<RewardNotification>,
    ) -> ProgressionResult<()> {
        self.state = state;
        self.state.level = config::level_for_xp(self.state.total_xp);
        self.state.longest_streak = self.state.longest_streak.max(self.state.current_streak);
        self.state.credit_balance = self.state.credit_balance.max(0);
        self.questions = questions;
        self.notifications = notifications.into_iter().collect();
        self.next_notification_id = self
            .notifications
            .iter()
            .map(|n| n.id + 1)
            .max()
            .unwrap_or(1);
        self.persist();
        Ok(())
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    match store.get(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "corrupt persisted state, falling back to default");
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(key = %key, error = %err, "store read failed, falling back to default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn ledger_with_store() -> (ProgressLedger, MemoryStore) {
        let store = MemoryStore::new();
        let ledger = ProgressLedger::load(Arc::new(store.clone()), "user-1", Utc::now());
        (ledger, store)
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let first = ProgressLedger::load(Arc::clone(&store), "user-1", Utc::now());
        let second = ProgressLedger::load(Arc::clone(&store), "user-1", Utc::now());

        assert_eq!(first.progress().credit_balance, 500);
        assert_eq!(second.progress().credit_balance, 500);
        assert_eq!(first.progress().level, 1);
    }

    #[test]
    fn test_add_xp_recomputes_level() {
        let (mut ledger, _) = ledger_with_store();
        let now = Utc::now();

        let change = ledger.add_xp(50, now);
        assert!(!change.leveled_up());
        assert_eq!(ledger.progress().level, 1);

        let change = ledger.add_xp(60, now);
        assert!(change.leveled_up());
        assert_eq!(change.previous_level, 1);
        assert_eq!(change.new_level, 2);
        assert_eq!(ledger.progress().total_xp, 110);
    }

    #[test]
    fn test_spend_rejects_overdraft() {
        let (mut ledger, _) = ledger_with_store();
        let now = Utc::now();

        let outcome = ledger.spend_credits(501, now);
        assert!(!outcome.success);
        assert_eq!(outcome.balance, 500);
        assert_eq!(ledger.progress().total_credits_spent, 0);

        let outcome = ledger.spend_credits(500, now);
        assert!(outcome.success);
        assert_eq!(outcome.balance, 0);
        assert_eq!(ledger.progress().total_credits_spent, 500);

        let outcome = ledger.spend_credits(1, now);
        assert!(!outcome.success);
        assert_eq!(ledger.progress().credit_balance, 0);
    }

    #[test]
    fn test_negative_spend_is_rejected() {
        let (mut ledger, _) = ledger_with_store();
        let outcome = ledger.spend_credits(-10, Utc::now());
        assert!(!outcome.success);
        assert_eq!(ledger.progress().credit_balance, 500);
    }

    #[test]
    fn test_credit_debit_clamped_to_balance() {
        let (mut ledger, _) = ledger_with_store();
        let now = Utc::now();
        ledger.spend_credits(500, now);

        let applied = ledger.add_credits(-2, now);
        assert_eq!(applied, 0);
        assert_eq!(ledger.progress().credit_balance, 0);
    }

    #[test]
    fn test_streak_continuation_and_reset() {
        let (mut ledger, _) = ledger_with_store();
        let now = Utc::now();

        let info = ledger.touch_streak(day(2026, 8, 27), now);
        assert_eq!(info.current_streak, 1);
        assert!(info.is_new_day);

        let info = ledger.touch_streak(day(2026, 8, 28), now);
        assert_eq!(info.current_streak, 2);

        // Same-day repeat is a no-op.
        let info = ledger.touch_streak(day(2026, 8, 28), now);
        assert_eq!(info.current_streak, 2);
        assert!(!info.is_new_day);

        let info = ledger.touch_streak(day(2026, 8, 31), now);
        assert_eq!(info.current_streak, 1);
        assert!(info.streak_broken);
        assert_eq!(info.longest_streak, 2);
        assert!(ledger.progress().longest_streak >= ledger.progress().current_streak);
    }

    #[test]
    fn test_record_attempt_creates_then_mutates() {
        let (mut ledger, _) = ledger_with_store();
        let now = Utc::now();

        ledger.record_attempt("q-1", 85, now);
        assert_eq!(ledger.question("q-1").unwrap().attempts, 1);

        ledger.record_attempt("q-1", 95, now);
        let record = ledger.question("q-1").unwrap();
        assert_eq!(record.attempts, 2);
        assert_eq!(record.best_score, 95);
        assert_eq!(ledger.question_count(), 1);
    }

    #[test]
    fn test_mastery_rate_zero_records() {
        let (ledger, _) = ledger_with_store();
        assert_eq!(ledger.mastery_rate(), 0.0);
    }

    #[test]
    fn test_mastery_rate_fraction() {
        let (mut ledger, _) = ledger_with_store();
        let now = Utc::now();

        for _ in 0..3 {
            ledger.record_attempt("q-mastered", 95, now);
        }
        ledger.record_attempt("q-learning", 85, now);

        assert!((ledger.mastery_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_due_for_review_ordering() {
        let (mut ledger, _) = ledger_with_store();
        let now = Utc::now();

        ledger.record_attempt("q-late", 85, now - chrono::Duration::days(10));
        ledger.record_attempt("q-soon", 85, now - chrono::Duration::days(2));
        ledger.record_attempt("q-future", 85, now);

        let due = ledger.due_for_review(now);
        let ids: Vec<&str> = due.iter().map(|q| q.question_id.as_str()).collect();
        assert_eq!(ids, vec!["q-late", "q-soon"]);
    }

    #[test]
    fn test_notification_history_is_capped_most_recent_first() {
        let (mut ledger, _) = ledger_with_store();
        let now = Utc::now();

        for i in 0..60 {
            ledger.push_notification(
                NotificationKind::LevelUp,
                &format!("n{i}"),
                "",
                now,
            );
        }

        let titles: Vec<&str> = ledger.notifications().map(|n| n.title.as_str()).collect();
        assert_eq!(titles.len(), config::NOTIFICATION_HISTORY_CAP);
        assert_eq!(titles[0], "n59");
    }

    #[test]
    fn test_persist_round_trip() {
        let (mut ledger, store) = ledger_with_store();
        let now = Utc::now();

        ledger.add_xp(300, now);
        ledger.record_attempt("q-1", 90, now);
        ledger.persist();
        assert!(!ledger.persistence_degraded());

        let reloaded = ProgressLedger::load(Arc::new(store), "user-1", now);
        assert_eq!(reloaded.progress().total_xp, 300);
        assert_eq!(reloaded.progress().level, 3);
        assert_eq!(reloaded.question("q-1").unwrap().attempts, 1);
    }

    #[test]
    fn test_persist_capacity_trims_and_retries() {
        let store = MemoryStore::new();
        let mut ledger = ProgressLedger::load(Arc::new(store.clone()), "user-1", Utc::now());
        let now = Utc::now();

        for i in 0..40 {
            ledger.push_notification(NotificationKind::LevelUp, &format!("n{i}"), "body", now);
        }
        // Tight quota: the full write fails, the trimmed retry fits.
        store.set_quota(Some(3_000));
        ledger.persist();

        assert!(!ledger.persistence_degraded());
        assert_eq!(ledger.notifications().count(), 0);
    }

    #[test]
    fn test_persist_degraded_keeps_memory_authoritative() {
        let store = MemoryStore::with_quota(10);
        let mut ledger = ProgressLedger::load(Arc::new(store), "user-1", Utc::now());
        let now = Utc::now();

        ledger.add_xp(120, now);
        ledger.persist();

        assert!(ledger.persistence_degraded());
        assert_eq!(ledger.progress().total_xp, 120);
        assert_eq!(ledger.progress().level, 2);
    }

    #[test]
    fn test_corrupt_state_falls_back_to_default() {
        let store = MemoryStore::new();
        store.put_raw(&keys::progress("user-1"), "{not json");

        let ledger = ProgressLedger::load(Arc::new(store), "user-1", Utc::now());
        assert_eq!(ledger.progress().total_xp, 0);
        assert_eq!(ledger.progress().credit_balance, 500);
    }

    #[test]
    fn test_update_progress_restores_invariants() {
        let (mut ledger, _) = ledger_with_store();
        let now = Utc::now();

        ledger.update_progress(now, |state| {
            state.total_xp = 500;
            state.level = 99; // overwritten by the derived value
            state.current_streak = 9;
            state.longest_streak = 2;
        });

        assert_eq!(ledger.progress().level, 4);
        assert_eq!(ledger.progress().longest_streak, 9);
    }
}
