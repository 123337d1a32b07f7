//! # prepmastery-progression - Progression engine for interview practice
//!
//! This crate turns a stream of discrete user activity events into durable
//! account state:
//!
//! - **XP and levels** - threshold-table levels, always derived from XP
//! - **Credits** - spendable balance with a hard zero floor
//! - **Daily streaks** - calendar-day arithmetic, timezone safe
//! - **Spaced repetition** - SM-2 style per-question review scheduling
//! - **Achievements** - idempotent threshold unlocks over ledger counters
//!
//! Everything is synchronous and run-to-completion: one
//! [`ActivityProcessor::process_activity`] call reads the ledger, computes
//! the reward, persists the new totals, re-evaluates achievements, and
//! returns a [`RewardResult`] before the next event is accepted.
//!
//! ## Module structure
//!
//! - [`config`] - static reward tables, level thresholds, SM-2 constants
//! - [`types`] - events, account state, review records, results
//! - [`store`] - key-value persistence collaborator
//! - [`streak`] - day-boundary streak transitions
//! - [`srs`] - spaced-repetition scheduling
//! - [`ledger`] - canonical account-state store
//! - [`achievements`] - counter-driven achievement engine
//! - [`processor`] - per-event orchestration
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Utc;
//! use prepmastery_progression::{
//!     ActivityData, ActivityEvent, ActivityProcessor, ActivityType, Difficulty, MemoryStore,
//! };
//!
//! let store = Arc::new(MemoryStore::new());
//! let mut processor = ActivityProcessor::new(store, "local-user", Utc::now());
//!
//! let event = ActivityEvent::new(ActivityType::QuestionCompleted, Utc::now())
//!     .with_data(ActivityData {
//!         difficulty: Some(Difficulty::Advanced),
//!         question_id: Some("two-sum".to_string()),
//!         score: Some(92),
//!         ..Default::default()
//!     });
//! let result = processor.process_activity(&event);
//! assert!(result.xp_earned > 0);
//! ```

pub mod achievements;
pub mod config;
pub mod error;
pub mod ledger;
pub mod processor;
pub mod srs;
pub mod store;
pub mod streak;
pub mod types;

pub use achievements::{AchievementEngine, CounterSnapshot, MetricKind};
pub use config::{RewardConfig, SrsParams};
pub use error::{ProgressionError, ProgressionResult};
pub use ledger::{Counter, LevelChange, ProgressLedger, SpendOutcome};
pub use processor::{ActivityProcessor, ListenerId};
pub use store::{KeyValueStore, MemoryStore, StoreError};
pub use streak::{StreakTransition, StreakUpdate};
pub use types::{
    Achievement, AchievementReward, ActivityData, ActivityEvent, ActivityType, Difficulty,
    ExportBlob, InterviewVerdict, NotificationKind, ProgressSummary, QuestionProgress,
    RewardNotification, RewardResult, SrsRating, SrsStatus, StreakInfo, UserProgressState,
};
