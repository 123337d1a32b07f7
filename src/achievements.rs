//! Threshold-based achievement engine.
//!
//! Evaluators read ledger counters after every processed activity and
//! unlock each achievement at most once. Streak milestones compare with
//! `>=` so a milestone can never be skipped when the streak value jumps
//! past it between observations; exact equality is reserved for strictly
//! incrementing one-at-a-time counters, which are guaranteed to be seen at
//! every integer value.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{keys, KeyValueStore};
use crate::types::{Achievement, AchievementReward, ActivityType, UserProgressState};

/// Counter metric an achievement is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    QuestionsCompleted,
    QuizzesCorrect,
    VoiceSessions,
    StreakDays,
    /// Percentage of attempted questions mastered, 0-100.
    MasteryRate,
    /// Practice minutes this week against the user's weekly goal.
    WeeklyPracticeMinutes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    AtLeast,
    /// Only safe for counters that increment by exactly one per observed
    /// event.
    Exact,
}

/// Static achievement definition.
#[derive(Debug, Clone)]
pub struct AchievementDef {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub tier: u8,
    pub icon: &'static str,
    pub metric: MetricKind,
    pub threshold: f64,
    pub comparison: Comparison,
    pub reward: AchievementReward,
}

/// Counter snapshot handed to the evaluators; taken from the ledger after
/// the event's own counter updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterSnapshot {
    pub questions_completed: u32,
    pub quizzes_correct: u32,
    pub voice_sessions: u32,
    pub streak_days: u32,
    /// 0.0-1.0; scaled to percent for threshold comparison.
    pub mastery_rate: f64,
    pub weekly_practice_minutes: u32,
    pub weekly_goal_minutes: u32,
}

impl CounterSnapshot {
    pub fn from_state(state: &UserProgressState, mastery_rate: f64) -> Self {
        Self {
            questions_completed: state.questions_completed,
            quizzes_correct: state.quiz_correct,
            voice_sessions: state.voice_interviews_completed,
            streak_days: state.current_streak,
            mastery_rate,
            weekly_practice_minutes: state.weekly_practice_minutes,
            weekly_goal_minutes: state.weekly_goal_minutes,
        }
    }

    fn value_for(&self, metric: MetricKind) -> f64 {
        match metric {
            MetricKind::QuestionsCompleted => self.questions_completed as f64,
            MetricKind::QuizzesCorrect => self.quizzes_correct as f64,
            MetricKind::VoiceSessions => self.voice_sessions as f64,
            MetricKind::StreakDays => self.streak_days as f64,
            MetricKind::MasteryRate => self.mastery_rate * 100.0,
            MetricKind::WeeklyPracticeMinutes => self.weekly_practice_minutes as f64,
        }
    }
}

/// Activity type to evaluated metrics. Types without a mapping evaluate
/// nothing; that is the documented fallback, not an error.
pub fn metrics_for(activity: ActivityType) -> &'static [MetricKind] {
    match activity {
        ActivityType::QuestionCompleted => &[
            MetricKind::QuestionsCompleted,
            MetricKind::StreakDays,
            MetricKind::MasteryRate,
            MetricKind::WeeklyPracticeMinutes,
        ],
        ActivityType::QuizAnswered => &[
            MetricKind::QuizzesCorrect,
            MetricKind::StreakDays,
            MetricKind::WeeklyPracticeMinutes,
        ],
        ActivityType::VoiceInterviewCompleted => &[
            MetricKind::VoiceSessions,
            MetricKind::StreakDays,
            MetricKind::WeeklyPracticeMinutes,
        ],
        ActivityType::SrsReviewCompleted => &[
            MetricKind::StreakDays,
            MetricKind::MasteryRate,
            MetricKind::WeeklyPracticeMinutes,
        ],
        ActivityType::DailyLogin => &[MetricKind::StreakDays],
        ActivityType::SessionStarted | ActivityType::QuestionViewed => &[],
    }
}

/// Built-in achievement table, grouped roughly by tier.
pub fn default_definitions() -> Vec<AchievementDef> {
    use Comparison::{AtLeast, Exact};

    let mut defs = vec![
        AchievementDef {
            id: "first_question",
            name: "Breaking the Ice",
            description: "Complete your first interview question",
            tier: 1,
            icon: "chat",
            metric: MetricKind::QuestionsCompleted,
            threshold: 1.0,
            comparison: Exact,
            reward: AchievementReward { xp: 50, credits: 25 },
        },
        AchievementDef {
            id: "first_quiz",
            name: "Pop Quiz",
            description: "Answer your first quiz question correctly",
            tier: 1,
            icon: "check",
            metric: MetricKind::QuizzesCorrect,
            threshold: 1.0,
            comparison: Exact,
            reward: AchievementReward { xp: 25, credits: 10 },
        },
        AchievementDef {
            id: "first_voice",
            name: "Finding Your Voice",
            description: "Finish your first voice interview",
            tier: 1,
            icon: "mic",
            metric: MetricKind::VoiceSessions,
            threshold: 1.0,
            comparison: Exact,
            reward: AchievementReward { xp: 100, credits: 50 },
        },
        AchievementDef {
            id: "questions_10",
            name: "Getting Warmed Up",
            description: "Complete 10 questions",
            tier: 2,
            icon: "flame",
            metric: MetricKind::QuestionsCompleted,
            threshold: 10.0,
            comparison: AtLeast,
            reward: AchievementReward { xp: 100, credits: 50 },
        },
        AchievementDef {
            id: "questions_50",
            name: "Question Grinder",
            description: "Complete 50 questions",
            tier: 3,
            icon: "gear",
            metric: MetricKind::QuestionsCompleted,
            threshold: 50.0,
            comparison: AtLeast,
            reward: AchievementReward { xp: 300, credits: 150 },
        },
        AchievementDef {
            id: "voice_10",
            name: "Seasoned Speaker",
            description: "Finish 10 voice interviews",
            tier: 2,
            icon: "mic",
            metric: MetricKind::VoiceSessions,
            threshold: 10.0,
            comparison: Exact,
            reward: AchievementReward { xp: 250, credits: 100 },
        },
        AchievementDef {
            id: "voice_25",
            name: "Interview Veteran",
            description: "Finish 25 voice interviews",
            tier: 3,
            icon: "trophy",
            metric: MetricKind::VoiceSessions,
            threshold: 25.0,
            comparison: Exact,
            reward: AchievementReward { xp: 600, credits: 250 },
        },
        AchievementDef {
            id: "voice_50",
            name: "Master Interviewer",
            description: "Finish 50 voice interviews",
            tier: 4,
            icon: "crown",
            metric: MetricKind::VoiceSessions,
            threshold: 50.0,
            comparison: Exact,
            reward: AchievementReward { xp: 1_200, credits: 500 },
        },
        AchievementDef {
            id: "weekly_goal",
            name: "Goal Getter",
            description: "Hit your weekly practice goal",
            tier: 2,
            icon: "target",
            metric: MetricKind::WeeklyPracticeMinutes,
            // Threshold resolved against the user's own goal at evaluation.
            threshold: 0.0,
            comparison: AtLeast,
            reward: AchievementReward { xp: 150, credits: 75 },
        },
    ];

    let streak_milestones: [(&'static str, &'static str, &'static str, f64, u8, i64, i64); 5] = [
        ("streak_3", "3-Day Streak", "Practice 3 days in a row", 3.0, 1, 50, 25),
        ("streak_7", "7-Day Streak", "Practice 7 days in a row", 7.0, 2, 150, 75),
        ("streak_14", "14-Day Streak", "Practice 14 days in a row", 14.0, 2, 300, 150),
        ("streak_30", "30-Day Streak", "Practice 30 days in a row", 30.0, 3, 750, 300),
        ("streak_100", "100-Day Streak", "Practice 100 days in a row", 100.0, 4, 2_000, 1_000),
    ];
    for (id, name, description, threshold, tier, xp, credits) in streak_milestones {
        defs.push(AchievementDef {
            id,
            name,
            description,
            tier,
            icon: "calendar",
            metric: MetricKind::StreakDays,
            threshold,
            comparison: AtLeast,
            reward: AchievementReward { xp, credits },
        });
    }

    let mastery_milestones: [(&'static str, &'static str, &'static str, f64, u8, i64, i64); 4] = [
        ("mastery_10", "10% Mastery", "Master 10% of your attempted questions", 10.0, 1, 100, 50),
        ("mastery_25", "25% Mastery", "Master 25% of your attempted questions", 25.0, 2, 250, 100),
        ("mastery_50", "50% Mastery", "Master 50% of your attempted questions", 50.0, 3, 500, 250),
        ("mastery_75", "75% Mastery", "Master 75% of your attempted questions", 75.0, 4, 1_000, 500),
    ];
    for (id, name, description, threshold, tier, xp, credits) in mastery_milestones {
        defs.push(AchievementDef {
            id,
            name,
            description,
            tier,
            icon: "star",
            metric: MetricKind::MasteryRate,
            threshold,
            comparison: AtLeast,
            reward: AchievementReward { xp, credits },
        });
    }

    defs
}

/// Counter-driven achievement evaluator. Owns the unlock records; the
/// ledger counters are only read.
pub struct AchievementEngine {
    store: Arc<dyn KeyValueStore>,
    user_id: String,
    definitions: Vec<AchievementDef>,
    records: HashMap<String, Achievement>,
    persistence_degraded: bool,
}

impl AchievementEngine {
    pub fn load(store: Arc<dyn KeyValueStore>, user_id: &str) -> Self {
        let records: Vec<Achievement> = store
            .get(&keys::achievements(user_id))
            .ok()
            .flatten()
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    tracing::warn!(error = %err, "corrupt achievement records, starting fresh");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            store,
            user_id: user_id.to_string(),
            definitions: default_definitions(),
            records: records
                .into_iter()
                .map(|a| (a.achievement_id.clone(), a))
                .collect(),
            persistence_degraded: false,
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &Achievement> {
        self.records.values()
    }

    pub fn unlocked_count(&self) -> u32 {
        self.records.values().filter(|a| a.unlocked).count() as u32
    }

    /// Evaluate every definition mapped to this activity type against the
    /// snapshot. Returns the achievements newly unlocked by this call;
    /// already-unlocked records are untouched no-ops.
    pub fn evaluate(
        &mut self,
        activity: ActivityType,
        snapshot: &CounterSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<Achievement> {
        let metrics = metrics_for(activity);
        let mut newly_unlocked = Vec::new();

        for def in &self.definitions {
            if !metrics.contains(&def.metric) {
                continue;
            }

            let effective_threshold = match def.metric {
                MetricKind::WeeklyPracticeMinutes => snapshot.weekly_goal_minutes as f64,
                _ => def.threshold,
            };
            let value = snapshot.value_for(def.metric);

            let record = self
                .records
                .entry(def.id.to_string())
                .or_insert_with(|| Achievement {
                    achievement_id: def.id.to_string(),
                    name: def.name.to_string(),
                    description: def.description.to_string(),
                    tier: def.tier,
                    icon: def.icon.to_string(),
                    threshold: effective_threshold,
                    current_value: 0.0,
                    progress: 0.0,
                    unlocked: false,
                    unlocked_at: None,
                    reward: def.reward,
                });

            record.current_value = value;
            record.threshold = effective_threshold;
            if effective_threshold > 0.0 {
                record.progress = (value / effective_threshold * 100.0).min(100.0);
            }

            if record.unlocked {
                continue;
            }

            let hit = match def.comparison {
                Comparison::AtLeast => value >= effective_threshold,
                Comparison::Exact => (value - effective_threshold).abs() < f64::EPSILON,
            };
            if !hit {
                continue;
            }

            record.unlocked = true;
            record.unlocked_at = Some(now);
            record.progress = 100.0;
            tracing::info!(
                user_id = %self.user_id,
                achievement = %record.achievement_id,
                "achievement unlocked"
            );
            newly_unlocked.push(record.clone());
        }

        newly_unlocked
    }

    pub fn persistence_degraded(&self) -> bool {
        self.persistence_degraded
    }

    pub fn persist(&mut self) {
        let records: Vec<&Achievement> = self.records.values().collect();
        let raw = match serde_json::to_string(&records) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize achievements");
                self.persistence_degraded = true;
                return;
            }
        };
        match self.store.set(&keys::achievements(&self.user_id), &raw) {
            Ok(()) => self.persistence_degraded = false,
            Err(err) => {
                tracing::warn!(error = %err, "achievement persist failed, running degraded");
                self.persistence_degraded = true;
            }
        }
    }

    pub fn snapshot(&self) -> Vec<Achievement> {
        self.records.values().cloned().collect()
    }

    /// Replace all records from a validated import blob.
    pub fn replace(&mut self, records: Vec<Achievement>) {
        self.records = records
            .into_iter()
            .map(|a| (a.achievement_id.clone(), a))
            .collect();
        self.persist();
    }
}
