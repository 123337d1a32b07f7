//! Per-question spaced-repetition scheduling (SM-2 variant).
//!
//! The update rule takes a 0-100 score. Scores at or above the pass
//! threshold extend the review interval; anything below fully resets the
//! repetition chain. The ease factor is recomputed on every attempt,
//! regardless of branch, and floored at the configured minimum.

use chrono::{DateTime, Duration, Utc};

use crate::config::SrsParams;
use crate::types::{QuestionProgress, SrsStatus};

/// Apply one review with the given score to a question record.
///
/// Attempt counters update on every call, independent of the pass/fail
/// branch.
pub fn review(
    record: &mut QuestionProgress,
    score: u32,
    now: DateTime<Utc>,
    params: &SrsParams,
) {
    let score = score.min(100);

    record.attempts += 1;
    record.best_score = record.best_score.max(score);
    record.last_score = score;
    record.average_score +=
        (score as f64 - record.average_score) / record.attempts as f64;

    if score >= params.pass_score {
        record.repetitions += 1;
        record.interval_days = match record.repetitions {
            1 => params.first_interval_days,
            2 => params.second_interval_days,
            _ => (record.interval_days as f64 * record.ease_factor).round() as u32,
        };
    } else {
        record.repetitions = 0;
        record.interval_days = params.first_interval_days;
    }
    record.interval_days = record.interval_days.max(1);

    // SM-2 ease update with quality mapped from the 0-100 score onto 0-5.
    let quality = score as f64 / 20.0;
    let miss = 5.0 - quality;
    record.ease_factor =
        (record.ease_factor + (0.1 - miss * (0.08 + miss * 0.02))).max(params.min_ease);

    record.next_review = now + Duration::days(record.interval_days as i64);
    record.status = classify(record.repetitions, score, params);
    record.mastered = record.status == SrsStatus::Mastered;
    record.updated_at = now;
}

fn classify(repetitions: u32, score: u32, params: &SrsParams) -> SrsStatus {
    if repetitions >= params.mastery_repetitions && score >= params.mastery_score {
        SrsStatus::Mastered
    } else if repetitions >= 2 {
        SrsStatus::Reviewing
    } else if repetitions >= 1 {
        SrsStatus::Learning
    } else {
        SrsStatus::New
    }
}

/// Whether a record is due: `next_review <= now` and not yet mastered.
pub fn is_due(record: &QuestionProgress, now: DateTime<Utc>) -> bool {
    record.next_review <= now && !record.mastered
}
