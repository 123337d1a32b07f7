//! Property-based tests for the progression engine invariants:
//! - the credit balance never goes negative under any spend/award sequence
//! - level is a non-decreasing function of XP
//! - the SRS ease factor stays floored and intervals stay positive
//! - `longest_streak >= current_streak` under any activity-day sequence

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use proptest::prelude::*;

use prepmastery_progression::config::{level_for_xp, SrsParams};
use prepmastery_progression::{srs, MemoryStore, ProgressLedger, QuestionProgress};

// ============================================================================
// Generators
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum CreditOp {
    Earn(i64),
    Penalty(i64),
    Spend(i64),
}

fn arb_credit_op() -> impl Strategy<Value = CreditOp> {
    prop_oneof![
        (0i64..=200).prop_map(CreditOp::Earn),
        (0i64..=200).prop_map(|n| CreditOp::Penalty(-n)),
        (0i64..=800).prop_map(CreditOp::Spend),
    ]
}

fn arb_score() -> impl Strategy<Value = u32> {
    0u32..=100
}

fn arb_day_offsets() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..=4, 1..40)
}

fn fresh_ledger() -> ProgressLedger {
    ProgressLedger::load(Arc::new(MemoryStore::new()), "pbt-user", Utc::now())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_balance_never_negative(ops in prop::collection::vec(arb_credit_op(), 1..60)) {
        let mut ledger = fresh_ledger();
        let now = Utc::now();

        for op in ops {
            match op {
                CreditOp::Earn(n) => {
                    ledger.add_credits(n, now);
                }
                CreditOp::Penalty(n) => {
                    ledger.add_credits(n, now);
                }
                CreditOp::Spend(n) => {
                    let outcome = ledger.spend_credits(n, now);
                    prop_assert!(outcome.balance >= 0);
                }
            }
            prop_assert!(ledger.progress().credit_balance >= 0);
        }

        let state = ledger.progress();
        prop_assert!(state.total_credits_earned >= 0);
        prop_assert!(state.total_credits_spent >= 0);
    }

    #[test]
    fn prop_level_never_decreases(awards in prop::collection::vec(0i64..=5_000, 1..50)) {
        let mut ledger = fresh_ledger();
        let now = Utc::now();
        let mut previous_level = ledger.progress().level;

        for amount in awards {
            let change = ledger.add_xp(amount, now);
            prop_assert!(change.new_level >= change.previous_level);
            prop_assert!(ledger.progress().level >= previous_level);
            prop_assert_eq!(ledger.progress().level, level_for_xp(ledger.progress().total_xp));
            previous_level = ledger.progress().level;
        }
    }

    #[test]
    fn prop_srs_ease_floored_and_interval_positive(scores in prop::collection::vec(arb_score(), 1..80)) {
        let params = SrsParams::default();
        let now = Utc::now();
        let mut record = QuestionProgress::new("q", now);

        for (i, score) in scores.iter().enumerate() {
            srs::review(&mut record, *score, now, &params);
            prop_assert!(record.ease_factor >= params.min_ease - 1e-9);
            prop_assert!(record.interval_days >= 1);
            prop_assert_eq!(record.attempts as usize, i + 1);
            prop_assert!(record.next_review > now);
            prop_assert!(record.average_score >= 0.0 && record.average_score <= 100.0);
        }
    }

    #[test]
    fn prop_longest_streak_dominates(offsets in arb_day_offsets()) {
        let mut ledger = fresh_ledger();
        let now = Utc::now();
        let mut day = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();

        for offset in offsets {
            day += Duration::days(offset as i64);
            let info = ledger.touch_streak(day, now);
            prop_assert!(info.longest_streak >= info.current_streak);
            prop_assert!(info.current_streak >= 1);
            prop_assert!(
                ledger.progress().longest_streak >= ledger.progress().current_streak
            );
        }
    }

    #[test]
    fn prop_mastery_rate_is_a_fraction(scores in prop::collection::vec((0usize..5, arb_score()), 0..60)) {
        let mut ledger = fresh_ledger();
        let now = Utc::now();

        for (question, score) in scores {
            ledger.record_attempt(&format!("q-{question}"), score, now);
            let rate = ledger.mastery_rate();
            prop_assert!(rate.is_finite());
            prop_assert!((0.0..=1.0).contains(&rate));
        }

        // Zero records must report 0, never NaN.
        let empty = fresh_ledger();
        prop_assert_eq!(empty.mastery_rate(), 0.0);
    }
}
