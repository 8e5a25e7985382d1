//! Lives ledger: a leaky-bucket resource that regenerates one unit per
//! fixed interval up to a cap and is spent one unit at a time. Pure
//! arithmetic over snapshots; persistence is the caller's concern.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_LIVES: u32 = 6;
pub const DEFAULT_REFILL_INTERVAL_MS: i64 = 15 * 60 * 1000;

const MINUTE_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivesState {
    pub lives: u32,
    pub max_lives: u32,
    pub last_updated_ms: i64,
    pub is_premium: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefillOutcome {
    Unchanged,
    Updated(LivesState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Spent(LivesState),
    Exhausted { minutes_to_next: i64 },
}

/// Regenerates whole elapsed intervals. `last_updated_ms` rolls forward by
/// exactly the intervals credited, so fractional progress toward the next
/// unit is preserved rather than reset.
pub fn refill(state: &LivesState, interval_ms: i64, now_ms: i64) -> RefillOutcome {
    if state.is_premium || state.lives >= state.max_lives {
        return RefillOutcome::Unchanged;
    }
    let elapsed = now_ms - state.last_updated_ms;
    if elapsed < interval_ms {
        return RefillOutcome::Unchanged;
    }
    let regenerated = (elapsed / interval_ms).min(i64::from(state.max_lives)) as u32;
    let lives = (state.lives + regenerated).min(state.max_lives);
    RefillOutcome::Updated(LivesState {
        lives,
        last_updated_ms: now_ms - elapsed % interval_ms,
        ..*state
    })
}

/// Refills first, then spends one unit. Spending resets the countdown for
/// the next unit to a full interval from now. Premium accounts always
/// succeed without mutation.
pub fn consume(state: &LivesState, interval_ms: i64, now_ms: i64) -> ConsumeOutcome {
    let current = match refill(state, interval_ms, now_ms) {
        RefillOutcome::Updated(updated) => updated,
        RefillOutcome::Unchanged => *state,
    };
    if current.is_premium {
        return ConsumeOutcome::Spent(current);
    }
    if current.lives == 0 {
        return ConsumeOutcome::Exhausted {
            minutes_to_next: minutes_to_next(&current, interval_ms, now_ms),
        };
    }
    ConsumeOutcome::Spent(LivesState {
        lives: current.lives - 1,
        last_updated_ms: now_ms,
        ..current
    })
}

/// Minutes until the next unit regenerates, rounded up. Zero only for
/// premium or already-full accounts.
pub fn minutes_to_next(state: &LivesState, interval_ms: i64, now_ms: i64) -> i64 {
    if state.is_premium || state.lives >= state.max_lives {
        return 0;
    }
    let elapsed = (now_ms - state.last_updated_ms).max(0);
    let remaining = interval_ms - elapsed % interval_ms;
    (remaining + MINUTE_MS - 1) / MINUTE_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: i64 = DEFAULT_REFILL_INTERVAL_MS;

    fn state(lives: u32, last_updated_ms: i64) -> LivesState {
        LivesState {
            lives,
            max_lives: DEFAULT_MAX_LIVES,
            last_updated_ms,
            is_premium: false,
        }
    }

    #[test]
    fn refill_is_noop_below_one_interval() {
        let s = state(2, 1_000);
        let now = 1_000 + INTERVAL - 1;
        assert_eq!(refill(&s, INTERVAL, now), RefillOutcome::Unchanged);
    }

    #[test]
    fn refill_preserves_partial_credit() {
        // 22 minutes elapsed: one interval plus 7 minutes of progress.
        let now = 100 * INTERVAL;
        let s = state(1, now - 22 * MINUTE_MS);
        match refill(&s, INTERVAL, now) {
            RefillOutcome::Updated(updated) => {
                assert_eq!(updated.lives, 2);
                assert_eq!(updated.last_updated_ms, now - 7 * MINUTE_MS);
            }
            RefillOutcome::Unchanged => panic!("expected refill"),
        }
    }

    #[test]
    fn refill_never_exceeds_cap() {
        let now = 1_000 + 50 * INTERVAL;
        let s = state(4, 1_000);
        match refill(&s, INTERVAL, now) {
            RefillOutcome::Updated(updated) => assert_eq!(updated.lives, DEFAULT_MAX_LIVES),
            RefillOutcome::Unchanged => panic!("expected refill"),
        }
    }

    #[test]
    fn refill_is_idempotent_with_no_elapsed_time() {
        let now = 1_000 + 2 * INTERVAL;
        let s = state(1, 1_000);
        let first = match refill(&s, INTERVAL, now) {
            RefillOutcome::Updated(updated) => updated,
            RefillOutcome::Unchanged => panic!("expected refill"),
        };
        assert_eq!(refill(&first, INTERVAL, now), RefillOutcome::Unchanged);
    }

    #[test]
    fn refill_skips_full_and_premium() {
        let now = 1_000 + 10 * INTERVAL;
        let full = state(DEFAULT_MAX_LIVES, 1_000);
        assert_eq!(refill(&full, INTERVAL, now), RefillOutcome::Unchanged);
        let premium = LivesState {
            is_premium: true,
            ..state(0, 1_000)
        };
        assert_eq!(refill(&premium, INTERVAL, now), RefillOutcome::Unchanged);
    }

    #[test]
    fn consume_spends_and_resets_countdown() {
        let now = 5 * INTERVAL;
        let s = state(3, now - 1_000);
        match consume(&s, INTERVAL, now) {
            ConsumeOutcome::Spent(updated) => {
                assert_eq!(updated.lives, 2);
                assert_eq!(updated.last_updated_ms, now);
            }
            ConsumeOutcome::Exhausted { .. } => panic!("expected spend"),
        }
    }

    #[test]
    fn consume_fails_when_exhausted() {
        let now = 5 * INTERVAL;
        let s = state(0, now - 3 * MINUTE_MS);
        match consume(&s, INTERVAL, now) {
            ConsumeOutcome::Exhausted { minutes_to_next } => {
                assert_eq!(minutes_to_next, 12);
            }
            ConsumeOutcome::Spent(_) => panic!("expected exhaustion"),
        }
    }

    #[test]
    fn consume_applies_refill_before_the_gate() {
        // lives = 0 but 16 minutes have passed: refill to 1, then spend it.
        let now = 10 * INTERVAL;
        let s = state(0, now - 16 * MINUTE_MS);
        match consume(&s, INTERVAL, now) {
            ConsumeOutcome::Spent(updated) => {
                assert_eq!(updated.lives, 0);
                assert_eq!(updated.last_updated_ms, now);
                assert_eq!(minutes_to_next(&updated, INTERVAL, now), 15);
            }
            ConsumeOutcome::Exhausted { .. } => panic!("refill must run before the gate"),
        }
    }

    #[test]
    fn premium_always_spends_without_mutation() {
        let now = 10 * INTERVAL;
        let premium = LivesState {
            is_premium: true,
            ..state(0, 1_000)
        };
        match consume(&premium, INTERVAL, now) {
            ConsumeOutcome::Spent(updated) => assert_eq!(updated, premium),
            ConsumeOutcome::Exhausted { .. } => panic!("premium never exhausts"),
        }
        assert_eq!(minutes_to_next(&premium, INTERVAL, now), 0);
    }

    #[test]
    fn minutes_round_up() {
        let now = 5 * INTERVAL;
        let s = state(1, now - 14 * MINUTE_MS - 1);
        assert_eq!(minutes_to_next(&s, INTERVAL, now), 1);
        let due = state(1, now - 14 * MINUTE_MS);
        assert_eq!(minutes_to_next(&due, INTERVAL, now), 1);
    }
}
