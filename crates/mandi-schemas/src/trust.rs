//! Bounded reputation arithmetic.
//!
//! Trust scores live in [0.0, 5.0] and move only on successful delivery:
//! +0.1 per party per deal, applied exactly once on the first entry to
//! DELIVERED. There is no decay and no penalty path — cancellation changes
//! no score.

/// New accounts start here.
pub const DEFAULT_SCORE: f64 = 3.0;

/// Increment applied to each party on first delivery.
pub const REWARD_STEP: f64 = 0.1;

/// Hard ceiling. Scores never exceed this.
pub const MAX_SCORE: f64 = 5.0;

/// One delivery reward, clamped at the ceiling.
pub fn rewarded(score: f64) -> f64 {
    (score + REWARD_STEP).min(MAX_SCORE)
}
