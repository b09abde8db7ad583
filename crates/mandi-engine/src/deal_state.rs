//! Deal status transition table.
//!
//! ```text
//!   LOCKED ──► IN_TRANSIT ──► DELIVERED (terminal, rewards both parties)
//!     │             │
//!     └──► CANCELLED ◄┘        (terminal, no score change)
//! ```
//!
//! LOCKED→DELIVERED (skipping transit) is illegal, as is any exit from a
//! terminal state. Re-submitting the status a deal already holds is a no-op
//! success — retried requests must never double-credit the reward.

use mandi_schemas::DealStatus;

/// What applying `from → to` means.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransitionPlan {
    /// The requested status already holds. Succeed without writing and
    /// without triggering the reward.
    Noop,
    /// Legal step. `reward` is set on the single first entry to DELIVERED.
    Step { reward: bool },
    /// Rejected with `InvalidTransition`.
    Illegal,
}

/// Classify a requested transition. Pure; the store's compare-and-set
/// guarantees the `from` this was planned against is the one replaced.
pub fn plan(from: DealStatus, to: DealStatus) -> TransitionPlan {
    use DealStatus::*;

    if from == to {
        return TransitionPlan::Noop;
    }
    match (from, to) {
        (Locked, InTransit) => TransitionPlan::Step { reward: false },
        (InTransit, Delivered) => TransitionPlan::Step { reward: true },
        (Locked, Cancelled) | (InTransit, Cancelled) => TransitionPlan::Step { reward: false },
        _ => TransitionPlan::Illegal,
    }
}
