//! mandi-engine
//!
//! The Order/Bid/Deal lifecycle engine: one consolidated implementation with
//! an injected store, replacing any notion of module-level service state.
//! The engine owns validation and the transition rules; the store owns
//! atomicity. Identity arrives pre-authenticated as an [`Actor`] — no
//! credential checks happen here, only the role and ownership checks the
//! engine computes itself.
//!
//! Operations:
//! - order intake and listings (`create_order`, `open_orders`,
//!   `order_details`, `orders_by_farmer`)
//! - the auction (`place_bid`, `list_bids`, `bids_by_bidder`)
//! - the deal factory (`accept_bid`)
//! - the deal state machine (`update_deal_status`), which triggers the
//!   trust-score reward on first delivery
//!
//! Every operation is safe under arbitrary concurrent invocation; the engine
//! itself holds no mutable state.

use uuid::Uuid;

use mandi_schemas::Role;
use mandi_store::MarketStore;

mod auction;
mod deal_state;
mod deals;
mod error;
mod orders;

pub use auction::PlacedBid;
pub use deal_state::{plan, TransitionPlan};
pub use error::{ErrorKind, MarketError};
pub use orders::{OrderDraft, ORDER_TTL_DAYS};

/// An already-authenticated caller. The auth collaborator verified the
/// credentials; the engine trusts this pair as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

/// The lifecycle engine over an injected store.
pub struct MarketEngine<S> {
    store: S,
}

impl<S: MarketStore> MarketEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}
