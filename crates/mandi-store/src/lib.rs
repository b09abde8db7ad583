//! mandi-store
//!
//! The store seam for the marketplace core. The engine validates; the store
//! commits. Every mutating commit re-verifies its precondition inside the
//! store's own atomicity boundary, so two racing callers can both pass the
//! engine's read-then-validate step and still only one of them lands.
//!
//! Commit contract:
//! - `commit_bid` — append the bid and advance `(current_high_bid,
//!   bids_count)` only while the order is OPEN and the amount strictly
//!   exceeds both the floor and the current high bid.
//! - `lock_and_create_deal` — OPEN→LOCKED plus the deal insert as one unit,
//!   conditioned on OPEN; at most one deal per order, ever.
//! - `commit_deal_transition` — compare-and-set on the previously read
//!   status; the optional trust reward is applied in the same unit so a
//!   crash cannot record the delivery without the credit (or vice versa).
//!
//! A failed commit leaves no persisted change.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use mandi_schemas::{Bid, Crop, Deal, DealStatus, Order, User};

mod memory;

pub use memory::MemoryStore;

/// Typed failure surface of the store layer.
///
/// Everything here is recoverable; `Backend` wraps infrastructure faults
/// (connection loss, poisoned lock) that the caller may retry.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    OrderNotFound,
    BidNotFound,
    DealNotFound,
    UserNotFound,
    /// The order is LOCKED (or was locked by a concurrent accept).
    OrderNotOpen,
    /// Strict-increase re-check failed at commit time. Carries the bounds
    /// the losing bid had to beat.
    BidNotCompetitive { floor: i64, high_bid: i64 },
    /// The one-deal-per-order constraint would be violated.
    DealAlreadyExists,
    /// Compare-and-set on the deal status lost to a concurrent transition.
    StatusChanged { actual: DealStatus },
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::OrderNotFound => write!(f, "order not found"),
            StoreError::BidNotFound => write!(f, "bid not found"),
            StoreError::DealNotFound => write!(f, "deal not found"),
            StoreError::UserNotFound => write!(f, "user not found"),
            StoreError::OrderNotOpen => write!(f, "order is not open"),
            StoreError::BidNotCompetitive { floor, high_bid } => write!(
                f,
                "bid does not strictly exceed floor {floor} and high bid {high_bid}"
            ),
            StoreError::DealAlreadyExists => write!(f, "order already has a deal"),
            StoreError::StatusChanged { actual } => {
                write!(f, "deal status changed concurrently, now {}", actual.as_str())
            }
            StoreError::Backend(msg) => write!(f, "store backend failure: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Read-time filters for the open-orders listing.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub crop: Option<Crop>,
    /// Keep orders whose floor price is at least this.
    pub min_price: Option<i64>,
    /// Case-insensitive substring match on the order's location.
    pub location: Option<String>,
}

/// Durable record store for orders, bids, deals, and the trust-score field
/// of users. Implemented by [`MemoryStore`] (in-process, deterministic) and
/// by `mandi-db`'s Postgres store.
#[allow(async_fn_in_trait)]
pub trait MarketStore: Send + Sync {
    async fn insert_user(&self, user: User) -> Result<(), StoreError>;
    async fn user(&self, id: Uuid) -> Result<User, StoreError>;

    async fn insert_order(&self, order: Order) -> Result<(), StoreError>;
    async fn order(&self, id: Uuid) -> Result<Order, StoreError>;
    /// OPEN orders with `expires_at > now`, matching `filter`, newest first.
    /// Expiry is evaluated here at read time; expired orders keep their
    /// stored status.
    async fn open_orders(
        &self,
        filter: &OrderFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError>;
    async fn orders_by_farmer(&self, farmer_id: Uuid) -> Result<Vec<Order>, StoreError>;

    async fn bid(&self, id: Uuid) -> Result<Bid, StoreError>;
    /// All bids on the order, amount descending, earlier bid first on the
    /// (unreachable) tie.
    async fn bids_for_order(&self, order_id: Uuid) -> Result<Vec<Bid>, StoreError>;
    async fn bids_by_bidder(&self, bidder_id: Uuid) -> Result<Vec<Bid>, StoreError>;
    /// Atomically append `bid` and advance the order's auction fields.
    /// Returns the updated order.
    async fn commit_bid(&self, bid: Bid) -> Result<Order, StoreError>;

    async fn deal(&self, id: Uuid) -> Result<Deal, StoreError>;
    /// Deals where the user is seller or buyer, newest first.
    async fn deals_for_party(&self, user_id: Uuid) -> Result<Vec<Deal>, StoreError>;
    /// Atomically lock `deal.order_id` (OPEN→LOCKED) and insert `deal`.
    async fn lock_and_create_deal(&self, deal: Deal) -> Result<Deal, StoreError>;
    /// Compare-and-set `expected → next` on the deal's status. When `reward`
    /// carries `(seller_id, buyer_id)`, both trust scores are bumped in the
    /// same commit. A party whose user record has vanished is skipped.
    async fn commit_deal_transition(
        &self,
        deal_id: Uuid,
        expected: DealStatus,
        next: DealStatus,
        reward: Option<(Uuid, Uuid)>,
    ) -> Result<Deal, StoreError>;
}
