//! Caller-facing error taxonomy.
//!
//! Every failure is a recoverable value; nothing here is a process error.
//! [`MarketError::kind`] collapses the variants into the four categories an
//! API layer maps onto status codes.

use mandi_schemas::DealStatus;
use mandi_store::StoreError;

/// Coarse classification of a [`MarketError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    InvalidInput,
    /// Store backend failure; the caller may retry.
    Internal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarketError {
    OrderNotFound,
    BidNotFound,
    DealNotFound,
    UserNotFound,
    /// Only the owning farmer may accept a bid on the order.
    NotOwner,
    /// Only the deal's seller or buyer may move its status.
    NotParty,
    /// An owner may not bid on their own order.
    SelfBid,
    RoleRequired { any_of: &'static str },
    OrderNotOpen,
    DealAlreadyExists,
    InvalidTransition { from: DealStatus, to: DealStatus },
    /// Amount does not strictly exceed both the floor and the current high
    /// bid. Ties lose.
    BidTooLow { floor: i64, high_bid: i64 },
    NonPositiveAmount,
    InvalidOrder(&'static str),
    Store(StoreError),
}

impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketError::OrderNotFound
            | MarketError::BidNotFound
            | MarketError::DealNotFound
            | MarketError::UserNotFound => ErrorKind::NotFound,
            MarketError::NotOwner
            | MarketError::NotParty
            | MarketError::SelfBid
            | MarketError::RoleRequired { .. } => ErrorKind::Forbidden,
            MarketError::OrderNotOpen
            | MarketError::DealAlreadyExists
            | MarketError::InvalidTransition { .. } => ErrorKind::Conflict,
            MarketError::BidTooLow { .. }
            | MarketError::NonPositiveAmount
            | MarketError::InvalidOrder(_) => ErrorKind::InvalidInput,
            MarketError::Store(_) => ErrorKind::Internal,
        }
    }
}

impl std::fmt::Display for MarketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketError::OrderNotFound => write!(f, "order not found"),
            MarketError::BidNotFound => write!(f, "bid not found or belongs to another order"),
            MarketError::DealNotFound => write!(f, "deal not found"),
            MarketError::UserNotFound => write!(f, "user not found"),
            MarketError::NotOwner => write!(f, "only the owning farmer may do this"),
            MarketError::NotParty => write!(f, "only the deal's seller or buyer may do this"),
            MarketError::SelfBid => write!(f, "owners may not bid on their own order"),
            MarketError::RoleRequired { any_of } => write!(f, "{any_of} role required"),
            MarketError::OrderNotOpen => write!(f, "order is not open for bidding"),
            MarketError::DealAlreadyExists => write!(f, "order already has a deal"),
            MarketError::InvalidTransition { from, to } => {
                write!(f, "illegal deal transition: {} -> {}", from.as_str(), to.as_str())
            }
            MarketError::BidTooLow { floor, high_bid } => write!(
                f,
                "bid must strictly exceed floor {floor} and current high bid {high_bid}"
            ),
            MarketError::NonPositiveAmount => write!(f, "amount must be positive"),
            MarketError::InvalidOrder(reason) => write!(f, "invalid order: {reason}"),
            MarketError::Store(e) => write!(f, "store failure: {e}"),
        }
    }
}

impl std::error::Error for MarketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MarketError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for MarketError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OrderNotFound => MarketError::OrderNotFound,
            StoreError::BidNotFound => MarketError::BidNotFound,
            StoreError::DealNotFound => MarketError::DealNotFound,
            StoreError::UserNotFound => MarketError::UserNotFound,
            StoreError::OrderNotOpen => MarketError::OrderNotOpen,
            StoreError::BidNotCompetitive { floor, high_bid } => {
                MarketError::BidTooLow { floor, high_bid }
            }
            StoreError::DealAlreadyExists => MarketError::DealAlreadyExists,
            // StatusChanged needs the caller's context to resolve (no-op vs
            // conflict); a bare conversion treats it as a backend-level loss.
            StoreError::StatusChanged { .. } | StoreError::Backend(_) => MarketError::Store(e),
        }
    }
}
