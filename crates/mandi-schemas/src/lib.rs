//! mandi-schemas
//!
//! Shared domain vocabulary for the marketplace core: the persisted record
//! shapes (`User`, `Order`, `Bid`, `Deal`) and the closed enums they carry.
//! Roles and statuses are enums with exhaustive matching everywhere — never
//! free-form strings. The DB/wire labels live in `as_str`/`FromStr`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

pub mod trust;

/// Returned when a stored label does not map to any enum variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel {
    pub field: &'static str,
    pub value: String,
}

impl std::fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {} label: {:?}", self.field, self.value)
    }
}

impl std::error::Error for UnknownLabel {}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Farmer,
    Buyer,
    Trader,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Farmer => "FARMER",
            Role::Buyer => "BUYER",
            Role::Trader => "TRADER",
            Role::Admin => "ADMIN",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FARMER" => Ok(Role::Farmer),
            "BUYER" => Ok(Role::Buyer),
            "TRADER" => Ok(Role::Trader),
            "ADMIN" => Ok(Role::Admin),
            other => Err(UnknownLabel { field: "role", value: other.to_string() }),
        }
    }
}

/// Crops traded on the platform. Labels match the catalog strings the
/// original marketplace shipped with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crop {
    #[serde(rename = "Dhan (Paddy)")]
    Dhan,
    #[serde(rename = "Rice")]
    Rice,
    #[serde(rename = "Wheat")]
    Wheat,
    #[serde(rename = "Maize")]
    Maize,
}

impl Crop {
    pub fn as_str(&self) -> &'static str {
        match self {
            Crop::Dhan => "Dhan (Paddy)",
            Crop::Rice => "Rice",
            Crop::Wheat => "Wheat",
            Crop::Maize => "Maize",
        }
    }
}

impl FromStr for Crop {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Dhan (Paddy)" => Ok(Crop::Dhan),
            "Rice" => Ok(Crop::Rice),
            "Wheat" => Ok(Crop::Wheat),
            "Maize" => Ok(Crop::Maize),
            other => Err(UnknownLabel { field: "crop", value: other.to_string() }),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Quintal,
    Ton,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Quintal => "quintal",
            Unit::Ton => "ton",
        }
    }
}

impl FromStr for Unit {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quintal" => Ok(Unit::Quintal),
            "ton" => Ok(Unit::Ton),
            other => Err(UnknownLabel { field: "unit", value: other.to_string() }),
        }
    }
}

/// An order is OPEN (accepting bids) or LOCKED (a bid was accepted).
/// OPEN→LOCKED happens at most once and is never reversed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Open,
    Locked,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "OPEN",
            OrderStatus::Locked => "LOCKED",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(OrderStatus::Open),
            "LOCKED" => Ok(OrderStatus::Locked),
            other => Err(UnknownLabel { field: "order status", value: other.to_string() }),
        }
    }
}

/// Deal fulfillment lifecycle. `Delivered` and `Cancelled` are terminal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealStatus {
    Locked,
    InTransit,
    Delivered,
    Cancelled,
}

impl DealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Locked => "LOCKED",
            DealStatus::InTransit => "IN_TRANSIT",
            DealStatus::Delivered => "DELIVERED",
            DealStatus::Cancelled => "CANCELLED",
        }
    }

    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl FromStr for DealStatus {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOCKED" => Ok(DealStatus::Locked),
            "IN_TRANSIT" => Ok(DealStatus::InTransit),
            "DELIVERED" => Ok(DealStatus::Delivered),
            "CANCELLED" => Ok(DealStatus::Cancelled),
            other => Err(UnknownLabel { field: "deal status", value: other.to_string() }),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Platform account. Owned by external account management; the marketplace
/// core only ever mutates `trust_score`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub location: String,
    pub verified: bool,
    pub trust_score: f64,
    pub created_at: DateTime<Utc>,
}

/// A farmer's offer to sell `quantity` of `crop` above `min_price`.
///
/// `current_high_bid` is the maximum amount among all bids ever accepted for
/// this order (monotonically non-decreasing); `bids_count` equals the number
/// of persisted bids. Orders are retained forever for audit/history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub crop: Crop,
    pub variety: String,
    pub quantity: f64,
    pub unit: Unit,
    /// Moisture percentage, when the farmer declared one. Range [0, 100].
    pub moisture: Option<f64>,
    /// Floor price in whole rupees. Bids must strictly exceed it.
    pub min_price: i64,
    pub current_high_bid: i64,
    pub bids_count: u32,
    pub location: String,
    pub pincode: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    /// Lazy expiry: listings filter on this at read time; nothing ever
    /// transitions an expired order.
    pub expires_at: DateTime<Utc>,
}

/// A buyer's offer on an order. Append-only: bids are never edited or
/// deleted, including the ones that lose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: Uuid,
    pub order_id: Uuid,
    pub bidder_id: Uuid,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// The binding transaction created when a farmer accepts one bid on their
/// order. At most one deal exists per order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub id: Uuid,
    pub order_id: Uuid,
    pub seller_id: Uuid,
    pub buyer_id: Uuid,
    pub final_price: i64,
    pub total_amount: f64,
    pub status: DealStatus,
    pub created_at: DateTime<Utc>,
}
