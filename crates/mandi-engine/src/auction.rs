//! The auction engine: strictly-increasing sealed bidding on open orders.

use chrono::Utc;
use uuid::Uuid;

use mandi_schemas::{Bid, OrderStatus, Role};
use mandi_store::MarketStore;

use crate::{Actor, MarketEngine, MarketError};

/// A freshly recorded bid with the bidder's display name resolved for
/// presentation.
#[derive(Debug, Clone)]
pub struct PlacedBid {
    pub bid: Bid,
    pub bidder_name: String,
}

impl<S: MarketStore> MarketEngine<S> {
    /// Place a bid on an open order. BUYER or TRADER only; owners may not
    /// bid on their own order.
    ///
    /// The amount must strictly exceed both the floor price and the current
    /// high bid — ties are rejected. Validation runs twice: here against the
    /// read snapshot for a precise error, and again inside the store commit
    /// so a concurrent higher bid turns this one into [`MarketError::BidTooLow`]
    /// instead of silently clobbering it.
    pub async fn place_bid(
        &self,
        actor: &Actor,
        order_id: Uuid,
        amount: i64,
    ) -> Result<PlacedBid, MarketError> {
        if !matches!(actor.role, Role::Buyer | Role::Trader) {
            return Err(MarketError::RoleRequired { any_of: "BUYER or TRADER" });
        }
        if amount <= 0 {
            return Err(MarketError::NonPositiveAmount);
        }

        let order = self.store.order(order_id).await?;
        if order.status != OrderStatus::Open {
            return Err(MarketError::OrderNotOpen);
        }
        if order.farmer_id == actor.id {
            return Err(MarketError::SelfBid);
        }
        if amount <= order.min_price || amount <= order.current_high_bid {
            return Err(MarketError::BidTooLow {
                floor: order.min_price,
                high_bid: order.current_high_bid,
            });
        }

        let bid = Bid {
            id: Uuid::new_v4(),
            order_id,
            bidder_id: actor.id,
            amount,
            created_at: Utc::now(),
        };
        let updated = self.store.commit_bid(bid.clone()).await?;
        tracing::info!(
            order_id = %order_id,
            bid_id = %bid.id,
            bidder_id = %actor.id,
            amount,
            bids_count = updated.bids_count,
            "bid committed"
        );

        let bidder_name = self.store.user(actor.id).await?.name;
        Ok(PlacedBid { bid, bidder_name })
    }

    /// All bids on the order, highest amount first. An unknown order yields
    /// an empty list, mirroring the listing endpoints.
    pub async fn list_bids(&self, order_id: Uuid) -> Result<Vec<Bid>, MarketError> {
        Ok(self.store.bids_for_order(order_id).await?)
    }

    /// The acting bidder's own bid history, newest first.
    pub async fn bids_by_bidder(&self, actor: &Actor) -> Result<Vec<Bid>, MarketError> {
        Ok(self.store.bids_by_bidder(actor.id).await?)
    }
}
