//! Deal factory and deal state machine.

use chrono::Utc;
use uuid::Uuid;

use mandi_schemas::{Deal, DealStatus, OrderStatus};
use mandi_store::{MarketStore, StoreError};

use crate::deal_state::{plan, TransitionPlan};
use crate::{Actor, MarketEngine, MarketError};

impl<S: MarketStore> MarketEngine<S> {
    /// Accept one bid on the actor's own open order, locking the order and
    /// creating the binding deal in a single atomic commit.
    ///
    /// Any standing bid may be accepted, not just the current highest —
    /// the farmer keeps discretion. The other bids stay on record untouched;
    /// the LOCKED order simply refuses everything further.
    pub async fn accept_bid(
        &self,
        actor: &Actor,
        order_id: Uuid,
        bid_id: Uuid,
    ) -> Result<Deal, MarketError> {
        let order = self.store.order(order_id).await?;
        if order.farmer_id != actor.id {
            return Err(MarketError::NotOwner);
        }
        if order.status != OrderStatus::Open {
            return Err(MarketError::OrderNotOpen);
        }
        let bid = self.store.bid(bid_id).await?;
        if bid.order_id != order_id {
            return Err(MarketError::BidNotFound);
        }

        let deal = Deal {
            id: Uuid::new_v4(),
            order_id,
            seller_id: actor.id,
            buyer_id: bid.bidder_id,
            final_price: bid.amount,
            total_amount: order.quantity * bid.amount as f64,
            status: DealStatus::Locked,
            created_at: Utc::now(),
        };
        let deal = self.store.lock_and_create_deal(deal).await?;
        tracing::info!(
            order_id = %order_id,
            deal_id = %deal.id,
            buyer_id = %deal.buyer_id,
            final_price = deal.final_price,
            "bid accepted, order locked"
        );
        Ok(deal)
    }

    /// Move a deal along its lifecycle. Seller or buyer only.
    ///
    /// Transitions follow the table in [`crate::deal_state`]; the first
    /// entry to DELIVERED credits both parties' trust scores in the same
    /// commit as the status write. Re-submitting the current status is a
    /// no-op success, so retried requests never double-credit.
    pub async fn update_deal_status(
        &self,
        actor: &Actor,
        deal_id: Uuid,
        new_status: DealStatus,
    ) -> Result<Deal, MarketError> {
        let deal = self.store.deal(deal_id).await?;
        if actor.id != deal.seller_id && actor.id != deal.buyer_id {
            return Err(MarketError::NotParty);
        }

        let reward = match plan(deal.status, new_status) {
            TransitionPlan::Noop => return Ok(deal),
            TransitionPlan::Illegal => {
                return Err(MarketError::InvalidTransition { from: deal.status, to: new_status })
            }
            TransitionPlan::Step { reward } => reward,
        };

        let parties = reward.then_some((deal.seller_id, deal.buyer_id));
        match self
            .store
            .commit_deal_transition(deal_id, deal.status, new_status, parties)
            .await
        {
            Ok(updated) => {
                tracing::info!(
                    deal_id = %deal_id,
                    from = deal.status.as_str(),
                    to = new_status.as_str(),
                    rewarded = reward,
                    "deal transition committed"
                );
                Ok(updated)
            }
            // Lost the compare-and-set. If the winner applied the very
            // transition we wanted, resolve to the idempotent no-op; only
            // one of the racers ever passes the reward trigger.
            Err(StoreError::StatusChanged { actual }) if actual == new_status => {
                Ok(self.store.deal(deal_id).await?)
            }
            Err(StoreError::StatusChanged { actual }) => {
                Err(MarketError::InvalidTransition { from: actual, to: new_status })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deals where the actor is seller or buyer, newest first.
    pub async fn deals_for_party(&self, actor: &Actor) -> Result<Vec<Deal>, MarketError> {
        Ok(self.store.deals_for_party(actor.id).await?)
    }
}
