//! Deterministic in-process store.
//!
//! One mutex around the whole dataset makes every commit trivially
//! serializable, which is exactly the isolation level the commit contract
//! asks for. No I/O, no randomness beyond the ids callers mint.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use mandi_schemas::{trust, Bid, Deal, DealStatus, Order, OrderStatus, User};

use crate::{MarketStore, OrderFilter, StoreError};

#[derive(Default)]
struct Inner {
    users: BTreeMap<Uuid, User>,
    orders: BTreeMap<Uuid, Order>,
    bids: BTreeMap<Uuid, Bid>,
    deals: BTreeMap<Uuid, Deal>,
    /// Enforces the one-deal-per-order constraint.
    deal_by_order: BTreeMap<Uuid, Uuid>,
}

/// In-memory [`MarketStore`]. Cheap to clone; clones share the dataset.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))
    }
}

impl MarketStore for MemoryStore {
    async fn insert_user(&self, user: User) -> Result<(), StoreError> {
        let mut g = self.guard()?;
        g.users.insert(user.id, user);
        Ok(())
    }

    async fn user(&self, id: Uuid) -> Result<User, StoreError> {
        let g = self.guard()?;
        g.users.get(&id).cloned().ok_or(StoreError::UserNotFound)
    }

    async fn insert_order(&self, order: Order) -> Result<(), StoreError> {
        let mut g = self.guard()?;
        g.orders.insert(order.id, order);
        Ok(())
    }

    async fn order(&self, id: Uuid) -> Result<Order, StoreError> {
        let g = self.guard()?;
        g.orders.get(&id).cloned().ok_or(StoreError::OrderNotFound)
    }

    async fn open_orders(
        &self,
        filter: &OrderFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError> {
        let g = self.guard()?;
        let needle = filter.location.as_ref().map(|l| l.to_lowercase());
        let mut out: Vec<Order> = g
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Open && o.expires_at > now)
            .filter(|o| filter.crop.map_or(true, |c| o.crop == c))
            .filter(|o| filter.min_price.map_or(true, |p| o.min_price >= p))
            .filter(|o| {
                needle
                    .as_ref()
                    .map_or(true, |n| o.location.to_lowercase().contains(n))
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn orders_by_farmer(&self, farmer_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let g = self.guard()?;
        let mut out: Vec<Order> = g
            .orders
            .values()
            .filter(|o| o.farmer_id == farmer_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn bid(&self, id: Uuid) -> Result<Bid, StoreError> {
        let g = self.guard()?;
        g.bids.get(&id).cloned().ok_or(StoreError::BidNotFound)
    }

    async fn bids_for_order(&self, order_id: Uuid) -> Result<Vec<Bid>, StoreError> {
        let g = self.guard()?;
        let mut out: Vec<Bid> = g
            .bids
            .values()
            .filter(|b| b.order_id == order_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.amount
                .cmp(&a.amount)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(out)
    }

    async fn bids_by_bidder(&self, bidder_id: Uuid) -> Result<Vec<Bid>, StoreError> {
        let g = self.guard()?;
        let mut out: Vec<Bid> = g
            .bids
            .values()
            .filter(|b| b.bidder_id == bidder_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn commit_bid(&self, bid: Bid) -> Result<Order, StoreError> {
        let mut g = self.guard()?;
        let order = g
            .orders
            .get_mut(&bid.order_id)
            .ok_or(StoreError::OrderNotFound)?;
        if order.status != OrderStatus::Open {
            return Err(StoreError::OrderNotOpen);
        }
        // Re-check under the lock: a bid validated against a stale read must
        // not overwrite a higher concurrent bid.
        if bid.amount <= order.min_price || bid.amount <= order.current_high_bid {
            return Err(StoreError::BidNotCompetitive {
                floor: order.min_price,
                high_bid: order.current_high_bid,
            });
        }
        order.current_high_bid = bid.amount;
        order.bids_count += 1;
        let updated = order.clone();
        g.bids.insert(bid.id, bid);
        Ok(updated)
    }

    async fn deal(&self, id: Uuid) -> Result<Deal, StoreError> {
        let g = self.guard()?;
        g.deals.get(&id).cloned().ok_or(StoreError::DealNotFound)
    }

    async fn deals_for_party(&self, user_id: Uuid) -> Result<Vec<Deal>, StoreError> {
        let g = self.guard()?;
        let mut out: Vec<Deal> = g
            .deals
            .values()
            .filter(|d| d.seller_id == user_id || d.buyer_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn lock_and_create_deal(&self, deal: Deal) -> Result<Deal, StoreError> {
        let mut g = self.guard()?;
        if g.deal_by_order.contains_key(&deal.order_id) {
            return Err(StoreError::DealAlreadyExists);
        }
        let order = g
            .orders
            .get_mut(&deal.order_id)
            .ok_or(StoreError::OrderNotFound)?;
        if order.status != OrderStatus::Open {
            return Err(StoreError::OrderNotOpen);
        }
        order.status = OrderStatus::Locked;
        g.deal_by_order.insert(deal.order_id, deal.id);
        g.deals.insert(deal.id, deal.clone());
        Ok(deal)
    }

    async fn commit_deal_transition(
        &self,
        deal_id: Uuid,
        expected: DealStatus,
        next: DealStatus,
        reward: Option<(Uuid, Uuid)>,
    ) -> Result<Deal, StoreError> {
        let mut g = self.guard()?;
        let current = g
            .deals
            .get(&deal_id)
            .ok_or(StoreError::DealNotFound)?
            .status;
        if current != expected {
            return Err(StoreError::StatusChanged { actual: current });
        }
        if let Some(deal) = g.deals.get_mut(&deal_id) {
            deal.status = next;
        }
        if let Some((seller_id, buyer_id)) = reward {
            for party in [seller_id, buyer_id] {
                // A vanished account forfeits its credit; the transition
                // itself still commits.
                if let Some(u) = g.users.get_mut(&party) {
                    u.trust_score = trust::rewarded(u.trust_score);
                }
            }
        }
        g.deals
            .get(&deal_id)
            .cloned()
            .ok_or(StoreError::DealNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(role: mandi_schemas::Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: "test user".to_string(),
            role,
            location: "Raipur".to_string(),
            verified: true,
            trust_score: trust::DEFAULT_SCORE,
            created_at: Utc::now(),
        }
    }

    fn open_order(farmer_id: Uuid, min_price: i64) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            farmer_id,
            crop: mandi_schemas::Crop::Wheat,
            variety: "Sharbati".to_string(),
            quantity: 10.0,
            unit: mandi_schemas::Unit::Quintal,
            moisture: None,
            min_price,
            current_high_bid: 0,
            bids_count: 0,
            location: "Raipur".to_string(),
            pincode: "492001".to_string(),
            status: OrderStatus::Open,
            created_at: now,
            expires_at: now + Duration::days(7),
        }
    }

    fn bid_on(order_id: Uuid, bidder_id: Uuid, amount: i64) -> Bid {
        Bid {
            id: Uuid::new_v4(),
            order_id,
            bidder_id,
            amount,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn commit_bid_enforces_strict_increase() {
        let store = MemoryStore::new();
        let farmer = user(mandi_schemas::Role::Farmer);
        let order = open_order(farmer.id, 3500);
        let order_id = order.id;
        store.insert_order(order).await.unwrap();

        let buyer = Uuid::new_v4();
        let updated = store.commit_bid(bid_on(order_id, buyer, 3600)).await.unwrap();
        assert_eq!(updated.current_high_bid, 3600);
        assert_eq!(updated.bids_count, 1);

        // Equal to the current high: rejected, nothing recorded.
        let err = store
            .commit_bid(bid_on(order_id, buyer, 3600))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::BidNotCompetitive { floor: 3500, high_bid: 3600 });
        let after = store.order(order_id).await.unwrap();
        assert_eq!(after.current_high_bid, 3600);
        assert_eq!(after.bids_count, 1);
        assert_eq!(store.bids_for_order(order_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bids_listing_is_amount_descending() {
        let store = MemoryStore::new();
        let order = open_order(Uuid::new_v4(), 100);
        let order_id = order.id;
        store.insert_order(order).await.unwrap();

        for amount in [150, 200, 175] {
            store
                .commit_bid(bid_on(order_id, Uuid::new_v4(), amount))
                .await
                .ok();
        }
        // 175 lost to the 200 high bid; only 150 and 200 persist.
        let bids = store.bids_for_order(order_id).await.unwrap();
        let amounts: Vec<i64> = bids.iter().map(|b| b.amount).collect();
        assert_eq!(amounts, vec![200, 150]);
    }

    #[tokio::test]
    async fn lock_and_create_deal_closes_the_order() {
        let store = MemoryStore::new();
        let order = open_order(Uuid::new_v4(), 3500);
        let order_id = order.id;
        let farmer_id = order.farmer_id;
        store.insert_order(order).await.unwrap();

        let deal = Deal {
            id: Uuid::new_v4(),
            order_id,
            seller_id: farmer_id,
            buyer_id: Uuid::new_v4(),
            final_price: 3600,
            total_amount: 36000.0,
            status: DealStatus::Locked,
            created_at: Utc::now(),
        };
        store.lock_and_create_deal(deal.clone()).await.unwrap();
        assert_eq!(store.order(order_id).await.unwrap().status, OrderStatus::Locked);

        // Order is LOCKED now, so a second accept fails deterministically.
        let mut second = deal;
        second.id = Uuid::new_v4();
        let err = store.lock_and_create_deal(second).await.unwrap_err();
        assert_eq!(err, StoreError::OrderNotOpen);

        // And bids bounce off the locked order.
        let err = store
            .commit_bid(bid_on(order_id, Uuid::new_v4(), 9000))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::OrderNotOpen);
    }

    #[tokio::test]
    async fn transition_cas_and_reward_are_one_commit() {
        let store = MemoryStore::new();
        let seller = user(mandi_schemas::Role::Farmer);
        let buyer = user(mandi_schemas::Role::Buyer);
        store.insert_user(seller.clone()).await.unwrap();
        store.insert_user(buyer.clone()).await.unwrap();

        let deal = Deal {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            seller_id: seller.id,
            buyer_id: buyer.id,
            final_price: 3600,
            total_amount: 36000.0,
            status: DealStatus::Locked,
            created_at: Utc::now(),
        };
        let order = {
            let mut o = open_order(seller.id, 3500);
            o.id = deal.order_id;
            o
        };
        store.insert_order(order).await.unwrap();
        store.lock_and_create_deal(deal.clone()).await.unwrap();
        // Walk the stored deal to IN_TRANSIT first.
        store
            .commit_deal_transition(deal.id, DealStatus::Locked, DealStatus::InTransit, None)
            .await
            .unwrap();

        let updated = store
            .commit_deal_transition(
                deal.id,
                DealStatus::InTransit,
                DealStatus::Delivered,
                Some((seller.id, buyer.id)),
            )
            .await
            .unwrap();
        assert_eq!(updated.status, DealStatus::Delivered);
        assert!((store.user(seller.id).await.unwrap().trust_score - 3.1).abs() < 1e-9);
        assert!((store.user(buyer.id).await.unwrap().trust_score - 3.1).abs() < 1e-9);

        // Stale expectation loses the CAS and changes nothing.
        let err = store
            .commit_deal_transition(
                deal.id,
                DealStatus::InTransit,
                DealStatus::Delivered,
                Some((seller.id, buyer.id)),
            )
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::StatusChanged { actual: DealStatus::Delivered });
        assert!((store.user(seller.id).await.unwrap().trust_score - 3.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn open_orders_filters_and_lazy_expiry() {
        let store = MemoryStore::new();
        let fresh = open_order(Uuid::new_v4(), 3000);
        let fresh_id = fresh.id;
        let mut stale = open_order(Uuid::new_v4(), 9000);
        stale.expires_at = Utc::now() - Duration::hours(1);
        let stale_id = stale.id;
        store.insert_order(fresh).await.unwrap();
        store.insert_order(stale).await.unwrap();

        let listed = store
            .open_orders(&OrderFilter::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, fresh_id);

        // The expired order keeps its stored status and stays fetchable.
        let by_id = store.order(stale_id).await.unwrap();
        assert_eq!(by_id.status, OrderStatus::Open);

        let none = store
            .open_orders(
                &OrderFilter { min_price: Some(5000), ..Default::default() },
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(none.is_empty());

        let by_location = store
            .open_orders(
                &OrderFilter { location: Some("raiPUR".to_string()), ..Default::default() },
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(by_location.len(), 1);
    }
}
