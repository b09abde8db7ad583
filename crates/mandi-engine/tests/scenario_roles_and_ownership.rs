//! Role gates and ownership checks: who may post, bid, accept, and move a
//! deal — and the intake validation on new orders.

mod common;

use common::{engine, seed_user, wheat_draft};
use mandi_engine::{ErrorKind, MarketError};
use mandi_schemas::{DealStatus, Role};
use mandi_store::MemoryStore;

#[tokio::test]
async fn scenario_roles_and_ownership() {
    let store = MemoryStore::new();
    let eng = engine(&store);
    let farmer = seed_user(&store, "Ramesh", Role::Farmer).await;
    let other_farmer = seed_user(&store, "Suresh", Role::Farmer).await;
    let buyer = seed_user(&store, "Anita", Role::Buyer).await;
    let outsider = seed_user(&store, "Omkar", Role::Buyer).await;

    // Only farmers post orders.
    let err = eng.create_order(&buyer, wheat_draft(3500)).await.unwrap_err();
    assert_eq!(err, MarketError::RoleRequired { any_of: "FARMER" });
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let order = eng.create_order(&farmer, wheat_draft(3500)).await.unwrap();

    // Farmers do not bid — not on their own order, not with a farmer role.
    let err = eng.place_bid(&other_farmer, order.id, 3600).await.unwrap_err();
    assert_eq!(err, MarketError::RoleRequired { any_of: "BUYER or TRADER" });

    // The owner may not bid on their own order even with a trading role.
    let owner_as_trader = mandi_engine::Actor::new(farmer.id, Role::Trader);
    let err = eng.place_bid(&owner_as_trader, order.id, 3600).await.unwrap_err();
    assert_eq!(err, MarketError::SelfBid);

    let placed = eng.place_bid(&buyer, order.id, 3600).await.unwrap();

    // Only the owning farmer accepts.
    let err = eng
        .accept_bid(&other_farmer, order.id, placed.bid.id)
        .await
        .unwrap_err();
    assert_eq!(err, MarketError::NotOwner);

    // A bid from a different order cannot be accepted here.
    let second = eng.create_order(&farmer, wheat_draft(3000)).await.unwrap();
    let foreign = eng.place_bid(&buyer, second.id, 3100).await.unwrap();
    let err = eng.accept_bid(&farmer, order.id, foreign.bid.id).await.unwrap_err();
    assert_eq!(err, MarketError::BidNotFound);

    let deal = eng.accept_bid(&farmer, order.id, placed.bid.id).await.unwrap();

    // Only seller or buyer move the deal.
    let err = eng
        .update_deal_status(&outsider, deal.id, DealStatus::InTransit)
        .await
        .unwrap_err();
    assert_eq!(err, MarketError::NotParty);
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn scenario_order_intake_validation() {
    let store = MemoryStore::new();
    let eng = engine(&store);
    let farmer = seed_user(&store, "Ramesh", Role::Farmer).await;
    let buyer = seed_user(&store, "Anita", Role::Buyer).await;

    let mut draft = wheat_draft(3500);
    draft.quantity = 0.0;
    let err = eng.create_order(&farmer, draft).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let mut draft = wheat_draft(0);
    draft.min_price = 0;
    assert!(eng.create_order(&farmer, draft).await.is_err());

    let mut draft = wheat_draft(3500);
    draft.moisture = Some(140.0);
    assert!(eng.create_order(&farmer, draft).await.is_err());

    let mut draft = wheat_draft(3500);
    draft.pincode = "49-001".to_string();
    assert!(eng.create_order(&farmer, draft).await.is_err());

    // Non-positive bid amounts are InvalidInput before anything else.
    let order = eng.create_order(&farmer, wheat_draft(3500)).await.unwrap();
    let err = eng.place_bid(&buyer, order.id, 0).await.unwrap_err();
    assert_eq!(err, MarketError::NonPositiveAmount);

    // Unknown order: NotFound, not a panic, not a silent success.
    let err = eng
        .place_bid(&buyer, uuid::Uuid::new_v4(), 4000)
        .await
        .unwrap_err();
    assert_eq!(err, MarketError::OrderNotFound);
}
