//! Shared fixtures for the scenario tests.

use chrono::Utc;
use uuid::Uuid;

use mandi_engine::{Actor, MarketEngine, OrderDraft};
use mandi_schemas::{trust, Crop, Role, Unit, User};
use mandi_store::{MarketStore, MemoryStore};

pub async fn seed_user(store: &MemoryStore, name: &str, role: Role) -> Actor {
    let user = User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        role,
        location: "Raipur".to_string(),
        verified: true,
        trust_score: trust::DEFAULT_SCORE,
        created_at: Utc::now(),
    };
    let actor = Actor::new(user.id, role);
    store.insert_user(user).await.unwrap();
    actor
}

pub fn wheat_draft(min_price: i64) -> OrderDraft {
    OrderDraft {
        crop: Crop::Wheat,
        variety: "Sharbati".to_string(),
        quantity: 10.0,
        unit: Unit::Quintal,
        moisture: Some(11.5),
        min_price,
        location: "Raipur".to_string(),
        pincode: "492001".to_string(),
    }
}

pub fn engine(store: &MemoryStore) -> MarketEngine<MemoryStore> {
    MarketEngine::new(store.clone())
}
