//! Order intake and listings.

use chrono::{Duration, Utc};
use uuid::Uuid;

use mandi_schemas::{Crop, Order, OrderStatus, Role, Unit};
use mandi_store::{MarketStore, OrderFilter};

use crate::{Actor, MarketEngine, MarketError};

/// Orders stop appearing in listings this long after creation.
pub const ORDER_TTL_DAYS: i64 = 7;

/// Farmer-supplied fields of a new sale order.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub crop: Crop,
    pub variety: String,
    pub quantity: f64,
    pub unit: Unit,
    pub moisture: Option<f64>,
    pub min_price: i64,
    pub location: String,
    pub pincode: String,
}

impl OrderDraft {
    fn validate(&self) -> Result<(), MarketError> {
        if !(self.quantity > 0.0) {
            return Err(MarketError::InvalidOrder("quantity must be positive"));
        }
        if self.min_price <= 0 {
            return Err(MarketError::InvalidOrder("min_price must be positive"));
        }
        if let Some(m) = self.moisture {
            if !(0.0..=100.0).contains(&m) {
                return Err(MarketError::InvalidOrder("moisture must be within 0..=100"));
            }
        }
        if self.pincode.len() != 6 || !self.pincode.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MarketError::InvalidOrder("pincode must be 6 digits"));
        }
        Ok(())
    }
}

impl<S: MarketStore> MarketEngine<S> {
    /// Post a sale order. FARMER only.
    pub async fn create_order(
        &self,
        actor: &Actor,
        draft: OrderDraft,
    ) -> Result<Order, MarketError> {
        if actor.role != Role::Farmer {
            return Err(MarketError::RoleRequired { any_of: "FARMER" });
        }
        draft.validate()?;

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            farmer_id: actor.id,
            crop: draft.crop,
            variety: draft.variety,
            quantity: draft.quantity,
            unit: draft.unit,
            moisture: draft.moisture,
            min_price: draft.min_price,
            current_high_bid: 0,
            bids_count: 0,
            location: draft.location,
            pincode: draft.pincode,
            status: OrderStatus::Open,
            created_at: now,
            expires_at: now + Duration::days(ORDER_TTL_DAYS),
        };
        self.store.insert_order(order.clone()).await?;
        tracing::info!(
            order_id = %order.id,
            farmer_id = %actor.id,
            crop = order.crop.as_str(),
            min_price = order.min_price,
            "order created"
        );
        Ok(order)
    }

    /// OPEN, unexpired orders matching `filter`, newest first. Expiry is a
    /// read-time filter only: an expired order keeps its stored status.
    pub async fn open_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, MarketError> {
        Ok(self.store.open_orders(filter, Utc::now()).await?)
    }

    /// Any authenticated actor may inspect any order, expired or not.
    pub async fn order_details(&self, order_id: Uuid) -> Result<Order, MarketError> {
        Ok(self.store.order(order_id).await?)
    }

    /// The acting farmer's own orders, newest first.
    pub async fn orders_by_farmer(&self, actor: &Actor) -> Result<Vec<Order>, MarketError> {
        if actor.role != Role::Farmer {
            return Err(MarketError::RoleRequired { any_of: "FARMER" });
        }
        Ok(self.store.orders_by_farmer(actor.id).await?)
    }
}
