//! mandi-db
//!
//! Postgres implementation of [`MarketStore`]. Every commit runs as one SQL
//! transaction whose `UPDATE … WHERE` guard re-verifies the precondition, so
//! the serialization the commit contract requires comes from the database,
//! not from the caller. The `uq_deals_order_id` unique constraint is the
//! backstop for one-deal-per-order and is surfaced by name as
//! [`StoreError::DealAlreadyExists`].

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use mandi_schemas::{trust, Bid, Crop, Deal, DealStatus, Order, OrderStatus, Role, Unit, User};
use mandi_store::{MarketStore, OrderFilter, StoreError};

pub const ENV_DB_URL: &str = "MANDI_DATABASE_URL";

/// Connect to Postgres using MANDI_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='orders'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus { ok, has_orders_table: exists })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_orders_table: bool,
}

/// Detect a Postgres unique constraint violation by name.
fn is_unique_constraint_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint() == Some(constraint),
        _ => false,
    }
}

fn backend<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: row.try_get("id").map_err(backend)?,
        name: row.try_get("name").map_err(backend)?,
        role: row
            .try_get::<String, _>("role")
            .map_err(backend)?
            .parse::<Role>()
            .map_err(backend)?,
        location: row.try_get("location").map_err(backend)?,
        verified: row.try_get("verified").map_err(backend)?,
        trust_score: row.try_get("trust_score").map_err(backend)?,
        created_at: row.try_get("created_at").map_err(backend)?,
    })
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    Ok(Order {
        id: row.try_get("id").map_err(backend)?,
        farmer_id: row.try_get("farmer_id").map_err(backend)?,
        crop: row
            .try_get::<String, _>("crop")
            .map_err(backend)?
            .parse::<Crop>()
            .map_err(backend)?,
        variety: row.try_get("variety").map_err(backend)?,
        quantity: row.try_get("quantity").map_err(backend)?,
        unit: row
            .try_get::<String, _>("unit")
            .map_err(backend)?
            .parse::<Unit>()
            .map_err(backend)?,
        moisture: row.try_get("moisture").map_err(backend)?,
        min_price: row.try_get("min_price").map_err(backend)?,
        current_high_bid: row.try_get("current_high_bid").map_err(backend)?,
        bids_count: row.try_get::<i32, _>("bids_count").map_err(backend)? as u32,
        location: row.try_get("location").map_err(backend)?,
        pincode: row.try_get("pincode").map_err(backend)?,
        status: row
            .try_get::<String, _>("status")
            .map_err(backend)?
            .parse::<OrderStatus>()
            .map_err(backend)?,
        created_at: row.try_get("created_at").map_err(backend)?,
        expires_at: row.try_get("expires_at").map_err(backend)?,
    })
}

fn bid_from_row(row: &PgRow) -> Result<Bid, StoreError> {
    Ok(Bid {
        id: row.try_get("id").map_err(backend)?,
        order_id: row.try_get("order_id").map_err(backend)?,
        bidder_id: row.try_get("bidder_id").map_err(backend)?,
        amount: row.try_get("amount").map_err(backend)?,
        created_at: row.try_get("created_at").map_err(backend)?,
    })
}

fn deal_from_row(row: &PgRow) -> Result<Deal, StoreError> {
    Ok(Deal {
        id: row.try_get("id").map_err(backend)?,
        order_id: row.try_get("order_id").map_err(backend)?,
        seller_id: row.try_get("seller_id").map_err(backend)?,
        buyer_id: row.try_get("buyer_id").map_err(backend)?,
        final_price: row.try_get("final_price").map_err(backend)?,
        total_amount: row.try_get("total_amount").map_err(backend)?,
        status: row
            .try_get::<String, _>("status")
            .map_err(backend)?
            .parse::<DealStatus>()
            .map_err(backend)?,
        created_at: row.try_get("created_at").map_err(backend)?,
    })
}

/// Postgres-backed [`MarketStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl MarketStore for PgStore {
    async fn insert_user(&self, user: User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            insert into users (id, name, role, location, verified, trust_score, created_at)
            values ($1, $2, $3, $4, $5, $6, $7)
            on conflict (id) do update set
              name = excluded.name,
              role = excluded.role,
              location = excluded.location,
              verified = excluded.verified,
              trust_score = excluded.trust_score
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(&user.location)
        .bind(user.verified)
        .bind(user.trust_score)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn user(&self, id: Uuid) -> Result<User, StoreError> {
        let row = sqlx::query("select * from users where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::UserNotFound)?;
        user_from_row(&row)
    }

    async fn insert_order(&self, order: Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            insert into orders (
              id, farmer_id, crop, variety, quantity, unit, moisture, min_price,
              current_high_bid, bids_count, location, pincode, status, created_at, expires_at
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15
            )
            "#,
        )
        .bind(order.id)
        .bind(order.farmer_id)
        .bind(order.crop.as_str())
        .bind(&order.variety)
        .bind(order.quantity)
        .bind(order.unit.as_str())
        .bind(order.moisture)
        .bind(order.min_price)
        .bind(order.current_high_bid)
        .bind(order.bids_count as i32)
        .bind(&order.location)
        .bind(&order.pincode)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.expires_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn order(&self, id: Uuid) -> Result<Order, StoreError> {
        let row = sqlx::query("select * from orders where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::OrderNotFound)?;
        order_from_row(&row)
    }

    async fn open_orders(
        &self,
        filter: &OrderFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            r#"
            select * from orders
            where status = 'OPEN'
              and expires_at > $1
              and ($2::text is null or crop = $2)
              and ($3::bigint is null or min_price >= $3)
              and ($4::text is null or location ilike '%' || $4 || '%')
            order by created_at desc
            "#,
        )
        .bind(now)
        .bind(filter.crop.map(|c| c.as_str()))
        .bind(filter.min_price)
        .bind(filter.location.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(order_from_row).collect()
    }

    async fn orders_by_farmer(&self, farmer_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let rows =
            sqlx::query("select * from orders where farmer_id = $1 order by created_at desc")
                .bind(farmer_id)
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        rows.iter().map(order_from_row).collect()
    }

    async fn bid(&self, id: Uuid) -> Result<Bid, StoreError> {
        let row = sqlx::query("select * from bids where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::BidNotFound)?;
        bid_from_row(&row)
    }

    async fn bids_for_order(&self, order_id: Uuid) -> Result<Vec<Bid>, StoreError> {
        let rows = sqlx::query(
            "select * from bids where order_id = $1 order by amount desc, created_at asc",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(bid_from_row).collect()
    }

    async fn bids_by_bidder(&self, bidder_id: Uuid) -> Result<Vec<Bid>, StoreError> {
        let rows =
            sqlx::query("select * from bids where bidder_id = $1 order by created_at desc")
                .bind(bidder_id)
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        rows.iter().map(bid_from_row).collect()
    }

    async fn commit_bid(&self, bid: Bid) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // The WHERE guard is the strict-increase re-check: a stale read must
        // not overwrite a higher concurrent bid.
        let updated = sqlx::query(
            r#"
            update orders
            set current_high_bid = $2,
                bids_count = bids_count + 1
            where id = $1
              and status = 'OPEN'
              and $2 > min_price
              and $2 > current_high_bid
            returning *
            "#,
        )
        .bind(bid.order_id)
        .bind(bid.amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        let Some(updated) = updated else {
            // Classify the refusal; the transaction has written nothing.
            let row = sqlx::query("select status, min_price, current_high_bid from orders where id = $1")
                .bind(bid.order_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?
                .ok_or(StoreError::OrderNotFound)?;
            let status: String = row.try_get("status").map_err(backend)?;
            if status != OrderStatus::Open.as_str() {
                return Err(StoreError::OrderNotOpen);
            }
            return Err(StoreError::BidNotCompetitive {
                floor: row.try_get("min_price").map_err(backend)?,
                high_bid: row.try_get("current_high_bid").map_err(backend)?,
            });
        };

        sqlx::query(
            "insert into bids (id, order_id, bidder_id, amount, created_at) values ($1, $2, $3, $4, $5)",
        )
        .bind(bid.id)
        .bind(bid.order_id)
        .bind(bid.bidder_id)
        .bind(bid.amount)
        .bind(bid.created_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        order_from_row(&updated)
    }

    async fn deal(&self, id: Uuid) -> Result<Deal, StoreError> {
        let row = sqlx::query("select * from deals where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::DealNotFound)?;
        deal_from_row(&row)
    }

    async fn deals_for_party(&self, user_id: Uuid) -> Result<Vec<Deal>, StoreError> {
        let rows = sqlx::query(
            "select * from deals where seller_id = $1 or buyer_id = $1 order by created_at desc",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(deal_from_row).collect()
    }

    async fn lock_and_create_deal(&self, deal: Deal) -> Result<Deal, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let locked = sqlx::query(
            "update orders set status = 'LOCKED' where id = $1 and status = 'OPEN' returning id",
        )
        .bind(deal.order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        if locked.is_none() {
            let exists = sqlx::query("select 1 from orders where id = $1")
                .bind(deal.order_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?;
            return Err(if exists.is_some() {
                StoreError::OrderNotOpen
            } else {
                StoreError::OrderNotFound
            });
        }

        let res = sqlx::query(
            r#"
            insert into deals (
              id, order_id, seller_id, buyer_id, final_price, total_amount, status, created_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(deal.id)
        .bind(deal.order_id)
        .bind(deal.seller_id)
        .bind(deal.buyer_id)
        .bind(deal.final_price)
        .bind(deal.total_amount)
        .bind(deal.status.as_str())
        .bind(deal.created_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = res {
            if is_unique_constraint_violation(&e, "uq_deals_order_id") {
                return Err(StoreError::DealAlreadyExists);
            }
            return Err(backend(e));
        }

        tx.commit().await.map_err(backend)?;
        Ok(deal)
    }

    async fn commit_deal_transition(
        &self,
        deal_id: Uuid,
        expected: DealStatus,
        next: DealStatus,
        reward: Option<(Uuid, Uuid)>,
    ) -> Result<Deal, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // Compare-and-set on the previously read status.
        let updated = sqlx::query(
            "update deals set status = $3 where id = $1 and status = $2 returning *",
        )
        .bind(deal_id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        let Some(updated) = updated else {
            let row = sqlx::query("select status from deals where id = $1")
                .bind(deal_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?
                .ok_or(StoreError::DealNotFound)?;
            let actual = row
                .try_get::<String, _>("status")
                .map_err(backend)?
                .parse::<DealStatus>()
                .map_err(backend)?;
            return Err(StoreError::StatusChanged { actual });
        };

        if let Some((seller_id, buyer_id)) = reward {
            // Same transaction as the status write: the delivery and its
            // credit land together or not at all.
            sqlx::query(
                "update users set trust_score = least($3, trust_score + $4) where id = $1 or id = $2",
            )
            .bind(seller_id)
            .bind(buyer_id)
            .bind(trust::MAX_SCORE)
            .bind(trust::REWARD_STEP)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        deal_from_row(&updated)
    }
}
