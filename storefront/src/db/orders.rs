// storefront/src/db/orders.rs

use crate::models::OrderRow;
use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;
use thali_orders::store::StoreResult;
use thali_orders::{Order, OrderPatch, OrderStatus, OrderStore, StoreError};
use tracing::instrument;
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, status, payment_method, payment_ref_id, total_paise, customer_name, phone, \
                             delivery_address, notes, user_id, created_at, updated_at";

/// `OrderStore` over the `orders` table. Transitions are a single conditional
/// `UPDATE ... WHERE status = $expected`, so concurrent writers race safely.
#[derive(Clone)]
pub struct PgOrderStore {
  pool: PgPool,
}

impl PgOrderStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

fn backend(err: sqlx::Error) -> StoreError {
  StoreError::Backend(anyhow::Error::new(err))
}

fn to_order(row: OrderRow) -> StoreResult<Order> {
  Order::try_from(row).map_err(StoreError::Backend)
}

#[async_trait]
impl OrderStore for PgOrderStore {
  #[instrument(name = "PgOrderStore::insert", skip(self, order), fields(order_id = %order.id))]
  async fn insert(&self, order: &Order) -> StoreResult<()> {
    let result = sqlx::query(
      "INSERT INTO orders (id, status, payment_method, payment_ref_id, total_paise, customer_name, phone, \
       delivery_address, notes, user_id, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(order.id)
    .bind(order.status.as_str())
    .bind(order.payment_method.code())
    .bind(order.payment_ref_id.as_deref())
    .bind(order.total_paise)
    .bind(&order.customer_name)
    .bind(&order.phone)
    .bind(&order.delivery_address)
    .bind(order.notes.as_deref())
    .bind(order.user_id)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&self.pool)
    .await;

    match result {
      Ok(_) => Ok(()),
      Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(StoreError::DuplicateId(order.id)),
      Err(e) => Err(backend(e)),
    }
  }

  #[instrument(name = "PgOrderStore::transition", skip(self, patch))]
  async fn transition(
    &self,
    id: Uuid,
    expected: OrderStatus,
    next: OrderStatus,
    patch: OrderPatch,
  ) -> StoreResult<bool> {
    let result = sqlx::query(
      "UPDATE orders SET status = $3, payment_ref_id = COALESCE($4, payment_ref_id), updated_at = now() \
       WHERE id = $1 AND status = $2",
    )
    .bind(id)
    .bind(expected.as_str())
    .bind(next.as_str())
    .bind(patch.payment_ref_id.as_deref())
    .execute(&self.pool)
    .await
    .map_err(backend)?;

    match result.rows_affected() {
      0 => Ok(false),
      1 => Ok(true),
      n => Err(StoreError::Backend(anyhow!("transition of order {} touched {} rows", id, n))),
    }
  }

  #[instrument(name = "PgOrderStore::find_by_id", skip(self))]
  async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(backend)?;
    row.map(to_order).transpose()
  }

  #[instrument(name = "PgOrderStore::find_by_payment_ref", skip(self))]
  async fn find_by_payment_ref(&self, reference: &str, status: OrderStatus) -> StoreResult<Vec<Order>> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
      "SELECT {} FROM orders WHERE payment_ref_id = $1 AND status = $2 ORDER BY created_at",
      ORDER_COLUMNS
    ))
    .bind(reference)
    .bind(status.as_str())
    .fetch_all(&self.pool)
    .await
    .map_err(backend)?;
    rows.into_iter().map(to_order).collect()
  }
}
