// core/src/store/mod.rs

//! Persistence seam for order records.

pub mod memory;

use crate::order::{Order, OrderPatch, OrderStatus};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("an order with id {0} already exists")]
  DuplicateId(Uuid),

  #[error("order store backend failure: {0}")]
  Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Writes a new row. Fails with `DuplicateId` when the id is taken.
  async fn insert(&self, order: &Order) -> StoreResult<()>;

  /// Moves `id` from `expected` to `next`, applying `patch` and stamping
  /// `updated_at`, only if the row is currently in `expected`.
  ///
  /// Returns `false` when no row matched; the caller lost a race or the
  /// order does not exist.
  async fn transition(&self, id: Uuid, expected: OrderStatus, next: OrderStatus, patch: OrderPatch)
    -> StoreResult<bool>;

  async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Order>>;

  /// Orders in `status` carrying `payment_ref_id == reference`.
  async fn find_by_payment_ref(&self, reference: &str, status: OrderStatus) -> StoreResult<Vec<Order>>;
}
