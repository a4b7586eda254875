// core/src/store/memory.rs

use super::{OrderStore, StoreError, StoreResult};
use crate::order::{Order, OrderPatch, OrderStatus};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// Process-local order table, used by tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
  rows: RwLock<HashMap<Uuid, Order>>,
}

impl InMemoryOrderStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.rows.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.read().is_empty()
  }

  pub fn all(&self) -> Vec<Order> {
    self.rows.read().values().cloned().collect()
  }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
  async fn insert(&self, order: &Order) -> StoreResult<()> {
    let mut rows = self.rows.write();
    if rows.contains_key(&order.id) {
      return Err(StoreError::DuplicateId(order.id));
    }
    rows.insert(order.id, order.clone());
    Ok(())
  }

  async fn transition(
    &self,
    id: Uuid,
    expected: OrderStatus,
    next: OrderStatus,
    patch: OrderPatch,
  ) -> StoreResult<bool> {
    let mut rows = self.rows.write();
    match rows.get_mut(&id) {
      Some(order) if order.status == expected => {
        order.status = next;
        patch.apply(order);
        order.updated_at = Utc::now();
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Order>> {
    Ok(self.rows.read().get(&id).cloned())
  }

  async fn find_by_payment_ref(&self, reference: &str, status: OrderStatus) -> StoreResult<Vec<Order>> {
    Ok(
      self
        .rows
        .read()
        .values()
        .filter(|o| o.status == status && o.payment_ref_id.as_deref() == Some(reference))
        .cloned()
        .collect(),
    )
  }
}
