// core/src/state_machine.rs

use crate::error::{OrderError, OrderResult};
use crate::gateway::{PaymentOutcome, Verification};
use crate::order::{Order, OrderPatch, OrderStatus};
use crate::reference::{generate_reference, validate_reference};
use crate::store::{OrderStore, StoreError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const MAX_INSERT_ATTEMPTS: u32 = 3;

/// Result of a conditional transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  Applied,
  /// Another writer moved the order first; nothing was written.
  Lost,
}

/// Retry schedule for gateway-driven writes against an unavailable store.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
  pub attempts: u32,
  pub backoff: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      attempts: 3,
      backoff: Duration::from_millis(200),
    }
  }
}

/// Owns every write to an order's status.
#[derive(Clone)]
pub struct OrderStateMachine {
  store: Arc<dyn OrderStore>,
  retry: RetryPolicy,
}

impl OrderStateMachine {
  pub fn new(store: Arc<dyn OrderStore>) -> Self {
    Self {
      store,
      retry: RetryPolicy::default(),
    }
  }

  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  pub fn store(&self) -> &Arc<dyn OrderStore> {
    &self.store
  }

  pub async fn load(&self, id: Uuid) -> OrderResult<Order> {
    self
      .store
      .find_by_id(id)
      .await?
      .ok_or_else(|| OrderError::NotFound(format!("order {}", id)))
  }

  /// Writes the first row of an order. `order.status` must be the entry status
  /// of its payment method.
  ///
  /// With `regenerate_id`, a duplicate id is replaced by a fresh one and the
  /// insert retried; without it (the id is already known to a gateway) the
  /// duplicate is a conflict.
  #[instrument(skip_all, fields(order_id = %order.id, method = %order.payment_method), err(Display))]
  pub async fn create(&self, mut order: Order, regenerate_id: bool) -> OrderResult<Order> {
    if order.status != order.payment_method.entry_status() {
      return Err(OrderError::Conflict(format!(
        "{} orders start as {}, not {}",
        order.payment_method,
        order.payment_method.entry_status(),
        order.status
      )));
    }

    let mut attempt = 1;
    loop {
      match self.store.insert(&order).await {
        Ok(()) => {
          info!(order_id = %order.id, status = %order.status, "Order persisted.");
          return Ok(order);
        }
        Err(StoreError::DuplicateId(id)) if regenerate_id && attempt < MAX_INSERT_ATTEMPTS => {
          warn!(duplicate = %id, attempt, "Order id already taken, regenerating.");
          order.id = Uuid::new_v4();
          attempt += 1;
        }
        Err(e) => return Err(e.into()),
      }
    }
  }

  /// Conditional update along a legal edge. Illegal edges are a conflict; a
  /// lost race is reported as `Transition::Lost`, not an error.
  #[instrument(skip(self, patch), err(Display))]
  pub async fn transition(
    &self,
    id: Uuid,
    expected: OrderStatus,
    next: OrderStatus,
    patch: OrderPatch,
  ) -> OrderResult<Transition> {
    if !expected.can_transition_to(next) {
      return Err(OrderError::Conflict(format!(
        "order cannot move from {} to {}",
        expected, next
      )));
    }
    if self.store.transition(id, expected, next, patch).await? {
      Ok(Transition::Applied)
    } else {
      info!("Conditional update matched no row.");
      Ok(Transition::Lost)
    }
  }

  /// Fails with a conflict when `reference` is attached to a completed order
  /// other than `order_id`.
  pub async fn ensure_reference_unused(&self, reference: &str, order_id: Uuid) -> OrderResult<()> {
    let holders = self.store.find_by_payment_ref(reference, OrderStatus::Completed).await?;
    if holders.iter().any(|o| o.id != order_id) {
      return Err(OrderError::Conflict(
        "this payment reference has already been used for another order".into(),
      ));
    }
    Ok(())
  }

  /// Manual QR: attaches the customer's reference and moves the order to
  /// `pending_owner_approval`.
  ///
  /// A missing reference is generated when the customer asserts payment. The
  /// format is checked before the store is touched.
  #[instrument(skip(self, reference), err(Display))]
  pub async fn submit_reference(&self, order_id: Uuid, reference: Option<&str>, i_have_paid: bool) -> OrderResult<Order> {
    let reference = match reference.map(str::trim).filter(|r| !r.is_empty()) {
      Some(raw) => validate_reference(raw)?,
      None if i_have_paid => generate_reference(),
      None => {
        return Err(OrderError::validation(
          "reference",
          "enter the payment reference or confirm that you have paid",
        ))
      }
    };

    let order = self.load(order_id).await?;
    if !order.payment_method.is_manual_qr() {
      return Err(OrderError::Conflict(format!(
        "{} orders do not take a payment reference",
        order.payment_method
      )));
    }
    match order.status {
      OrderStatus::Pending => {}
      OrderStatus::PendingOwnerApproval if order.payment_ref_id.as_deref() == Some(reference.as_str()) => {
        return Ok(order);
      }
      other => {
        return Err(OrderError::Conflict(format!("order is already {}", other)));
      }
    }

    self.ensure_reference_unused(&reference, order_id).await?;
    self
      .transition(
        order_id,
        OrderStatus::Pending,
        OrderStatus::PendingOwnerApproval,
        OrderPatch::with_reference(reference),
      )
      .await?;
    self.load(order_id).await
  }

  /// Applies a gateway verification to an `initiated` order.
  ///
  /// `paid` completes, `failed` fails, `unpaid` leaves the order as it is.
  /// Repeating a verification that already landed is a no-op.
  #[instrument(skip(self, verification), fields(outcome = ?verification.outcome), err(Display))]
  pub async fn record_verification(&self, order_id: Uuid, verification: Verification) -> OrderResult<Order> {
    let order = self.retry_store("load", || self.load(order_id)).await?;
    let target = match verification.outcome {
      PaymentOutcome::Paid => OrderStatus::Completed,
      PaymentOutcome::Failed => OrderStatus::Failed,
      PaymentOutcome::Unpaid => {
        info!("Payment not collected yet; order stays {}.", order.status);
        return Ok(order);
      }
    };

    if order.status == OrderStatus::Completed || order.status == target {
      return Ok(order);
    }
    if order.status != OrderStatus::Initiated {
      return Err(OrderError::Conflict(format!(
        "order is {}, it cannot become {}",
        order.status, target
      )));
    }

    let mut patch = OrderPatch::default();
    if let Some(external_ref) = verification.external_ref {
      if target == OrderStatus::Completed {
        self
          .retry_store("duplicate reference check", || {
            self.ensure_reference_unused(&external_ref, order_id)
          })
          .await?;
      }
      patch.payment_ref_id = Some(external_ref);
    }

    self
      .retry_store("transition", || {
        self.transition(order_id, OrderStatus::Initiated, target, patch.clone())
      })
      .await?;
    self.retry_store("reload", || self.load(order_id)).await
  }

  /// Retries `op` while it reports the store as unavailable, sleeping
  /// `backoff * attempt` between tries.
  async fn retry_store<T, F, Fut>(&self, what: &'static str, mut op: F) -> OrderResult<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = OrderResult<T>>,
  {
    let mut attempt = 1;
    loop {
      match op().await {
        Err(e) if e.is_transient() && attempt < self.retry.attempts => {
          warn!(what, attempt, error = %e, "Order store unavailable, retrying.");
          tokio::time::sleep(self.retry.backoff * attempt).await;
          attempt += 1;
        }
        other => return other,
      }
    }
  }
}
