// core/src/tracking.rs

//! Read side of an order: the status page model, the one-time verify on
//! return from a gateway, and the approval poller.

use crate::error::OrderResult;
use crate::gateway::VerifyEvidence;
use crate::notify::format_rupees;
use crate::order::{Order, OrderStatus, PaymentMethod, RedirectGateway};
use crate::state_machine::OrderStateMachine;
use crate::verification::PaymentVerifier;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn, Instrument};
use uuid::Uuid;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Query parameters a gateway appends when it sends the customer back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReturnMarker {
  /// Stripe: `success` or `cancelled`.
  pub payment_status: Option<String>,
  pub session_id: Option<String>,
  /// PhonePe callback status.
  pub status: Option<String>,
  #[serde(alias = "transactionId")]
  pub transaction_id: Option<String>,
}

impl ReturnMarker {
  /// Evidence for the order's gateway, if the marker carries any.
  pub fn evidence_for(&self, method: PaymentMethod) -> Option<VerifyEvidence> {
    match method {
      PaymentMethod::Redirect(RedirectGateway::Stripe)
        if self.payment_status.is_some() || self.session_id.is_some() =>
      {
        Some(VerifyEvidence::CheckoutSession {
          session_id: self.session_id.clone(),
          marker: self.payment_status.clone(),
        })
      }
      PaymentMethod::Redirect(RedirectGateway::PhonePe) if self.status.is_some() || self.transaction_id.is_some() => {
        Some(VerifyEvidence::Callback {
          status: self.status.clone(),
          transaction_id: self.transaction_id.clone(),
        })
      }
      _ => None,
    }
  }
}

/// What the status page shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingView {
  pub order: Order,
  pub headline: String,
  pub detail: String,
  pub icon: &'static str,
  pub awaiting_approval: bool,
  pub can_submit_reference: bool,
  pub terminal: bool,
}

impl TrackingView {
  pub fn render(order: Order) -> Self {
    let amount = format_rupees(order.total_paise);
    let (headline, detail, icon) = match (order.status, order.payment_method) {
      (OrderStatus::Completed, _) => (
        "Order confirmed".to_string(),
        "Your payment was received and the kitchen has your order.".to_string(),
        "success",
      ),
      (OrderStatus::Pending, PaymentMethod::Cod) => (
        "Order placed".to_string(),
        format!("Please keep {} in cash ready for the delivery.", amount),
        "success",
      ),
      (OrderStatus::Pending, _) => (
        "Awaiting payment".to_string(),
        format!("Scan the QR code to pay {}, then submit your payment reference.", amount),
        "pending",
      ),
      (OrderStatus::PendingOwnerApproval, _) => (
        "Verifying your payment".to_string(),
        format!(
          "The restaurant is confirming payment reference {}. This page updates by itself.",
          order.payment_ref_id.as_deref().unwrap_or("N/A")
        ),
        "awaiting",
      ),
      (OrderStatus::Initiated | OrderStatus::Draft, _) => (
        "Awaiting payment".to_string(),
        "We have not heard from the payment provider yet.".to_string(),
        "pending",
      ),
      (OrderStatus::Rejected, _) => (
        "Payment not verified".to_string(),
        "The restaurant could not match your payment. Please contact us with your reference.".to_string(),
        "rejected",
      ),
      (OrderStatus::Failed, _) => (
        "Payment failed".to_string(),
        "Your payment did not go through. You can place the order again.".to_string(),
        "failed",
      ),
    };

    Self {
      headline,
      detail,
      icon,
      awaiting_approval: order.status == OrderStatus::PendingOwnerApproval,
      can_submit_reference: order.status == OrderStatus::Pending && order.payment_method.is_manual_qr(),
      terminal: order.status.is_terminal(),
      order,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "status", rename_all = "snake_case")]
pub enum PollState {
  Waiting,
  Settled(OrderStatus),
  Cancelled,
  /// The order disappeared while being watched.
  Lost,
}

/// Owns a running approval poller. Dropping the handle cancels it.
pub struct PollHandle {
  state: watch::Receiver<PollState>,
  sender: Arc<watch::Sender<PollState>>,
  task: JoinHandle<()>,
}

impl PollHandle {
  pub fn state(&self) -> PollState {
    *self.state.borrow()
  }

  pub fn subscribe(&self) -> watch::Receiver<PollState> {
    self.state.clone()
  }

  /// Waits until the poller leaves `Waiting`.
  pub async fn finished(&mut self) -> PollState {
    match self.state.wait_for(|s| *s != PollState::Waiting).await {
      Ok(state) => *state,
      Err(_) => PollState::Cancelled,
    }
  }

  pub fn cancel(&self) {
    self.task.abort();
    self.sender.send_if_modified(|s| {
      if *s == PollState::Waiting {
        *s = PollState::Cancelled;
        true
      } else {
        false
      }
    });
  }
}

impl Drop for PollHandle {
  fn drop(&mut self) {
    self.cancel();
  }
}

#[derive(Clone)]
pub struct OrderTracker {
  machine: OrderStateMachine,
  verifier: PaymentVerifier,
  poll_interval: Duration,
}

impl OrderTracker {
  pub fn new(machine: OrderStateMachine, verifier: PaymentVerifier) -> Self {
    Self {
      machine,
      verifier,
      poll_interval: DEFAULT_POLL_INTERVAL,
    }
  }

  pub fn with_poll_interval(mut self, interval: Duration) -> Self {
    self.poll_interval = interval.max(MIN_POLL_INTERVAL);
    self
  }

  pub fn poll_interval(&self) -> Duration {
    self.poll_interval
  }

  /// Loads the order, verifying once first when it is `initiated` and the
  /// customer just came back from its gateway.
  #[instrument(name = "OrderTracker::view", skip(self, marker), err(Display))]
  pub async fn view(&self, order_id: Uuid, marker: Option<&ReturnMarker>) -> OrderResult<TrackingView> {
    let order = self.machine.load(order_id).await?;
    if order.status != OrderStatus::Initiated {
      return Ok(TrackingView::render(order));
    }
    let Some(evidence) = marker.and_then(|m| m.evidence_for(order.payment_method)) else {
      return Ok(TrackingView::render(order));
    };

    match self.verifier.verify(order_id, &evidence).await {
      Ok(verified) => Ok(TrackingView::render(verified)),
      Err(e) => {
        warn!(error = %e, "Return verification failed; showing the stored status.");
        Ok(TrackingView::render(self.machine.load(order_id).await?))
      }
    }
  }

  pub async fn refresh(&self, order_id: Uuid) -> OrderResult<TrackingView> {
    self.view(order_id, None).await
  }

  /// Re-reads the order every `interval` (at least three seconds) until it
  /// leaves `pending_owner_approval`.
  pub fn watch_approval(&self, order_id: Uuid, interval: Option<Duration>) -> PollHandle {
    let interval = interval.unwrap_or(self.poll_interval).max(MIN_POLL_INTERVAL);
    let (tx, rx) = watch::channel(PollState::Waiting);
    let sender = Arc::new(tx);
    let span = tracing::info_span!("approval_poller", order_id = %order_id, interval_secs = interval.as_secs());
    let task = tokio::spawn(poll_until_settled(self.machine.clone(), order_id, interval, sender.clone()).instrument(span));
    PollHandle {
      state: rx,
      sender,
      task,
    }
  }
}

async fn poll_until_settled(
  machine: OrderStateMachine,
  order_id: Uuid,
  interval: Duration,
  sender: Arc<watch::Sender<PollState>>,
) {
  let mut ticker = tokio::time::interval(interval);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
  loop {
    ticker.tick().await;
    match machine.store().find_by_id(order_id).await {
      Ok(Some(order)) if order.status == OrderStatus::PendingOwnerApproval => {
        debug!("Still awaiting owner approval.");
      }
      Ok(Some(order)) => {
        info!(status = %order.status, "Approval settled.");
        sender.send_replace(PollState::Settled(order.status));
        return;
      }
      Ok(None) => {
        warn!("Watched order no longer exists.");
        sender.send_replace(PollState::Lost);
        return;
      }
      Err(e) => {
        warn!(error = %e, "Order lookup failed; will retry on the next tick.");
      }
    }
  }
}
