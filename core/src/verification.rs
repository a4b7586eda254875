// core/src/verification.rs

use crate::error::{OrderError, OrderResult};
use crate::gateway::{Gateways, VerifyEvidence};
use crate::order::{Order, OrderStatus};
use crate::state_machine::OrderStateMachine;
use tracing::{info, instrument};
use uuid::Uuid;

/// Asks the order's own gateway about a payment and records the answer.
#[derive(Clone)]
pub struct PaymentVerifier {
  machine: OrderStateMachine,
  gateways: Gateways,
}

impl PaymentVerifier {
  pub fn new(machine: OrderStateMachine, gateways: Gateways) -> Self {
    Self { machine, gateways }
  }

  /// A completed order is returned untouched without calling the gateway.
  #[instrument(name = "PaymentVerifier::verify", skip(self, evidence), fields(evidence = evidence.kind()), err(Display))]
  pub async fn verify(&self, order_id: Uuid, evidence: &VerifyEvidence) -> OrderResult<Order> {
    let order = self.machine.load(order_id).await?;
    match order.status {
      OrderStatus::Completed => {
        info!("Order already completed; verification is a no-op.");
        return Ok(order);
      }
      OrderStatus::Initiated => {}
      other => {
        return Err(OrderError::Conflict(format!(
          "order is {}, there is no gateway payment to verify",
          other
        )));
      }
    }

    let gateway = self.gateways.for_method(order.payment_method)?;
    let verification = gateway.verify(&order, evidence).await?;
    self.machine.record_verification(order_id, verification).await
  }
}
