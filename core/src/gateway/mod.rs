// core/src/gateway/mod.rs

//! Payment gateway seam and the three concrete adapters.

pub mod phonepe;
pub mod razorpay;
pub mod stripe;

use crate::order::{Order, PaymentMethod, RedirectGateway};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub use phonepe::{PhonePeConfig, PhonePeGateway};
pub use razorpay::{RazorpayConfig, RazorpayGateway};
pub use stripe::{StripeConfig, StripeGateway};

#[derive(Debug, Error)]
pub enum GatewayError {
  #[error("{0} is not configured")]
  NotConfigured(&'static str),

  #[error("{gateway} request failed: {source}")]
  Http {
    gateway: &'static str,
    #[source]
    source: reqwest::Error,
  },

  #[error("{gateway} rejected the request ({status}): {body}")]
  Rejected {
    gateway: &'static str,
    status: u16,
    body: String,
  },

  #[error("{gateway} returned an unexpected response: {message}")]
  InvalidResponse { gateway: &'static str, message: String },

  #[error("{0}")]
  Mismatch(String),

  #[error("{gateway} cannot verify with {evidence} evidence")]
  UnsupportedEvidence {
    gateway: &'static str,
    evidence: &'static str,
  },
}

impl GatewayError {
  pub(crate) fn http(gateway: &'static str) -> impl FnOnce(reqwest::Error) -> GatewayError {
    move |source| GatewayError::Http { gateway, source }
  }

  pub(crate) fn invalid(gateway: &'static str, message: impl Into<String>) -> GatewayError {
    GatewayError::InvalidResponse {
      gateway,
      message: message.into(),
    }
  }
}

/// Reads the body of a non-2xx response into `GatewayError::Rejected`.
pub(crate) async fn ensure_success(
  gateway: &'static str,
  response: reqwest::Response,
) -> Result<reqwest::Response, GatewayError> {
  if response.status().is_success() {
    return Ok(response);
  }
  let status = response.status().as_u16();
  let body = response.text().await.unwrap_or_default();
  tracing::warn!(gateway, status, body = %body, "Gateway rejected request.");
  Err(GatewayError::Rejected { gateway, status, body })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContact {
  pub name: String,
  pub phone: String,
  pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateRequest {
  pub order_id: Uuid,
  pub amount_paise: i64,
  /// Where the gateway sends the customer back (the order tracking page).
  pub redirect_target: String,
  pub customer: CustomerContact,
}

/// What the client needs to open the embedded checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
  pub gateway_order_id: String,
  pub key_id: String,
  pub amount_paise: i64,
  pub currency: String,
  pub merchant_name: String,
  pub prefill: CustomerContact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Initiation {
  Redirect { url: String, gateway_ref: Option<String> },
  Session(SessionHandle),
}

impl Initiation {
  pub fn gateway_ref(&self) -> Option<&str> {
    match self {
      Initiation::Redirect { gateway_ref, .. } => gateway_ref.as_deref(),
      Initiation::Session(handle) => Some(handle.gateway_order_id.as_str()),
    }
  }
}

/// Evidence of payment brought back by the customer or the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerifyEvidence {
  /// PhonePe redirect callback.
  Callback {
    status: Option<String>,
    transaction_id: Option<String>,
  },
  /// Stripe return with `payment_status` and `session_id`.
  CheckoutSession {
    session_id: Option<String>,
    marker: Option<String>,
  },
  /// Razorpay client completion callback.
  Signature {
    gateway_order_id: String,
    payment_id: String,
    signature: String,
  },
}

impl VerifyEvidence {
  pub fn kind(&self) -> &'static str {
    match self {
      VerifyEvidence::Callback { .. } => "callback",
      VerifyEvidence::CheckoutSession { .. } => "checkout_session",
      VerifyEvidence::Signature { .. } => "signature",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
  Paid,
  Unpaid,
  Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
  pub outcome: PaymentOutcome,
  pub external_ref: Option<String>,
}

impl Verification {
  pub fn paid(external_ref: Option<String>) -> Self {
    Self {
      outcome: PaymentOutcome::Paid,
      external_ref,
    }
  }

  pub fn unpaid() -> Self {
    Self {
      outcome: PaymentOutcome::Unpaid,
      external_ref: None,
    }
  }

  pub fn failed(external_ref: Option<String>) -> Self {
    Self {
      outcome: PaymentOutcome::Failed,
      external_ref,
    }
  }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  fn name(&self) -> &'static str;

  async fn initiate(&self, request: &InitiateRequest) -> Result<Initiation, GatewayError>;

  /// Asks the gateway about `order`'s payment. `evidence` comes from the
  /// client and only says where to look; it must belong to the gateway
  /// reference stored on the order.
  async fn verify(&self, order: &Order, evidence: &VerifyEvidence) -> Result<Verification, GatewayError>;
}

/// The configured adapters, looked up by payment method.
#[derive(Clone, Default)]
pub struct Gateways {
  phonepe: Option<Arc<dyn PaymentGateway>>,
  stripe: Option<Arc<dyn PaymentGateway>>,
  razorpay: Option<Arc<dyn PaymentGateway>>,
}

impl Gateways {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_phonepe(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
    self.phonepe = Some(gateway);
    self
  }

  pub fn with_stripe(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
    self.stripe = Some(gateway);
    self
  }

  pub fn with_razorpay(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
    self.razorpay = Some(gateway);
    self
  }

  pub fn for_method(&self, method: PaymentMethod) -> Result<Arc<dyn PaymentGateway>, GatewayError> {
    let (slot, label) = match method {
      PaymentMethod::Redirect(RedirectGateway::PhonePe) => (&self.phonepe, "PhonePe"),
      PaymentMethod::Redirect(RedirectGateway::Stripe) => (&self.stripe, "Stripe"),
      PaymentMethod::Session => (&self.razorpay, "Razorpay"),
      PaymentMethod::Cod | PaymentMethod::ManualQr(_) => {
        return Err(GatewayError::NotConfigured("a gateway for offline payment"));
      }
    };
    slot.clone().ok_or(GatewayError::NotConfigured(label))
  }

  pub fn configured(&self) -> Vec<&'static str> {
    [&self.phonepe, &self.stripe, &self.razorpay]
      .into_iter()
      .flatten()
      .map(|g| g.name())
      .collect()
  }
}

impl std::fmt::Debug for Gateways {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Gateways").field("configured", &self.configured()).finish()
  }
}
