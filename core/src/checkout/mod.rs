// core/src/checkout/mod.rs

//! Checkout: turns a cart, an address and a payment choice into a persisted
//! order and tells the caller where to send the customer next.

pub mod context;
mod pipeline;

use crate::approval::ApprovalLinks;
use crate::cart::CartService;
use crate::error::{FlowError, OrderError, OrderResult};
use crate::gateway::{Gateways, SessionHandle, VerifyEvidence};
use crate::identity::IdentityService;
use crate::notify::{self, Notifier};
use crate::order::{Order, OrderStatus, PaymentMethod, QrVariant};
use crate::state_machine::OrderStateMachine;
use crate::verification::PaymentVerifier;
use crate::{ContextData, Pipeline};
use context::CheckoutCtx;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;
use uuid::Uuid;

pub const DEFAULT_DELIVERY_FEE_PAISE: i64 = 4000;
pub const DEFAULT_CASH_CONFIRM_DELAY: Duration = Duration::from_secs(2);

const QR_IMAGE_SERVICE: &str = "https://api.qrserver.com/v1/create-qr-code/";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressForm {
  pub full_name: String,
  pub phone: String,
  pub street: String,
  pub city: String,
  pub state: String,
  pub pincode: String,
  #[serde(default)]
  pub notes: Option<String>,
}

impl AddressForm {
  /// Every field except `notes` is required.
  pub fn validate(&self) -> OrderResult<()> {
    let fields = [
      ("full_name", &self.full_name),
      ("phone", &self.phone),
      ("street", &self.street),
      ("city", &self.city),
      ("state", &self.state),
      ("pincode", &self.pincode),
    ];
    for (field, value) in fields {
      if value.trim().is_empty() {
        return Err(OrderError::validation(field, "this field is required"));
      }
    }
    Ok(())
  }

  /// `"street, city, state - pincode"`
  pub fn delivery_address(&self) -> String {
    format!(
      "{}, {}, {} - {}",
      self.street.trim(),
      self.city.trim(),
      self.state.trim(),
      self.pincode.trim()
    )
  }

  pub fn notes(&self) -> Option<String> {
    self.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()).map(String::from)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
  pub method: PaymentMethod,
  pub address: AddressForm,
  #[serde(default)]
  pub customer_email: Option<String>,
  /// Manual QR only: a reference typed in at checkout.
  #[serde(default)]
  pub reference: Option<String>,
  /// Manual QR only: "I have paid" without a reference.
  #[serde(default)]
  pub i_have_paid: bool,
}

/// Where the customer goes after checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutOutcome {
  RedirectToCart,
  Redirect { order_id: Uuid, url: String },
  OpenSession { order_id: Uuid, handle: SessionHandle },
  ShowQr { order_id: Uuid, upi_url: String, qr_image_url: String },
  Track { order_id: Uuid },
}

impl CheckoutOutcome {
  pub fn order_id(&self) -> Option<Uuid> {
    match self {
      CheckoutOutcome::RedirectToCart => None,
      CheckoutOutcome::Redirect { order_id, .. }
      | CheckoutOutcome::OpenSession { order_id, .. }
      | CheckoutOutcome::ShowQr { order_id, .. }
      | CheckoutOutcome::Track { order_id } => Some(*order_id),
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct UpiSettings {
  pub payee_vpa: String,
  pub payee_name: String,
  /// Static image of the owner's personal QR, shown for `qr_owner`.
  pub owner_qr_image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
  pub delivery_fee_paise: i64,
  pub cash_confirm_delay: Duration,
  /// Base of customer-facing pages; gateways return to `{base}/orders/{id}`.
  pub public_site_url: String,
  pub upi: UpiSettings,
  pub owner_email: Option<String>,
}

impl Default for CheckoutSettings {
  fn default() -> Self {
    Self {
      delivery_fee_paise: DEFAULT_DELIVERY_FEE_PAISE,
      cash_confirm_delay: DEFAULT_CASH_CONFIRM_DELAY,
      public_site_url: "http://localhost:8080".into(),
      upi: UpiSettings::default(),
      owner_email: None,
    }
  }
}

impl CheckoutSettings {
  pub fn tracking_url(&self, order_id: Uuid) -> String {
    format!("{}/orders/{}", self.public_site_url.trim_end_matches('/'), order_id)
  }

  /// `upi://pay` intent for the order amount, plus a QR image of it.
  pub fn upi_payment(&self, order_id: Uuid, total_paise: i64, variant: QrVariant) -> OrderResult<(String, String)> {
    let short = notify::short_id(order_id);
    let amount = format!("{}.{:02}", total_paise / 100, total_paise % 100);
    let note = format!("Order #{}", short);
    let txn_ref = format!("TR{}", short.to_ascii_uppercase());
    let upi = Url::parse_with_params(
      "upi://pay",
      &[
        ("pa", self.upi.payee_vpa.as_str()),
        ("pn", self.upi.payee_name.as_str()),
        ("am", amount.as_str()),
        ("tn", note.as_str()),
        ("cu", "INR"),
        ("tr", txn_ref.as_str()),
      ],
    )
    .map_err(|e| OrderError::Workflow(FlowError::Internal(format!("bad UPI url: {}", e))))?
    .to_string();

    let image = match (variant, &self.upi.owner_qr_image_url) {
      (QrVariant::Owner, Some(url)) => url.clone(),
      _ => Url::parse_with_params(QR_IMAGE_SERVICE, &[("size", "200x200"), ("data", upi.as_str())])
        .map_err(|e| OrderError::Workflow(FlowError::Internal(format!("bad QR url: {}", e))))?
        .to_string(),
    };
    Ok((upi, image))
  }
}

/// Services the checkout steps share.
pub(crate) struct CheckoutDeps {
  pub machine: OrderStateMachine,
  pub gateways: Gateways,
  pub notifier: Arc<dyn Notifier>,
  pub links: ApprovalLinks,
  pub settings: CheckoutSettings,
}

impl CheckoutDeps {
  /// Tells the owner a manual payment is waiting. Never fails.
  pub async fn notify_owner_of_submission(&self, order: &Order) {
    let Some(owner) = self.settings.owner_email.as_deref() else {
      info!(order_id = %order.id, "No owner e-mail configured; skipping approval request.");
      return;
    };
    let reference = order.payment_ref_id.as_deref();
    let approve = self.links.link(order.id, true, reference);
    let reject = self.links.link(order.id, false, reference);
    let (subject, body) = notify::approval_request(order, &approve, &reject);
    notify::send_best_effort(self.notifier.as_ref(), owner, &subject, &body).await;
  }
}

pub struct CheckoutOrchestrator {
  deps: Arc<CheckoutDeps>,
  verifier: PaymentVerifier,
  pipeline: Pipeline<CheckoutCtx, OrderError>,
}

impl CheckoutOrchestrator {
  pub fn new(
    machine: OrderStateMachine,
    gateways: Gateways,
    notifier: Arc<dyn Notifier>,
    links: ApprovalLinks,
    settings: CheckoutSettings,
  ) -> Self {
    let verifier = PaymentVerifier::new(machine.clone(), gateways.clone());
    let deps = Arc::new(CheckoutDeps {
      machine,
      gateways,
      notifier,
      links,
      settings,
    });
    let pipeline = pipeline::build(deps.clone());
    Self {
      deps,
      verifier,
      pipeline,
    }
  }

  pub fn settings(&self) -> &CheckoutSettings {
    &self.deps.settings
  }

  /// Runs `guard_cart → validate_address → price_order → dispatch_payment →
  /// notify_owner`.
  #[instrument(name = "Checkout::checkout", skip_all, fields(method = %request.method), err(Display))]
  pub async fn checkout(
    &self,
    cart: Arc<dyn CartService>,
    identity: &dyn IdentityService,
    request: CheckoutRequest,
  ) -> OrderResult<CheckoutOutcome> {
    let user_id = identity.current().await.map(|i| i.user_id);
    let ctx = ContextData::new(CheckoutCtx::new(cart, request, user_id));
    self.pipeline.run(ctx.clone()).await?;

    let outcome = ctx.write().outcome.take();
    outcome.ok_or_else(|| OrderError::Workflow(FlowError::Internal("checkout produced no outcome".into())))
  }

  /// Client finished the embedded checkout: verify at once, then track.
  #[instrument(name = "Checkout::complete_session", skip(self, evidence, cart), err(Display))]
  pub async fn complete_session(
    &self,
    order_id: Uuid,
    evidence: VerifyEvidence,
    cart: &dyn CartService,
  ) -> OrderResult<CheckoutOutcome> {
    let order = self.verifier.verify(order_id, &evidence).await?;
    if order.status == OrderStatus::Completed {
      cart.clear().await;
    }
    Ok(CheckoutOutcome::Track { order_id })
  }

  /// Manual QR: the customer reports payment for an existing `pending` order.
  #[instrument(name = "Checkout::submit_manual_payment", skip(self, reference, cart), err(Display))]
  pub async fn submit_manual_payment(
    &self,
    order_id: Uuid,
    reference: Option<&str>,
    i_have_paid: bool,
    cart: &dyn CartService,
  ) -> OrderResult<CheckoutOutcome> {
    let order = self.deps.machine.submit_reference(order_id, reference, i_have_paid).await?;
    cart.clear().await;
    self.deps.notify_owner_of_submission(&order).await;
    Ok(CheckoutOutcome::Track { order_id })
  }

  pub fn verifier(&self) -> &PaymentVerifier {
    &self.verifier
  }

  /// Labels of the gateways that have credentials.
  pub fn configured_gateways(&self) -> Vec<&'static str> {
    self.deps.gateways.configured()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn form() -> AddressForm {
    AddressForm {
      full_name: "Asha Rao".into(),
      phone: "9876543210".into(),
      street: "12 MG Road".into(),
      city: "Pune".into(),
      state: "MH".into(),
      pincode: "411001".into(),
      notes: Some("  ".into()),
    }
  }

  #[test]
  fn address_names_first_missing_field() {
    let mut f = form();
    f.city = " ".into();
    match f.validate() {
      Err(OrderError::Validation { field, .. }) => assert_eq!(field, "city"),
      other => panic!("expected validation error, got {:?}", other),
    }
  }

  #[test]
  fn delivery_address_format() {
    assert_eq!(form().delivery_address(), "12 MG Road, Pune, MH - 411001");
    assert_eq!(form().notes(), None);
  }

  #[test]
  fn upi_intent_carries_amount_and_payee() {
    let settings = CheckoutSettings {
      upi: UpiSettings {
        payee_vpa: "thali@ybl".into(),
        payee_name: "Thali House".into(),
        owner_qr_image_url: Some("https://cdn.test/owner-qr.png".into()),
      },
      ..Default::default()
    };
    let id = Uuid::new_v4();
    let (upi, image) = settings.upi_payment(id, 60000, QrVariant::Generic).unwrap();
    assert!(upi.starts_with("upi://pay?"));
    assert!(upi.contains("pa=thali%40ybl"));
    assert!(upi.contains("am=600.00"));
    assert!(image.starts_with(QR_IMAGE_SERVICE));

    let (_, owner_image) = settings.upi_payment(id, 60000, QrVariant::Owner).unwrap();
    assert_eq!(owner_image, "https://cdn.test/owner-qr.png");
  }
}
