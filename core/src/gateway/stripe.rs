// core/src/gateway/stripe.rs

use super::{
  ensure_success, GatewayError, InitiateRequest, Initiation, PaymentGateway, Verification, VerifyEvidence,
};
use crate::order::Order;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument, warn};

const NAME: &str = "stripe";

#[derive(Debug, Clone)]
pub struct StripeConfig {
  pub secret_key: String,
  pub base_url: String,
}

impl StripeConfig {
  pub const API_BASE_URL: &'static str = "https://api.stripe.com";
}

/// Stripe hosted checkout, verified by session id when the customer returns.
pub struct StripeGateway {
  config: StripeConfig,
  client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
  id: String,
  url: Option<String>,
  client_reference_id: Option<String>,
  status: Option<String>,
  payment_status: Option<String>,
  payment_intent: Option<String>,
}

impl StripeGateway {
  pub fn new(config: StripeConfig, client: reqwest::Client) -> Self {
    Self { config, client }
  }

  fn endpoint(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }
}

/// The session stored at checkout wins; a returned id must agree with it.
fn session_to_check<'a>(order: &'a Order, returned: Option<&'a str>) -> Result<&'a str, GatewayError> {
  let stored = order.payment_ref_id.as_deref();
  let session_id = match (stored, returned) {
    (Some(stored), Some(returned)) if stored != returned => {
      warn!(session_id = %returned, "Stripe return names another session.");
      return Err(GatewayError::Mismatch(format!(
        "Stripe session {} does not belong to order {}",
        returned, order.id
      )));
    }
    (Some(id), _) | (None, Some(id)) => id,
    (None, None) => return Err(GatewayError::Mismatch("Stripe return is missing session_id".into())),
  };
  let well_formed = session_id.len() > 3
    && session_id.starts_with("cs_")
    && session_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
  if !well_formed {
    return Err(GatewayError::Mismatch(format!("malformed Stripe session id {:?}", session_id)));
  }
  Ok(session_id)
}

#[async_trait]
impl PaymentGateway for StripeGateway {
  fn name(&self) -> &'static str {
    NAME
  }

  #[instrument(name = "Stripe::initiate", skip_all, fields(order_id = %request.order_id), err(Display))]
  async fn initiate(&self, request: &InitiateRequest) -> Result<Initiation, GatewayError> {
    let order_id = request.order_id.to_string();
    let mut params: Vec<(&str, String)> = vec![
      ("mode", "payment".into()),
      ("payment_method_types[0]", "card".into()),
      ("line_items[0][quantity]", "1".into()),
      ("line_items[0][price_data][currency]", "inr".into()),
      ("line_items[0][price_data][unit_amount]", request.amount_paise.to_string()),
      ("line_items[0][price_data][product_data][name]", "Food Order".into()),
      (
        "line_items[0][price_data][product_data][description]",
        format!("Order #{}", &order_id[..8]),
      ),
      (
        "success_url",
        format!(
          "{}?payment_status=success&session_id={{CHECKOUT_SESSION_ID}}",
          request.redirect_target
        ),
      ),
      ("cancel_url", format!("{}?payment_status=cancelled", request.redirect_target)),
      ("client_reference_id", order_id.clone()),
      ("metadata[orderId]", order_id),
      ("metadata[customerName]", request.customer.name.clone()),
      ("metadata[customerPhone]", request.customer.phone.clone()),
    ];
    if let Some(email) = &request.customer.email {
      params.push(("customer_email", email.clone()));
    }

    let response = self
      .client
      .post(self.endpoint("/v1/checkout/sessions"))
      .bearer_auth(&self.config.secret_key)
      .form(&params)
      .send()
      .await
      .map_err(GatewayError::http(NAME))?;
    let session: CheckoutSession = ensure_success(NAME, response)
      .await?
      .json()
      .await
      .map_err(GatewayError::http(NAME))?;

    let url = session
      .url
      .ok_or_else(|| GatewayError::invalid(NAME, "checkout session has no url"))?;
    info!(session_id = %session.id, "Stripe checkout session created.");
    Ok(Initiation::Redirect {
      url,
      gateway_ref: Some(session.id),
    })
  }

  #[instrument(name = "Stripe::verify", skip_all, fields(order_id = %order.id), err(Display))]
  async fn verify(&self, order: &Order, evidence: &VerifyEvidence) -> Result<Verification, GatewayError> {
    let VerifyEvidence::CheckoutSession { session_id, marker } = evidence else {
      return Err(GatewayError::UnsupportedEvidence {
        gateway: NAME,
        evidence: evidence.kind(),
      });
    };

    let session_id = session_to_check(order, session_id.as_deref())?;
    // The return marker is the customer's word only; the session decides.
    if let Some(marker) = marker.as_deref() {
      info!(marker = %marker, "Stripe return marker received.");
    }

    let response = self
      .client
      .get(self.endpoint(&format!("/v1/checkout/sessions/{}", session_id)))
      .bearer_auth(&self.config.secret_key)
      .send()
      .await
      .map_err(GatewayError::http(NAME))?;
    let session: CheckoutSession = ensure_success(NAME, response)
      .await?
      .json()
      .await
      .map_err(GatewayError::http(NAME))?;

    if session.client_reference_id.as_deref() != Some(order.id.to_string().as_str()) {
      return Err(GatewayError::Mismatch(format!(
        "Stripe session {} does not belong to order {}",
        session.id, order.id
      )));
    }

    let external_ref = session.payment_intent.or(Some(session.id));
    Ok(match (session.payment_status.as_deref(), session.status.as_deref()) {
      (Some("paid"), _) => Verification::paid(external_ref),
      (Some("unpaid"), Some("expired")) => Verification::failed(external_ref),
      (Some("unpaid"), _) => Verification::unpaid(),
      _ => Verification::failed(external_ref),
    })
  }
}
