// core/src/gateway/razorpay.rs

use super::{
  ensure_success, GatewayError, InitiateRequest, Initiation, PaymentGateway, SessionHandle, Verification,
  VerifyEvidence,
};
use crate::order::Order;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::{info, instrument, warn};

type HmacSha256 = Hmac<Sha256>;

const NAME: &str = "razorpay";

#[derive(Debug, Clone)]
pub struct RazorpayConfig {
  pub key_id: String,
  pub key_secret: String,
  pub merchant_name: String,
  pub base_url: String,
}

impl RazorpayConfig {
  pub const API_BASE_URL: &'static str = "https://api.razorpay.com";
}

/// Razorpay embedded checkout: create a gateway order, let the client collect
/// payment, then check the signature it hands back.
pub struct RazorpayGateway {
  config: RazorpayConfig,
  client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RazorpayOrder {
  id: String,
  amount: i64,
  currency: String,
}

impl RazorpayGateway {
  pub fn new(config: RazorpayConfig, client: reqwest::Client) -> Self {
    Self { config, client }
  }

  /// `hex(HMAC-SHA256(key_secret, gateway_order_id + "|" + payment_id))`
  pub fn sign(&self, gateway_order_id: &str, payment_id: &str) -> Result<String, GatewayError> {
    let mut mac = self.mac()?;
    mac.update(format!("{}|{}", gateway_order_id, payment_id).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
  }

  fn signature_matches(&self, gateway_order_id: &str, payment_id: &str, signature: &str) -> Result<bool, GatewayError> {
    let Ok(expected) = hex::decode(signature) else {
      return Ok(false);
    };
    let mut mac = self.mac()?;
    mac.update(format!("{}|{}", gateway_order_id, payment_id).as_bytes());
    Ok(mac.verify_slice(&expected).is_ok())
  }

  fn mac(&self) -> Result<HmacSha256, GatewayError> {
    HmacSha256::new_from_slice(self.config.key_secret.as_bytes())
      .map_err(|e| GatewayError::invalid(NAME, format!("bad key secret: {}", e)))
  }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
  fn name(&self) -> &'static str {
    NAME
  }

  #[instrument(name = "Razorpay::initiate", skip_all, fields(order_id = %request.order_id), err(Display))]
  async fn initiate(&self, request: &InitiateRequest) -> Result<Initiation, GatewayError> {
    let receipt = request.order_id.to_string();
    let body = json!({
      "amount": request.amount_paise,
      "currency": "INR",
      "receipt": receipt,
      "notes": {
        "order_id": receipt,
        "customer_name": request.customer.name,
        "customer_phone": request.customer.phone,
        "customer_email": request.customer.email.clone().unwrap_or_default(),
      },
    });

    let response = self
      .client
      .post(format!("{}/v1/orders", self.config.base_url.trim_end_matches('/')))
      .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
      .json(&body)
      .send()
      .await
      .map_err(GatewayError::http(NAME))?;
    let order: RazorpayOrder = ensure_success(NAME, response)
      .await?
      .json()
      .await
      .map_err(GatewayError::http(NAME))?;

    info!(gateway_order_id = %order.id, "Razorpay order created.");
    Ok(Initiation::Session(SessionHandle {
      gateway_order_id: order.id,
      key_id: self.config.key_id.clone(),
      amount_paise: order.amount,
      currency: order.currency,
      merchant_name: self.config.merchant_name.clone(),
      prefill: request.customer.clone(),
    }))
  }

  #[instrument(name = "Razorpay::verify", skip_all, fields(order_id = %order.id), err(Display))]
  async fn verify(&self, order: &Order, evidence: &VerifyEvidence) -> Result<Verification, GatewayError> {
    let VerifyEvidence::Signature {
      gateway_order_id,
      payment_id,
      signature,
    } = evidence
    else {
      return Err(GatewayError::UnsupportedEvidence {
        gateway: NAME,
        evidence: evidence.kind(),
      });
    };

    // A signature only vouches for its own Razorpay order.
    if order.payment_ref_id.as_deref() != Some(gateway_order_id.as_str()) {
      warn!(gateway_order_id = %gateway_order_id, "Razorpay evidence belongs to another order.");
      return Err(GatewayError::Mismatch(format!(
        "Razorpay order {} does not belong to order {}",
        gateway_order_id, order.id
      )));
    }

    if self.signature_matches(gateway_order_id, payment_id, signature)? {
      Ok(Verification::paid(Some(payment_id.clone())))
    } else {
      warn!(gateway_order_id = %gateway_order_id, "Razorpay signature mismatch.");
      Ok(Verification::failed(Some(payment_id.clone())))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use uuid::Uuid;

  fn gateway() -> RazorpayGateway {
    RazorpayGateway::new(
      RazorpayConfig {
        key_id: "rzp_test_key".into(),
        key_secret: "topsecret".into(),
        merchant_name: "Thali House".into(),
        base_url: "http://localhost".into(),
      },
      reqwest::Client::new(),
    )
  }

  fn order_for(gateway_order_id: &str) -> Order {
    let now = chrono::Utc::now();
    Order {
      id: Uuid::new_v4(),
      status: crate::order::OrderStatus::Initiated,
      payment_method: crate::order::PaymentMethod::Session,
      payment_ref_id: Some(gateway_order_id.into()),
      total_paise: 60000,
      customer_name: "Asha Rao".into(),
      phone: "9876543210".into(),
      delivery_address: "12 MG Road, Pune, MH - 411001".into(),
      notes: None,
      user_id: None,
      created_at: now,
      updated_at: now,
    }
  }

  #[tokio::test]
  async fn valid_signature_is_paid() {
    let gw = gateway();
    let signature = gw.sign("order_abc", "pay_123").unwrap();
    let evidence = VerifyEvidence::Signature {
      gateway_order_id: "order_abc".into(),
      payment_id: "pay_123".into(),
      signature,
    };
    let v = gw.verify(&order_for("order_abc"), &evidence).await.unwrap();
    assert_eq!(v, Verification::paid(Some("pay_123".into())));
  }

  #[tokio::test]
  async fn signature_for_another_razorpay_order_is_a_mismatch() {
    let gw = gateway();
    let signature = gw.sign("order_cheap", "pay_123").unwrap();
    let evidence = VerifyEvidence::Signature {
      gateway_order_id: "order_cheap".into(),
      payment_id: "pay_123".into(),
      signature,
    };
    assert!(matches!(
      gw.verify(&order_for("order_pricey"), &evidence).await,
      Err(GatewayError::Mismatch(_))
    ));
  }

  #[tokio::test]
  async fn tampered_or_garbage_signature_fails() {
    let gw = gateway();
    let signature = gw.sign("order_abc", "pay_123").unwrap();
    for bad in [signature.replace(&signature[..2], "00"), "not-hex".to_string()] {
      let evidence = VerifyEvidence::Signature {
        gateway_order_id: "order_abc".into(),
        payment_id: "pay_999".into(),
        signature: bad,
      };
      let v = gw.verify(&order_for("order_abc"), &evidence).await.unwrap();
      assert_eq!(v.outcome, super::super::PaymentOutcome::Failed);
    }
  }

  #[tokio::test]
  async fn other_evidence_is_unsupported() {
    let evidence = VerifyEvidence::Callback {
      status: None,
      transaction_id: None,
    };
    assert!(matches!(
      gateway().verify(&order_for("order_abc"), &evidence).await,
      Err(GatewayError::UnsupportedEvidence { .. })
    ));
  }
}
