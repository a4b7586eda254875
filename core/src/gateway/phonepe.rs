// core/src/gateway/phonepe.rs

use super::{
  ensure_success, GatewayError, InitiateRequest, Initiation, PaymentGateway, Verification, VerifyEvidence,
};
use crate::order::Order;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use uuid::Uuid;

const NAME: &str = "phonepe";
const PAY_PATH: &str = "/pg/v1/pay";

#[derive(Debug, Clone)]
pub struct PhonePeConfig {
  pub merchant_id: String,
  pub salt_key: String,
  pub salt_index: String,
  pub base_url: String,
}

impl PhonePeConfig {
  pub const PRODUCTION_BASE_URL: &'static str = "https://api.phonepe.com/apis/hermes";
}

/// PhonePe PG pay page: redirect the customer, then poll the status API.
pub struct PhonePeGateway {
  config: PhonePeConfig,
  client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct PayResponse {
  data: Option<PayData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayData {
  instrument_response: Option<InstrumentResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentResponse {
  redirect_info: Option<RedirectInfo>,
}

#[derive(Debug, Deserialize)]
struct RedirectInfo {
  url: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
  code: String,
  data: Option<StatusData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusData {
  transaction_id: Option<String>,
}

impl PhonePeGateway {
  pub fn new(config: PhonePeConfig, client: reqwest::Client) -> Self {
    Self { config, client }
  }

  /// `sha256hex(payload + salt_key) + "###" + salt_index`
  pub fn checksum(&self, payload: &str) -> String {
    let digest = Sha256::digest(format!("{}{}", payload, self.config.salt_key).as_bytes());
    format!("{}###{}", hex::encode(digest), self.config.salt_index)
  }

  /// Merchant transaction id for an order: its UUID without dashes.
  pub fn transaction_id(order_id: Uuid) -> String {
    order_id.simple().to_string()
  }

  fn endpoint(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }
}

#[async_trait]
impl PaymentGateway for PhonePeGateway {
  fn name(&self) -> &'static str {
    NAME
  }

  #[instrument(name = "PhonePe::initiate", skip_all, fields(order_id = %request.order_id), err(Display))]
  async fn initiate(&self, request: &InitiateRequest) -> Result<Initiation, GatewayError> {
    let txn_id = Self::transaction_id(request.order_id);
    let return_url = format!("{}?transactionId={}", request.redirect_target, txn_id);
    let payload = json!({
      "merchantId": self.config.merchant_id,
      "merchantTransactionId": txn_id,
      "merchantUserId": format!("MU{}", &txn_id[..12]),
      "amount": request.amount_paise,
      "redirectUrl": return_url,
      "redirectMode": "REDIRECT",
      "callbackUrl": return_url,
      "mobileNumber": request.customer.phone,
      "paymentInstrument": { "type": "PAY_PAGE" },
    });
    let encoded = STANDARD.encode(payload.to_string());
    let x_verify = self.checksum(&format!("{}{}", encoded, PAY_PATH));

    let response = self
      .client
      .post(self.endpoint(PAY_PATH))
      .header("X-VERIFY", x_verify)
      .json(&json!({ "request": encoded }))
      .send()
      .await
      .map_err(GatewayError::http(NAME))?;
    let body: PayResponse = ensure_success(NAME, response)
      .await?
      .json()
      .await
      .map_err(GatewayError::http(NAME))?;

    let url = body
      .data
      .and_then(|d| d.instrument_response)
      .and_then(|i| i.redirect_info)
      .map(|r| r.url)
      .ok_or_else(|| GatewayError::invalid(NAME, "missing redirect url"))?;

    info!(transaction_id = %txn_id, "PhonePe pay page created.");
    Ok(Initiation::Redirect {
      url,
      gateway_ref: Some(txn_id),
    })
  }

  #[instrument(name = "PhonePe::verify", skip_all, fields(order_id = %order.id), err(Display))]
  async fn verify(&self, order: &Order, evidence: &VerifyEvidence) -> Result<Verification, GatewayError> {
    let VerifyEvidence::Callback { status, transaction_id } = evidence else {
      return Err(GatewayError::UnsupportedEvidence {
        gateway: NAME,
        evidence: evidence.kind(),
      });
    };

    let txn_id = Self::transaction_id(order.id);
    if let Some(returned) = transaction_id.as_deref() {
      if returned != txn_id {
        warn!(transaction_id = %returned, "PhonePe return names another transaction.");
        return Err(GatewayError::Mismatch(format!(
          "PhonePe transaction {} does not belong to order {}",
          returned, order.id
        )));
      }
    }
    // The return marker is the customer's word only; the status API decides.
    if let Some(marker) = status.as_deref() {
      info!(marker = %marker, "PhonePe return marker received.");
    }

    let path = format!("/pg/v1/status/{}/{}", self.config.merchant_id, txn_id);
    let response = self
      .client
      .get(self.endpoint(&path))
      .header("X-VERIFY", self.checksum(&path))
      .header("X-MERCHANT-ID", &self.config.merchant_id)
      .send()
      .await
      .map_err(GatewayError::http(NAME))?;
    let body: StatusResponse = ensure_success(NAME, response)
      .await?
      .json()
      .await
      .map_err(GatewayError::http(NAME))?;

    let external_ref = body
      .data
      .and_then(|d| d.transaction_id)
      .or(Some(txn_id));
    info!(code = %body.code, "PhonePe status checked.");
    Ok(match body.code.as_str() {
      "PAYMENT_SUCCESS" => Verification::paid(external_ref),
      "PAYMENT_PENDING" => Verification::unpaid(),
      _ => Verification::failed(external_ref),
    })
  }
}
