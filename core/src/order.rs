// core/src/order.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle of an order record.
///
/// `Draft` exists only before the first insert and is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
  Draft,
  Initiated,
  Pending,
  PendingOwnerApproval,
  Completed,
  Rejected,
  Failed,
}

impl OrderStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Draft => "draft",
      OrderStatus::Initiated => "initiated",
      OrderStatus::Pending => "pending",
      OrderStatus::PendingOwnerApproval => "pending_owner_approval",
      OrderStatus::Completed => "completed",
      OrderStatus::Rejected => "rejected",
      OrderStatus::Failed => "failed",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, OrderStatus::Completed | OrderStatus::Rejected | OrderStatus::Failed)
  }

  /// The legal edges of the status graph. Nothing targets `Draft` and
  /// terminal states have no outgoing edges.
  pub fn can_transition_to(&self, next: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
      (self, next),
      (Draft, Initiated)
        | (Draft, Pending)
        | (Pending, PendingOwnerApproval)
        | (Initiated, Completed)
        | (Initiated, Failed)
        | (PendingOwnerApproval, Completed)
        | (PendingOwnerApproval, Rejected)
    )
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "draft" => Ok(OrderStatus::Draft),
      "initiated" => Ok(OrderStatus::Initiated),
      "pending" => Ok(OrderStatus::Pending),
      "pending_owner_approval" => Ok(OrderStatus::PendingOwnerApproval),
      "completed" => Ok(OrderStatus::Completed),
      "rejected" => Ok(OrderStatus::Rejected),
      "failed" => Ok(OrderStatus::Failed),
      other => Err(format!("unknown order status '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedirectGateway {
  PhonePe,
  Stripe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QrVariant {
  /// Any UPI app, paying the shop's VPA.
  Generic,
  /// The owner's personal QR shown at the counter.
  Owner,
}

/// How the customer chose to pay. Stored as its short code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PaymentMethod {
  Cod,
  Redirect(RedirectGateway),
  /// Embedded Razorpay checkout.
  Session,
  ManualQr(QrVariant),
}

impl PaymentMethod {
  pub const ALL: [PaymentMethod; 6] = [
    PaymentMethod::Cod,
    PaymentMethod::Redirect(RedirectGateway::PhonePe),
    PaymentMethod::Redirect(RedirectGateway::Stripe),
    PaymentMethod::Session,
    PaymentMethod::ManualQr(QrVariant::Generic),
    PaymentMethod::ManualQr(QrVariant::Owner),
  ];

  pub fn code(&self) -> &'static str {
    match self {
      PaymentMethod::Cod => "cod",
      PaymentMethod::Redirect(RedirectGateway::PhonePe) => "phonepe",
      PaymentMethod::Redirect(RedirectGateway::Stripe) => "stripe",
      PaymentMethod::Session => "razorpay",
      PaymentMethod::ManualQr(QrVariant::Generic) => "qr_generic",
      PaymentMethod::ManualQr(QrVariant::Owner) => "qr_owner",
    }
  }

  /// Status written by the first insert for this method.
  pub fn entry_status(&self) -> OrderStatus {
    match self {
      PaymentMethod::Redirect(_) | PaymentMethod::Session => OrderStatus::Initiated,
      PaymentMethod::Cod | PaymentMethod::ManualQr(_) => OrderStatus::Pending,
    }
  }

  pub fn is_gateway(&self) -> bool {
    matches!(self, PaymentMethod::Redirect(_) | PaymentMethod::Session)
  }

  pub fn is_manual_qr(&self) -> bool {
    matches!(self, PaymentMethod::ManualQr(_))
  }
}

impl fmt::Display for PaymentMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.code())
  }
}

impl FromStr for PaymentMethod {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    PaymentMethod::ALL
      .into_iter()
      .find(|m| m.code() == s)
      .ok_or_else(|| format!("unknown payment method '{}'", s))
  }
}

impl TryFrom<String> for PaymentMethod {
  type Error = String;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<PaymentMethod> for String {
  fn from(value: PaymentMethod) -> Self {
    value.code().to_string()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
  pub id: Uuid,
  pub status: OrderStatus,
  pub payment_method: PaymentMethod,
  pub payment_ref_id: Option<String>,
  pub total_paise: i64,
  pub customer_name: String,
  pub phone: String,
  pub delivery_address: String,
  pub notes: Option<String>,
  pub user_id: Option<Uuid>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Fields a transition may write besides `status` and `updated_at`.
/// `total_paise` is deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPatch {
  pub payment_ref_id: Option<String>,
}

impl OrderPatch {
  pub fn with_reference(reference: impl Into<String>) -> Self {
    Self {
      payment_ref_id: Some(reference.into()),
    }
  }

  pub fn apply(&self, order: &mut Order) {
    if let Some(reference) = &self.payment_ref_id {
      order.payment_ref_id = Some(reference.clone());
    }
  }
}
