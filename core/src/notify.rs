// core/src/notify.rs

//! Outbound owner notifications. Delivery is best effort: a failed send is
//! logged and never changes an order.

use crate::order::Order;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotice {
  pub to: String,
  pub subject: String,
  pub message_id: String,
}

#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("no recipient configured")]
  NoRecipient,

  #[error("notification channel failed: {0}")]
  Channel(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
  async fn send(&self, to: &str, subject: &str, body: &str) -> Result<SentNotice, NotifyError>;
}

/// Writes notifications to the log instead of a mail service.
#[derive(Debug, Clone)]
pub struct LogNotifier {
  pub sender: String,
}

#[async_trait]
impl Notifier for LogNotifier {
  async fn send(&self, to: &str, subject: &str, body: &str) -> Result<SentNotice, NotifyError> {
    if to.trim().is_empty() {
      return Err(NotifyError::NoRecipient);
    }
    let message_id = format!("log_notice_{}", Uuid::new_v4());
    info!(
      from = %self.sender,
      to,
      subject,
      body_preview = %body.chars().take(80).collect::<String>(),
      message_id = %message_id,
      "Notification written to log."
    );
    Ok(SentNotice {
      to: to.to_string(),
      subject: subject.to_string(),
      message_id,
    })
  }
}

/// Sends and swallows any failure after logging it.
pub async fn send_best_effort(notifier: &dyn Notifier, to: &str, subject: &str, body: &str) -> Option<SentNotice> {
  match notifier.send(to, subject, body).await {
    Ok(notice) => Some(notice),
    Err(e) => {
      warn!(to, subject, error = %e, "Notification not delivered.");
      None
    }
  }
}

pub fn format_rupees(paise: i64) -> String {
  format!("₹{}.{:02}", paise / 100, (paise % 100).abs())
}

pub(crate) fn short_id(id: Uuid) -> String {
  id.simple().to_string()[..8].to_string()
}

/// Subject and HTML body asking the owner to approve a QR payment.
pub fn approval_request(order: &Order, approve_url: &str, reject_url: &str) -> (String, String) {
  let subject = format!("[ACTION REQUIRED] New QR Payment Approval - Order #{}", short_id(order.id));
  let body = format!(
    "<h2>New QR Payment Requires Your Approval</h2>\
     <p>A customer has paid by QR code and is waiting for your approval.</p>\
     <ul>\
     <li><strong>Order ID:</strong> {id}</li>\
     <li><strong>Customer:</strong> {name}</li>\
     <li><strong>Phone:</strong> {phone}</li>\
     <li><strong>Amount:</strong> {amount}</li>\
     <li><strong>Payment Reference ID:</strong> {reference}</li>\
     <li><strong>Delivery Address:</strong> {address}</li>\
     </ul>\
     <p>Check that the payment reached your UPI account before approving.</p>\
     <p><a href=\"{approve}\">Approve Payment</a> | <a href=\"{reject}\">Reject Payment</a></p>",
    id = order.id,
    name = order.customer_name,
    phone = order.phone,
    amount = format_rupees(order.total_paise),
    reference = order.payment_ref_id.as_deref().unwrap_or("N/A"),
    address = order.delivery_address,
    approve = approve_url,
    reject = reject_url,
  );
  (subject, body)
}

/// Subject and body confirming the owner's decision.
pub fn decision_confirmation(order: &Order, approved: bool, reason: Option<&str>) -> (String, String) {
  let verb = if approved { "Approved" } else { "Rejected" };
  let subject = format!("Payment {} for Order #{}", verb, short_id(order.id));
  let mut body = format!(
    "<h2>Payment {verb}</h2>\
     <ul>\
     <li><strong>Order ID:</strong> {id}</li>\
     <li><strong>Amount:</strong> {amount}</li>\
     <li><strong>Payment Reference:</strong> {reference}</li>\
     <li><strong>Delivery Address:</strong> {address}</li>\
     </ul>",
    verb = verb,
    id = order.id,
    amount = format_rupees(order.total_paise),
    reference = order.payment_ref_id.as_deref().unwrap_or("N/A"),
    address = order.delivery_address,
  );
  if let Some(reason) = reason {
    body.push_str(&format!("<p><strong>Reason:</strong> {}</p>", reason));
  }
  (subject, body)
}
