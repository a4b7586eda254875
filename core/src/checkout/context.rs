// core/src/checkout/context.rs

use super::{AddressForm, CheckoutOutcome};
use crate::cart::{CartLine, CartService};
use crate::order::{Order, PaymentMethod};
use std::sync::Arc;
use uuid::Uuid;

/// State shared by the checkout steps of one request.
pub struct CheckoutCtx {
  pub cart: Arc<dyn CartService>,
  pub method: PaymentMethod,
  pub address: AddressForm,
  pub customer_email: Option<String>,
  pub inline_reference: Option<String>,
  pub i_have_paid: bool,
  pub user_id: Option<Uuid>,

  pub lines: Vec<CartLine>,
  pub subtotal_paise: i64,
  pub total_paise: i64,
  pub order_id: Option<Uuid>,
  pub order: Option<Order>,
  /// Set once a manual-QR reference has been submitted during checkout.
  pub reference_submitted: bool,
  pub outcome: Option<CheckoutOutcome>,
}

impl CheckoutCtx {
  pub fn new(cart: Arc<dyn CartService>, request: super::CheckoutRequest, user_id: Option<Uuid>) -> Self {
    Self {
      cart,
      method: request.method,
      address: request.address,
      customer_email: request.customer_email,
      inline_reference: request.reference,
      i_have_paid: request.i_have_paid,
      user_id,
      lines: Vec::new(),
      subtotal_paise: 0,
      total_paise: 0,
      order_id: None,
      order: None,
      reference_submitted: false,
      outcome: None,
    }
  }
}
