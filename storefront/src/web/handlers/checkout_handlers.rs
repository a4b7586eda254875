// storefront/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thali_orders::{CartLine, CartService, CheckoutOutcome, CheckoutRequest, VerifyEvidence};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::session::{OptionalUser, RequestCart};

#[derive(Deserialize, Debug)]
pub struct CheckoutPayload {
  #[serde(default)]
  pub items: Vec<CartLine>,
  #[serde(flatten)]
  pub request: CheckoutRequest,
}

/// Razorpay's `handler` callback fields, as the client receives them.
#[derive(Deserialize, Debug)]
pub struct SessionCompletionPayload {
  pub razorpay_order_id: String,
  pub razorpay_payment_id: String,
  pub razorpay_signature: String,
}

#[derive(Deserialize, Debug)]
pub struct ReferencePayload {
  #[serde(default)]
  pub reference: Option<String>,
  #[serde(default)]
  pub i_have_paid: bool,
}

fn outcome_response(outcome: &CheckoutOutcome, cart: &RequestCart) -> HttpResponse {
  HttpResponse::Ok().json(json!({
      "outcome": outcome,
      "clear_cart": cart.was_cleared(),
  }))
}

#[instrument(
    name = "handler::checkout",
    skip(app_state, payload, user),
    fields(method = %payload.request.method, lines = payload.items.len())
)]
pub async fn checkout_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CheckoutPayload>,
  user: OptionalUser,
) -> Result<HttpResponse, AppError> {
  let CheckoutPayload { items, request } = payload.into_inner();
  let cart = Arc::new(RequestCart::new(items));
  let cart_service: Arc<dyn CartService> = cart.clone();

  let outcome = app_state.checkout.checkout(cart_service, &user.identity(), request).await?;
  info!(order_id = ?outcome.order_id(), "Checkout finished.");
  Ok(outcome_response(&outcome, &cart))
}

#[instrument(name = "handler::complete_session", skip(app_state, payload), fields(order_id = %order_id))]
pub async fn complete_session_handler(
  app_state: web::Data<AppState>,
  order_id: web::Path<Uuid>,
  payload: web::Json<SessionCompletionPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let evidence = VerifyEvidence::Signature {
    gateway_order_id: payload.razorpay_order_id,
    payment_id: payload.razorpay_payment_id,
    signature: payload.razorpay_signature,
  };
  let cart = RequestCart::default();
  let outcome = app_state.checkout.complete_session(order_id.into_inner(), evidence, &cart).await?;
  Ok(outcome_response(&outcome, &cart))
}

#[instrument(name = "handler::submit_reference", skip(app_state, payload), fields(order_id = %order_id))]
pub async fn submit_reference_handler(
  app_state: web::Data<AppState>,
  order_id: web::Path<Uuid>,
  payload: web::Json<ReferencePayload>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let cart = RequestCart::default();
  let outcome = app_state
    .checkout
    .submit_manual_payment(order_id.into_inner(), payload.reference.as_deref(), payload.i_have_paid, &cart)
    .await?;
  Ok(outcome_response(&outcome, &cart))
}
