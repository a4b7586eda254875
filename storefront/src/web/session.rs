// storefront/src/web/session.rs

//! Per-request stand-ins for the browser-held cart and the signed-in user.

use actix_web::{FromRequest, HttpRequest};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use thali_orders::{CartLine, CartService, StaticIdentity};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;

/// The cart the client sent with the request. The browser owns the real cart,
/// so `clear` only records that the client should empty it.
#[derive(Debug, Default)]
pub struct RequestCart {
  lines: Vec<CartLine>,
  cleared: AtomicBool,
}

impl RequestCart {
  pub fn new(lines: Vec<CartLine>) -> Self {
    Self {
      lines,
      cleared: AtomicBool::new(false),
    }
  }

  pub fn was_cleared(&self) -> bool {
    self.cleared.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl CartService for RequestCart {
  async fn lines(&self) -> Vec<CartLine> {
    self.lines.clone()
  }

  async fn clear(&self) {
    self.cleared.store(true, Ordering::SeqCst);
  }
}

/// Signed-in user from the `X-User-ID` header. Absent means guest; a header
/// that is not a UUID is rejected.
#[derive(Debug, Clone, Copy)]
pub struct OptionalUser(pub Option<Uuid>);

impl OptionalUser {
  pub fn identity(&self) -> StaticIdentity {
    match self.0 {
      Some(user_id) => StaticIdentity::user(user_id),
      None => StaticIdentity::guest(),
    }
  }
}

impl FromRequest for OptionalUser {
  type Error = AppError;
  type Future = futures_util::future::Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    let Some(header) = req.headers().get("X-User-ID") else {
      return futures_util::future::ready(Ok(OptionalUser(None)));
    };
    match header.to_str().ok().and_then(|raw| Uuid::parse_str(raw.trim()).ok()) {
      Some(user_id) => futures_util::future::ready(Ok(OptionalUser(Some(user_id)))),
      None => {
        warn!("OptionalUser extractor: X-User-ID header is not a UUID.");
        futures_util::future::ready(Err(AppError::Unauthorized("X-User-ID header is not a valid user id".to_string())))
      }
    }
  }
}
