// storefront/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thali_orders::{PollState, ReturnMarker};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

const DEFAULT_WAIT: Duration = Duration::from_secs(25);
const MAX_WAIT: Duration = Duration::from_secs(60);

/// GET /orders/{id}, optionally carrying the query a gateway appended on return.
#[instrument(name = "handler::get_order", skip(app_state, marker), fields(order_id = %order_id))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  order_id: web::Path<Uuid>,
  marker: web::Query<ReturnMarker>,
) -> Result<HttpResponse, AppError> {
  let marker = marker.into_inner();
  let marker = (marker != ReturnMarker::default()).then_some(marker);
  let view = app_state.tracker.view(order_id.into_inner(), marker.as_ref()).await?;
  Ok(HttpResponse::Ok().json(view))
}

#[derive(Deserialize, Debug)]
pub struct WaitQuery {
  pub timeout_secs: Option<u64>,
}

/// Long poll: holds the request while the order awaits owner approval, up to
/// the requested timeout, then answers with the latest view.
#[instrument(name = "handler::await_approval", skip(app_state, query), fields(order_id = %order_id))]
pub async fn await_approval_handler(
  app_state: web::Data<AppState>,
  order_id: web::Path<Uuid>,
  query: web::Query<WaitQuery>,
) -> Result<HttpResponse, AppError> {
  let order_id = order_id.into_inner();
  let view = app_state.tracker.refresh(order_id).await?;
  if !view.awaiting_approval {
    return Ok(HttpResponse::Ok().json(json!({ "state": PollState::Settled(view.order.status), "view": view })));
  }

  let wait = query.timeout_secs.map(Duration::from_secs).unwrap_or(DEFAULT_WAIT).min(MAX_WAIT);
  let mut handle = app_state.tracker.watch_approval(order_id, None);
  let state = tokio::time::timeout(wait, handle.finished())
    .await
    .unwrap_or(PollState::Waiting);
  handle.cancel();
  info!(?state, "Approval wait finished.");

  let view = app_state.tracker.refresh(order_id).await?;
  Ok(HttpResponse::Ok().json(json!({ "state": state, "view": view })))
}
