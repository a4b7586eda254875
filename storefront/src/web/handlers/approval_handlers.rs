// storefront/src/web/handlers/approval_handlers.rs

use actix_web::http::header::ContentType;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use thali_orders::{ApprovalRequest, OrderError};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

/// Body of the owner dashboard's decision: the decision itself plus the
/// order's approval token, the same one the mailed links carry.
#[derive(Deserialize, Debug)]
pub struct ApprovalDecisionPayload {
  #[serde(flatten)]
  pub request: ApprovalRequest,
  #[serde(default)]
  pub token: Option<String>,
}

/// JSON endpoint for the owner dashboard.
#[instrument(
    name = "handler::decide_approval",
    skip(app_state, payload),
    fields(order_id = %payload.request.order_id, approved = payload.request.approved)
)]
pub async fn decide_approval_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<ApprovalDecisionPayload>,
) -> Result<HttpResponse, AppError> {
  let ApprovalDecisionPayload { request, token } = payload.into_inner();
  let authorized = token
    .as_deref()
    .is_some_and(|token| app_state.links.verify(request.order_id, token));
  if !authorized {
    warn!("Approval decision without a valid token.");
    return Err(AppError::Unauthorized("a valid approval token is required".to_string()));
  }

  let receipt = app_state.approvals.decide(request).await?;
  Ok(HttpResponse::Ok().json(json!({
      "success": true,
      "order": receipt.order,
      "message": receipt.message,
  })))
}

#[derive(Deserialize, Debug)]
pub struct ApprovalLinkQuery {
  pub action: String,
  pub token: String,
  #[serde(rename = "refId")]
  pub ref_id: Option<String>,
  pub reason: Option<String>,
}

/// Target of the approve/reject links in the owner's e-mail. Answers a small
/// HTML page instead of JSON.
#[instrument(name = "handler::approval_link", skip(app_state, query), fields(order_id = %order_id, action = %query.action))]
pub async fn approval_link_handler(
  app_state: web::Data<AppState>,
  order_id: web::Path<Uuid>,
  query: web::Query<ApprovalLinkQuery>,
) -> HttpResponse {
  let order_id = order_id.into_inner();
  let query = query.into_inner();

  if !app_state.links.verify(order_id, &query.token) {
    warn!("Approval link carried an invalid token.");
    return page(actix_web::http::StatusCode::UNAUTHORIZED, "Link not valid", "This approval link is not valid.");
  }
  let approved = match query.action.as_str() {
    "approve" => true,
    "reject" => false,
    _ => {
      return page(
        actix_web::http::StatusCode::BAD_REQUEST,
        "Unknown action",
        "The link must either approve or reject the payment.",
      )
    }
  };

  let request = ApprovalRequest {
    order_id,
    approved,
    reference: query.ref_id.filter(|r| !r.trim().is_empty()),
    rejection_reason: query.reason,
  };
  match app_state.approvals.decide(request).await {
    Ok(receipt) => page(actix_web::http::StatusCode::OK, "Done", &receipt.message),
    Err(e) => {
      let status = match &e {
        OrderError::Validation { .. } => actix_web::http::StatusCode::BAD_REQUEST,
        OrderError::Conflict(_) => actix_web::http::StatusCode::CONFLICT,
        OrderError::NotFound(_) => actix_web::http::StatusCode::NOT_FOUND,
        _ => actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
      };
      warn!(error = %e, "Approval link could not be applied.");
      page(status, "Could not update order", &e.to_string())
    }
  }
}

fn escape(text: &str) -> String {
  text
    .replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
}

fn page(status: actix_web::http::StatusCode, title: &str, message: &str) -> HttpResponse {
  let body = format!(
    "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
     <body style=\"font-family:sans-serif;max-width:32rem;margin:3rem auto\"><h1>{title}</h1><p>{message}</p></body></html>",
    title = escape(title),
    message = escape(message)
  );
  HttpResponse::build(status).content_type(ContentType::html()).body(body)
}
