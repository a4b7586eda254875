// storefront/src/errors.rs

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thali_orders::OrderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Unauthorized: {0}")]
  Unauthorized(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Order Error: {source}")]
  Order {
    #[from]
    source: OrderError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

impl ResponseError for AppError {
  fn error_response(&self) -> HttpResponse {
    tracing::error!(application_error = %self, "Responding with error");
    match self {
      AppError::Validation(m) => HttpResponse::BadRequest().json(json!({"error": m})),
      AppError::Unauthorized(m) => HttpResponse::Unauthorized().json(json!({"error": m})),
      AppError::NotFound(m) => HttpResponse::NotFound().json(json!({"error": m})),
      AppError::Config(m) => {
        HttpResponse::InternalServerError().json(json!({"error": "Configuration issue", "detail": m}))
      }
      AppError::Sqlx(_) => HttpResponse::InternalServerError().json(json!({"error": "Database operation failed"})),
      AppError::Order { source } => order_error_response(source),
      AppError::Internal(m) => {
        HttpResponse::InternalServerError().json(json!({"error": "An internal error occurred", "detail": m}))
      }
    }
  }
}

fn order_error_response(err: &OrderError) -> HttpResponse {
  match err {
    OrderError::Validation { field, message } => {
      HttpResponse::BadRequest().json(json!({"error": message, "field": field}))
    }
    OrderError::Adapter(m) => {
      HttpResponse::BadGateway().json(json!({"error": "Payment provider error", "detail": m}))
    }
    OrderError::Conflict(m) => HttpResponse::Conflict().json(json!({"error": m})),
    OrderError::NotFound(m) => HttpResponse::NotFound().json(json!({"error": m})),
    OrderError::Unavailable { .. } => {
      HttpResponse::ServiceUnavailable().json(json!({"error": "Order store is unavailable, please retry"}))
    }
    OrderError::Workflow(source) => {
      tracing::error!(workflow_error = ?source, "Workflow error details");
      HttpResponse::InternalServerError()
        .json(json!({"error": "Workflow processing error", "detail": source.to_string()}))
    }
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
