// core/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::store::StoreError;

/// Failures of the step pipeline framework itself, as opposed to failures
/// raised by handlers.
#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Handler missing for required step '{step_name}' in pipeline '{pipeline}'")]
  HandlerMissing { pipeline: &'static str, step_name: String },

  #[error("Internal workflow error: {0}")]
  Internal(String),
}

/// The error every order operation surfaces to its caller.
#[derive(Debug, Error)]
pub enum OrderError {
  #[error("Invalid {field}: {message}")]
  Validation { field: String, message: String },

  #[error("Payment gateway error: {0}")]
  Adapter(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Order store unavailable: {source}")]
  Unavailable {
    #[source]
    source: AnyhowError,
  },

  #[error("Workflow error: {0}")]
  Workflow(#[from] FlowError),
}

impl OrderError {
  pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
    OrderError::Validation {
      field: field.into(),
      message: message.into(),
    }
  }

  /// Whether a retry of the same call could succeed.
  pub fn is_transient(&self) -> bool {
    matches!(self, OrderError::Unavailable { .. })
  }
}

impl From<StoreError> for OrderError {
  fn from(err: StoreError) -> Self {
    match err {
      StoreError::DuplicateId(id) => OrderError::Conflict(format!("order id {} already exists", id)),
      StoreError::Backend(source) => OrderError::Unavailable { source },
    }
  }
}

impl From<GatewayError> for OrderError {
  fn from(err: GatewayError) -> Self {
    OrderError::Adapter(err.to_string())
  }
}

pub type OrderResult<T, E = OrderError> = std::result::Result<T, E>;
