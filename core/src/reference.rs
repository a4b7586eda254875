// core/src/reference.rs

//! Payment reference format rules.

use crate::error::{OrderError, OrderResult};
use uuid::Uuid;

pub const MIN_REFERENCE_LEN: usize = 6;
const AUTO_PREFIX: &str = "AUTO";

/// Trims and checks a customer supplied reference: ASCII alphanumeric and at
/// least [`MIN_REFERENCE_LEN`] characters. Returns the trimmed value.
pub fn validate_reference(raw: &str) -> OrderResult<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(OrderError::validation("reference", "payment reference is required"));
  }
  if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
    return Err(OrderError::validation(
      "reference",
      "payment reference may only contain letters and digits",
    ));
  }
  if trimmed.len() < MIN_REFERENCE_LEN {
    return Err(OrderError::validation(
      "reference",
      format!("payment reference must be at least {} characters", MIN_REFERENCE_LEN),
    ));
  }
  Ok(trimmed.to_string())
}

/// Reference used when the customer asserts payment without typing one:
/// `AUTO` followed by eight upper-case alphanumerics.
pub fn generate_reference() -> String {
  let suffix: String = Uuid::new_v4()
    .simple()
    .to_string()
    .chars()
    .take(8)
    .collect::<String>()
    .to_ascii_uppercase();
  format!("{}{}", AUTO_PREFIX, suffix)
}
