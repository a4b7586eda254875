// core/src/cart.rs

use crate::error::{OrderError, OrderResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One line of the client-held cart. Read only for the order core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
  pub product_id: String,
  pub name: String,
  pub unit_price_paise: i64,
  pub quantity: u32,
  #[serde(default)]
  pub veg: bool,
  #[serde(default)]
  pub category: String,
}

impl CartLine {
  pub fn line_total(&self) -> i64 {
    self.unit_price_paise * i64::from(self.quantity)
  }
}

/// Sums the cart, rejecting zero quantities and negative prices.
pub fn subtotal(lines: &[CartLine]) -> OrderResult<i64> {
  lines.iter().try_fold(0i64, |acc, line| {
    if line.quantity == 0 {
      return Err(OrderError::validation(
        "cart",
        format!("'{}' has a quantity of zero", line.name),
      ));
    }
    if line.unit_price_paise < 0 {
      return Err(OrderError::validation(
        "cart",
        format!("'{}' has a negative price", line.name),
      ));
    }
    acc
      .checked_add(line.line_total())
      .ok_or_else(|| OrderError::validation("cart", "cart total is out of range"))
  })
}

/// Access to the caller's cart. Implementations decide where the cart lives
/// (browser storage, a session, a request body).
#[async_trait]
pub trait CartService: Send + Sync {
  async fn lines(&self) -> Vec<CartLine>;
  async fn clear(&self);
}

/// Cart held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryCart {
  lines: Mutex<Vec<CartLine>>,
}

impl InMemoryCart {
  pub fn new(lines: Vec<CartLine>) -> Self {
    Self { lines: Mutex::new(lines) }
  }

  pub fn is_empty(&self) -> bool {
    self.lines.lock().is_empty()
  }
}

#[async_trait]
impl CartService for InMemoryCart {
  async fn lines(&self) -> Vec<CartLine> {
    self.lines.lock().clone()
  }

  async fn clear(&self) {
    self.lines.lock().clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn line(price: i64, qty: u32) -> CartLine {
    CartLine {
      product_id: "p1".into(),
      name: "Paneer Tikka".into(),
      unit_price_paise: price,
      quantity: qty,
      veg: true,
      category: "starters".into(),
    }
  }

  #[test]
  fn subtotal_sums_lines() {
    assert_eq!(subtotal(&[line(28000, 2)]).unwrap(), 56000);
    assert_eq!(subtotal(&[]).unwrap(), 0);
  }

  #[test]
  fn subtotal_rejects_bad_lines() {
    assert!(matches!(subtotal(&[line(100, 0)]), Err(OrderError::Validation { .. })));
    assert!(subtotal(&[line(-1, 1)]).is_err());
  }

  #[tokio::test]
  async fn in_memory_cart_clears() {
    let cart = InMemoryCart::new(vec![line(100, 1)]);
    assert_eq!(cart.lines().await.len(), 1);
    cart.clear().await;
    assert!(cart.is_empty());
  }
}
