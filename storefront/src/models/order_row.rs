// storefront/src/models/order_row.rs

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use thali_orders::{Order, OrderStatus, PaymentMethod};
use uuid::Uuid;

/// `orders` row with status and method kept as their stored codes.
#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
  pub id: Uuid,
  pub status: String,
  pub payment_method: String,
  pub payment_ref_id: Option<String>,
  pub total_paise: i64,
  pub customer_name: String,
  pub phone: String,
  pub delivery_address: String,
  pub notes: Option<String>,
  pub user_id: Option<Uuid>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
  type Error = anyhow::Error;

  fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
    let status = row
      .status
      .parse::<OrderStatus>()
      .map_err(|e| anyhow!("order {}: {}", row.id, e))?;
    let payment_method = row
      .payment_method
      .parse::<PaymentMethod>()
      .map_err(|e| anyhow!("order {}: {}", row.id, e))?;
    Ok(Order {
      id: row.id,
      status,
      payment_method,
      payment_ref_id: row.payment_ref_id,
      total_paise: row.total_paise,
      customer_name: row.customer_name,
      phone: row.phone,
      delivery_address: row.delivery_address,
      notes: row.notes,
      user_id: row.user_id,
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}
