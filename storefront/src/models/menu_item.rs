// storefront/src/models/menu_item.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MenuItem {
  pub id: Uuid,
  pub name: String,
  pub description: Option<String>,
  pub price_paise: i64,
  pub image_url: Option<String>,
  pub category: String,
  pub is_veg: bool,
  pub is_popular: bool,
  pub created_at: DateTime<Utc>,
}
