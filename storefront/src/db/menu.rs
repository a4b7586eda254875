// storefront/src/db/menu.rs

use crate::errors::Result;
use crate::models::MenuItem;
use sqlx::PgPool;
use uuid::Uuid;

const MENU_COLUMNS: &str = "id, name, description, price_paise, image_url, category, is_veg, is_popular, created_at";

/// Filters for the menu page. Empty fields match everything.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct MenuFilter {
  pub category: Option<String>,
  /// Case-insensitive match on name or description.
  pub q: Option<String>,
  pub veg: Option<bool>,
  pub popular: Option<bool>,
}

impl MenuFilter {
  fn category(&self) -> Option<&str> {
    self
      .category
      .as_deref()
      .map(str::trim)
      .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
  }

  fn search_pattern(&self) -> Option<String> {
    self
      .q
      .as_deref()
      .map(str::trim)
      .filter(|q| !q.is_empty())
      .map(|q| format!("%{}%", q.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")))
  }
}

#[tracing::instrument(name = "db::menu::list", skip(pool), err(Display))]
pub async fn list(pool: &PgPool, filter: &MenuFilter) -> Result<Vec<MenuItem>> {
  let items = sqlx::query_as::<_, MenuItem>(&format!(
    "SELECT {} FROM menu_items \
     WHERE ($1::TEXT IS NULL OR category = $1) \
       AND ($2::TEXT IS NULL OR name ILIKE $2 OR description ILIKE $2) \
       AND ($3::BOOLEAN IS NULL OR is_veg = $3) \
       AND ($4::BOOLEAN IS NULL OR is_popular = $4) \
     ORDER BY category, name",
    MENU_COLUMNS
  ))
  .bind(filter.category())
  .bind(filter.search_pattern())
  .bind(filter.veg)
  .bind(filter.popular)
  .fetch_all(pool)
  .await?;
  Ok(items)
}

pub async fn categories(pool: &PgPool) -> Result<Vec<String>> {
  let rows: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT category FROM menu_items ORDER BY category")
    .fetch_all(pool)
    .await?;
  Ok(rows.into_iter().map(|(c,)| c).collect())
}

pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<MenuItem>> {
  let item = sqlx::query_as::<_, MenuItem>(&format!("SELECT {} FROM menu_items WHERE id = $1", MENU_COLUMNS))
    .bind(id)
    .fetch_optional(pool)
    .await?;
  Ok(item)
}

struct SeedItem {
  name: &'static str,
  description: &'static str,
  price_paise: i64,
  image_url: &'static str,
  category: &'static str,
  is_veg: bool,
  is_popular: bool,
}

const fn item(
  name: &'static str,
  description: &'static str,
  rupees: i64,
  image_url: &'static str,
  category: &'static str,
  is_veg: bool,
  is_popular: bool,
) -> SeedItem {
  SeedItem {
    name,
    description,
    price_paise: rupees * 100,
    image_url,
    category,
    is_veg,
    is_popular,
  }
}

const DEFAULT_MENU: &[SeedItem] = &[
  item("Gujarati Thali", "A complete meal with dal, kadhi, rotis, rice, vegetables and sweet dish", 299, "/images/gujarati-thali.jpg", "thali", true, true),
  item("Punjabi Thali", "Rich and flavorful thali with butter chicken, dal makhani, naan, pulao and more", 349, "/images/punjabi-thali.jpg", "thali", false, true),
  item("South Indian Thali", "A delicious assortment of sambhar, rasam, rice, vegetables and payasam", 279, "/images/south-indian-thali.jpg", "thali", true, false),
  item("Bengali Thali", "Authentic Bengali dishes including fish curry, luchi, cholar dal and mishti doi", 329, "/images/bengali-thali.jpg", "thali", false, false),
  item("Rajasthani Thali", "Traditional Rajasthani dishes with dal baati churma, gatte ki sabzi, and more", 319, "/images/rajasthani-thali.jpg", "thali", true, true),
  item("Butter Chicken", "Tender chicken in a rich and creamy tomato-based sauce", 249, "/images/butter-chicken.jpg", "main", false, true),
  item("Paneer Tikka", "Chunks of paneer marinated in spices and grilled to perfection", 199, "/images/paneer-tikka.jpg", "main", true, true),
  item("Dal Makhani", "Black lentils cooked with butter and cream", 149, "/images/dal-makhani.jpg", "main", true, false),
  item("Masala Dosa", "Crispy rice pancake filled with spiced potatoes", 129, "/images/masala-dosa.jpg", "breakfast", true, true),
  item("Pav Bhaji", "Spiced vegetable mash served with butter-toasted rolls", 99, "/images/pav-bhaji.jpg", "breakfast", true, false),
  item("Gulab Jamun", "Soft milk solids balls soaked in rose scented syrup", 69, "/images/gulab-jamun.jpg", "dessert", true, true),
  item("Rasgulla", "Soft and spongy cottage cheese balls in sugar syrup", 69, "/images/rasgulla.jpg", "dessert", true, false),
];

/// Upserts the default menu by name.
#[tracing::instrument(name = "db::menu::seed", skip(pool), err(Display))]
pub async fn seed_default_menu(pool: &PgPool) -> Result<u64> {
  let mut tx = pool.begin().await?;
  let mut written = 0;
  for seed in DEFAULT_MENU {
    let result = sqlx::query(
      "INSERT INTO menu_items (name, description, price_paise, image_url, category, is_veg, is_popular) \
       VALUES ($1, $2, $3, $4, $5, $6, $7) \
       ON CONFLICT (name) DO UPDATE SET description = EXCLUDED.description, price_paise = EXCLUDED.price_paise, \
       image_url = EXCLUDED.image_url, category = EXCLUDED.category, is_veg = EXCLUDED.is_veg, \
       is_popular = EXCLUDED.is_popular",
    )
    .bind(seed.name)
    .bind(seed.description)
    .bind(seed.price_paise)
    .bind(seed.image_url)
    .bind(seed.category)
    .bind(seed.is_veg)
    .bind(seed.is_popular)
    .execute(&mut *tx)
    .await?;
    written += result.rows_affected();
  }
  tx.commit().await?;
  tracing::info!(items = written, "Default menu seeded.");
  Ok(written)
}
