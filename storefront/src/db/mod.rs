// storefront/src/db/mod.rs

//! Postgres access: the order store behind the order core, and the menu.

pub mod menu;
pub mod orders;

pub use orders::PgOrderStore;

use crate::errors::Result;
use sqlx::PgPool;

const SCHEMA: &str = include_str!("../../migrations/0001_orders_and_menu.sql");

/// Applies the schema. Every statement is `IF NOT EXISTS`, so reruns are safe.
#[tracing::instrument(name = "db::run_migrations", skip(pool), err(Display))]
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
  sqlx::raw_sql(SCHEMA).execute(pool).await?;
  tracing::info!("Database schema is up to date.");
  Ok(())
}
