// storefront/src/models/mod.rs

//! Rows as they come out of Postgres.

pub mod menu_item;
pub mod order_row;

pub use menu_item::MenuItem;
pub use order_row::OrderRow;
