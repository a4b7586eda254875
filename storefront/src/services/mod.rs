// storefront/src/services/mod.rs

pub mod order_core;
