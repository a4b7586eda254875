// storefront/src/web/handlers/mod.rs

pub mod approval_handlers;
pub mod checkout_handlers;
pub mod menu_handlers;
pub mod order_handlers;
