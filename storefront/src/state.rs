// storefront/src/state.rs
use crate::config::AppConfig;
use sqlx::PgPool;
use std::sync::Arc;
use thali_orders::{ApprovalLinks, CheckoutOrchestrator, OrderTracker, OwnerApprovalHandler};

#[derive(Clone)]
pub struct AppState {
  pub db_pool: PgPool,
  pub config: Arc<AppConfig>,
  pub checkout: Arc<CheckoutOrchestrator>,
  pub tracker: Arc<OrderTracker>,
  pub approvals: Arc<OwnerApprovalHandler>,
  pub links: ApprovalLinks,
}
