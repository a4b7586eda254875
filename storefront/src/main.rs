// storefront/src/main.rs

mod config;
mod db;
mod errors;
mod models;
mod services;
mod state;
mod web;

use crate::config::AppConfig;
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_span_events(FmtSpan::CLOSE)
    .init();

  tracing::info!("Starting Thali storefront server...");

  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
    }
  };

  let db_pool = match PgPoolOptions::new().max_connections(10).connect(&app_config.database_url).await {
    Ok(pool) => {
      tracing::info!("Successfully connected to the database.");
      pool
    }
    Err(e) => {
      tracing::error!(error = %e, "Failed to connect to the database.");
      return Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e.to_string()));
    }
  };

  if app_config.run_migrations {
    if let Err(e) = db::run_migrations(&db_pool).await {
      tracing::error!(error = %e, "Failed to apply database schema.");
      return Err(std::io::Error::other(e.to_string()));
    }
  }

  if app_config.seed_db {
    if let Err(e) = db::menu::seed_default_menu(&db_pool).await {
      tracing::error!(error = %e, "Failed to seed the menu.");
    }
  }

  let core = match services::order_core::build(&app_config, db_pool.clone()) {
    Ok(core) => core,
    Err(e) => {
      tracing::error!(error = %e, "Failed to build the order core.");
      return Err(std::io::Error::other(e.to_string()));
    }
  };

  let app_state = AppState {
    db_pool,
    config: app_config.clone(),
    checkout: core.checkout,
    tracker: core.tracker,
    approvals: core.approvals,
    links: core.links,
  };

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .app_data(actix_data::JsonConfig::default().error_handler(|err, _req| {
        errors::AppError::Validation(format!("Malformed request body: {}", err)).into()
      }))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
