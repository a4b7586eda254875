// storefront/src/web/routes.rs

use actix_web::{web, HttpResponse};

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::handlers::{approval_handlers, checkout_handlers, menu_handlers, order_handlers};

/// Reports the database as well as the process.
async fn health_check_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  sqlx::query("SELECT 1").execute(&app_state.db_pool).await?;
  Ok(HttpResponse::Ok().json(serde_json::json!({
      "status": "ok",
      "site": app_state.config.public_site_url,
      "gateways": app_state.checkout.configured_gateways(),
  })))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/menu")
          .route("", web::get().to(menu_handlers::list_menu_handler))
          .route("/{item_id}", web::get().to(menu_handlers::get_menu_item_handler)),
      )
      .service(
        web::scope("/checkout")
          .route("", web::post().to(checkout_handlers::checkout_handler))
          .route(
            "/{order_id}/session",
            web::post().to(checkout_handlers::complete_session_handler),
          ),
      )
      .service(
        web::scope("/orders")
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route(
            "/{order_id}/reference",
            web::post().to(checkout_handlers::submit_reference_handler),
          )
          .route(
            "/{order_id}/approval",
            web::get().to(order_handlers::await_approval_handler),
          ),
      )
      .service(
        web::scope("/approvals")
          .route("", web::post().to(approval_handlers::decide_approval_handler))
          .route("/{order_id}", web::get().to(approval_handlers::approval_link_handler)),
      ),
  );
}
