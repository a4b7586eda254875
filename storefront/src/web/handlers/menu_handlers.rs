// storefront/src/web/handlers/menu_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::menu::{self, MenuFilter};
use crate::errors::AppError;
use crate::state::AppState;

#[instrument(name = "handler::list_menu", skip(app_state))]
pub async fn list_menu_handler(
  app_state: web::Data<AppState>,
  query: web::Query<MenuFilter>,
) -> Result<HttpResponse, AppError> {
  let filter = query.into_inner();
  let items = menu::list(&app_state.db_pool, &filter).await?;
  let categories = menu::categories(&app_state.db_pool).await?;
  info!(count = items.len(), "Menu listed.");
  Ok(HttpResponse::Ok().json(json!({
      "items": items,
      "categories": categories,
  })))
}

#[instrument(name = "handler::get_menu_item", skip(app_state), fields(item_id = %item_id))]
pub async fn get_menu_item_handler(
  app_state: web::Data<AppState>,
  item_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let item_id = item_id.into_inner();
  match menu::find(&app_state.db_pool, item_id).await? {
    Some(item) => Ok(HttpResponse::Ok().json(item)),
    None => Err(AppError::NotFound(format!("Menu item {} not found", item_id))),
  }
}
