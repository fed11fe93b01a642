//! Retail inventory / point-of-sale API server: inventory CRUD with
//! photo attachments, AI listing suggestions, a camera relay for
//! phone-captured stills, and an in-memory POS cart.

pub mod analysis;
pub mod capture;
pub mod cart;
pub mod db;
pub mod form;
pub mod handlers;
pub mod media;
pub mod models;
pub mod storage;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, patch, post, put},
    Router,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::warn;

use analysis::VisionModel;
use capture::CameraSessions;
use cart::CartStore;
use db::DbPool;
use form::DraftSessions;
use handlers::{error_response, ErrorResponse};
use models::CategoryPath;
use storage::MediaStore;

// ========================================
// Configuration
// ========================================

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub db_path: String,
    pub public_base_url: String,
    pub ai_base_url: String,
    pub ai_model: String,
    /// Absent key does not block startup; every analysis call fails.
    pub ai_api_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let data_dir =
            PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()));
        let db_path = std::env::var("DB_PATH")
            .unwrap_or_else(|_| data_dir.join("inventory.db").to_string_lossy().to_string());
        let ai_api_key = std::env::var("TOGETHER_API_KEY").ok().filter(|k| !k.is_empty());
        if ai_api_key.is_none() {
            warn!("TOGETHER_API_KEY is not set; image analysis will be unavailable");
        }
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            data_dir,
            db_path,
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            ai_base_url: std::env::var("AI_BASE_URL")
                .unwrap_or_else(|_| "https://api.together.xyz/v1".to_string()),
            ai_model: std::env::var("AI_MODEL")
                .unwrap_or_else(|_| "meta-llama/Llama-3.2-11B-Vision-Instruct-Turbo".to_string()),
            ai_api_key,
        }
    }
}

// ========================================
// Shared state
// ========================================

pub struct AppState {
    pub db: DbPool,
    pub store: MediaStore,
    pub vision: Arc<dyn VisionModel>,
    pub cart: CartStore,
    pub drafts: DraftSessions,
    pub camera: CameraSessions,
}

// ========================================
// Misc handlers
// ========================================

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "inventory-pos-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct CategoriesResponse {
    success: bool,
    categories: Vec<CategoryPath>,
}

/// GET /api/categories - the store's 3-level taxonomy
async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CategoriesResponse>, (StatusCode, Json<ErrorResponse>)> {
    let categories: Vec<CategoryPath> = sqlx::query_as(
        "SELECT level1, level2, level3 FROM categories ORDER BY level1, level2, level3",
    )
    .fetch_all(&state.db)
    .await
    .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {}", e)))?;

    Ok(Json(CategoriesResponse {
        success: true,
        categories,
    }))
}

// ========================================
// Router
// ========================================

pub fn build_router(state: Arc<AppState>) -> Router {
    let media_root = state.store.media_root();

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/categories", get(list_categories))
        .route("/api/analyze", post(handlers::analyze::analyze_image))
        // Inventory
        .route("/api/items", get(handlers::items::list_items).post(handlers::items::create_item))
        .route(
            "/api/items/:item_id",
            get(handlers::items::get_item)
                .put(handlers::items::update_item)
                .delete(handlers::items::delete_item),
        )
        .route("/api/items/:item_id/images", put(handlers::items::replace_images))
        // Draft sessions
        .route("/api/drafts", post(handlers::drafts::create_draft))
        .route(
            "/api/drafts/:draft_id",
            get(handlers::drafts::get_draft)
                .patch(handlers::drafts::patch_draft)
                .delete(handlers::drafts::discard_draft),
        )
        .route("/api/drafts/:draft_id/images", post(handlers::drafts::add_images))
        .route("/api/drafts/:draft_id/images/upload", post(handlers::drafts::upload_images))
        .route("/api/drafts/:draft_id/images/order", put(handlers::drafts::reorder_images))
        .route("/api/drafts/:draft_id/images/:index", delete(handlers::drafts::remove_image))
        .route("/api/drafts/:draft_id/analyze", post(handlers::drafts::analyze_draft))
        .route("/api/drafts/:draft_id/submit", post(handlers::drafts::submit_draft))
        // Camera relay
        .route("/camera/:draft_id", get(handlers::camera::camera_page))
        .route("/api/camera/:draft_id/start", post(handlers::camera::start_capture))
        .route("/api/camera/:draft_id/frame", post(handlers::camera::push_frame))
        .route("/api/camera/:draft_id/capture", post(handlers::camera::capture_frame))
        .route("/api/camera/:draft_id/stop", post(handlers::camera::stop_capture))
        // POS cart
        .route("/api/cart", get(handlers::cart::get_cart))
        .route("/api/cart/items", post(handlers::cart::add_to_cart))
        .route(
            "/api/cart/items/:item_id",
            patch(handlers::cart::update_quantity).delete(handlers::cart::remove_from_cart),
        )
        .route("/api/cart/clear", post(handlers::cart::clear_cart))
        // Stored images resolve in development without a fronting proxy
        .nest_service("/media", ServeDir::new(media_root))
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
