//! Items API Handlers
//! /api/items - inventory CRUD plus the submit flow that links images

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{error_response, ErrorResponse};
use crate::media;
use crate::models::{Condition, Item, ItemImage, ItemResponse, ItemStatus};
use crate::AppState;

// ========================================
// Request / Response Types
// ========================================

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: String,
    pub subcategory1: Option<String>,
    pub subcategory2: Option<String>,
    pub condition: Option<Condition>,
    pub size: Option<String>,
    #[serde(default = "default_true")]
    pub available_in_store: bool,
    #[serde(default = "default_true")]
    pub list_on_paperclip: bool,
    /// Data-URIs in display order.
    #[serde(default)]
    pub images: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub subcategory1: Option<String>,
    pub subcategory2: Option<String>,
    pub condition: Option<Condition>,
    pub size: Option<String>,
    pub status: Option<ItemStatus>,
    pub available_in_store: Option<bool>,
    pub list_on_paperclip: Option<bool>,
    /// When present: full image-set replacement, data-URIs for new images
    /// and stored URLs for kept ones, in display order.
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceImagesRequest {
    pub images: Vec<String>,
}

#[derive(Serialize)]
pub struct ItemListResponse {
    pub success: bool,
    pub items: Vec<ItemResponse>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct ItemDetailResponse {
    pub success: bool,
    pub item: ItemResponse,
}

#[derive(Serialize)]
pub struct ItemDeleteResponse {
    pub success: bool,
    pub item_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListItemsQuery {
    pub status: Option<String>,
    pub category: Option<String>,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

// ========================================
// Handlers
// ========================================

/// GET /api/items - inventory list with ordered image URLs
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListItemsQuery>,
) -> Result<Json<ItemListResponse>, HandlerError> {
    let items: Vec<Item> = sqlx::query_as(
        "SELECT * FROM items ORDER BY created_at_ms DESC",
    )
    .fetch_all(&state.db)
    .await
    .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {}", e)))?;

    let images: Vec<ItemImage> = sqlx::query_as(
        "SELECT * FROM item_images ORDER BY item_id, display_order",
    )
    .fetch_all(&state.db)
    .await
    .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {}", e)))?;

    let mut by_item: HashMap<String, Vec<ItemImage>> = HashMap::new();
    for image in images {
        by_item.entry(image.item_id.clone()).or_default().push(image);
    }

    let responses: Vec<ItemResponse> = items
        .iter()
        .filter(|i| query.status.as_deref().map_or(true, |s| i.status == s))
        .filter(|i| query.category.as_deref().map_or(true, |c| i.category == c))
        .map(|i| ItemResponse::from_item(i, by_item.get(&i.item_id).map_or(&[][..], Vec::as_slice)))
        .collect();

    let total = responses.len();
    Ok(Json(ItemListResponse {
        success: true,
        items: responses,
        total,
    }))
}

/// GET /api/items/:item_id - item detail
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
) -> Result<Json<ItemDetailResponse>, HandlerError> {
    let item = fetch_item(&state, &item_id).await?;
    let images = fetch_images(&state, &item_id).await?;
    Ok(Json(ItemDetailResponse {
        success: true,
        item: ItemResponse::from_item(&item, &images),
    }))
}

/// POST /api/items - submit a new item with its images
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateItemRequest>,
) -> Result<Json<ItemDetailResponse>, HandlerError> {
    let item = persist_new_item(&state, req).await?;
    Ok(Json(ItemDetailResponse {
        success: true,
        item,
    }))
}

/// PUT /api/items/:item_id - edit-save; replaces the image-link set when
/// images are supplied
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<ItemDetailResponse>, HandlerError> {
    fetch_item(&state, &item_id).await?;
    let now_ms = chrono::Utc::now().timestamp_millis();

    sqlx::query(r#"
        UPDATE items SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            price = COALESCE(?, price),
            category = COALESCE(?, category),
            subcategory1 = COALESCE(?, subcategory1),
            subcategory2 = COALESCE(?, subcategory2),
            condition = COALESCE(?, condition),
            size = COALESCE(?, size),
            status = COALESCE(?, status),
            available_in_store = COALESCE(?, available_in_store),
            list_on_paperclip = COALESCE(?, list_on_paperclip),
            updated_at_ms = ?
        WHERE item_id = ?
    "#)
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.price)
    .bind(&req.category)
    .bind(&req.subcategory1)
    .bind(&req.subcategory2)
    .bind(req.condition.map(|c| c.as_str()))
    .bind(&req.size)
    .bind(req.status.map(|s| s.as_str()))
    .bind(req.available_in_store.map(|b| b as i32))
    .bind(req.list_on_paperclip.map(|b| b as i32))
    .bind(now_ms)
    .bind(&item_id)
    .execute(&state.db)
    .await
    .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {}", e)))?;

    if let Some(images) = req.images {
        replace_image_links(&state, &item_id, &images).await?;
    }

    info!("Item updated: item_id={}", item_id);

    let item = fetch_item(&state, &item_id).await?;
    let images = fetch_images(&state, &item_id).await?;
    Ok(Json(ItemDetailResponse {
        success: true,
        item: ItemResponse::from_item(&item, &images),
    }))
}

/// PUT /api/items/:item_id/images - idempotent full image-set
/// replacement; retry path after a partially failed submission
pub async fn replace_images(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
    Json(req): Json<ReplaceImagesRequest>,
) -> Result<Json<ItemDetailResponse>, HandlerError> {
    fetch_item(&state, &item_id).await?;
    replace_image_links(&state, &item_id, &req.images).await?;

    let item = fetch_item(&state, &item_id).await?;
    let images = fetch_images(&state, &item_id).await?;
    Ok(Json(ItemDetailResponse {
        success: true,
        item: ItemResponse::from_item(&item, &images),
    }))
}

/// DELETE /api/items/:item_id - removes stored image files, link rows,
/// then the item itself
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
) -> Result<Json<ItemDeleteResponse>, HandlerError> {
    fetch_item(&state, &item_id).await?;

    let images = fetch_images(&state, &item_id).await?;
    for image in &images {
        if let Err(e) = state.store.delete_by_url(&image.image_url).await {
            warn!("Failed to delete stored image {}: {}", image.image_url, e);
        }
    }
    if let Err(e) = state.store.delete_item_images(&item_id).await {
        warn!("Failed to remove image directory for {}: {}", item_id, e);
    }

    sqlx::query("DELETE FROM item_images WHERE item_id = ?")
        .bind(&item_id)
        .execute(&state.db)
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {}", e)))?;

    sqlx::query("DELETE FROM items WHERE item_id = ?")
        .bind(&item_id)
        .execute(&state.db)
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {}", e)))?;

    info!("Item deleted: item_id={}", item_id);

    Ok(Json(ItemDeleteResponse {
        success: true,
        item_id,
    }))
}

// ========================================
// Submit flow (shared with draft sessions)
// ========================================

/// Create the item row first; only on success are images stored and
/// linked. Image failures after the row exists surface as one aggregate
/// error and do NOT retract the item - the replacement endpoint is the
/// retry path.
pub(crate) async fn persist_new_item(
    state: &AppState,
    req: CreateItemRequest,
) -> Result<ItemResponse, HandlerError> {
    if req.title.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "title is required".to_string()));
    }
    if req.category.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "category is required".to_string()));
    }
    if !req.price.is_finite() || req.price < 0.0 {
        return Err(error_response(StatusCode::BAD_REQUEST, "price must be a non-negative number".to_string()));
    }

    let item_id = Uuid::new_v4().to_string();
    let now_ms = chrono::Utc::now().timestamp_millis();
    let condition = req.condition.unwrap_or_default();

    sqlx::query(r#"
        INSERT INTO items (
            item_id, title, description, price,
            category, subcategory1, subcategory2,
            condition, size, status,
            available_in_store, list_on_paperclip,
            created_at_ms, updated_at_ms
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'available', ?, ?, ?, ?)
    "#)
    .bind(&item_id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.price)
    .bind(&req.category)
    .bind(&req.subcategory1)
    .bind(&req.subcategory2)
    .bind(condition.as_str())
    .bind(&req.size)
    .bind(req.available_in_store as i32)
    .bind(req.list_on_paperclip as i32)
    .bind(now_ms)
    .bind(now_ms)
    .execute(&state.db)
    .await
    .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {}", e)))?;

    info!("Item created: item_id={}, title={}", item_id, req.title);

    link_images(state, &item_id, &req.images).await?;

    let item = fetch_item(state, &item_id).await?;
    let images = fetch_images(state, &item_id).await?;
    Ok(ItemResponse::from_item(&item, &images))
}

/// Store each image (data-URI) or keep an already-stored URL, then insert
/// link rows in display order. Uploads run as one concurrent batch; photo
/// counts are small enough that unbounded fan-out is fine.
async fn store_batch(
    state: &AppState,
    item_id: &str,
    images: &[String],
) -> (Vec<String>, Vec<String>) {
    let uploads = images.iter().map(|source| async move {
        if !source.starts_with("data:") {
            // Already-stored URL kept across an edit
            return Ok(source.clone());
        }
        let payload = media::ImagePayload::from_data_uri(source)
            .map_err(|e| e.to_string())?;
        let normalized = media::normalize(&payload).map_err(|e| e.to_string())?;
        state
            .store
            .store_item_image(item_id, &normalized)
            .await
            .map_err(|e| e.to_string())
    });

    let mut urls = Vec::new();
    let mut failures = Vec::new();
    for result in join_all(uploads).await {
        match result {
            Ok(url) => urls.push(url),
            Err(e) => failures.push(e),
        }
    }
    (urls, failures)
}

async fn insert_links(
    state: &AppState,
    item_id: &str,
    urls: &[String],
) -> Result<(), HandlerError> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    for (index, url) in urls.iter().enumerate() {
        sqlx::query(r#"
            INSERT INTO item_images (image_id, item_id, image_url, display_order, created_at_ms)
            VALUES (?, ?, ?, ?, ?)
        "#)
        .bind(Uuid::new_v4().to_string())
        .bind(item_id)
        .bind(url)
        .bind(index as i64)
        .bind(now_ms)
        .execute(&state.db)
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {}", e)))?;
    }
    Ok(())
}

async fn link_images(
    state: &AppState,
    item_id: &str,
    images: &[String],
) -> Result<(), HandlerError> {
    let (urls, failures) = store_batch(state, item_id, images).await;
    // Successful uploads are linked contiguously even when some failed,
    // so display_order never has gaps.
    insert_links(state, item_id, &urls).await?;

    if !failures.is_empty() {
        return Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "item {} was created but {} of {} image uploads failed: {}",
                item_id,
                failures.len(),
                images.len(),
                failures.join("; ")
            ),
        ));
    }
    Ok(())
}

/// Delete-all, re-insert-all image-link replacement. Files behind URLs
/// that are no longer referenced are removed best-effort.
pub(crate) async fn replace_image_links(
    state: &AppState,
    item_id: &str,
    images: &[String],
) -> Result<(), HandlerError> {
    let existing = fetch_images(state, item_id).await?;

    sqlx::query("DELETE FROM item_images WHERE item_id = ?")
        .bind(item_id)
        .execute(&state.db)
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {}", e)))?;

    let (urls, failures) = store_batch(state, item_id, images).await;
    insert_links(state, item_id, &urls).await?;

    for old in &existing {
        if !urls.contains(&old.image_url) {
            if let Err(e) = state.store.delete_by_url(&old.image_url).await {
                warn!("Failed to delete replaced image {}: {}", old.image_url, e);
            }
        }
    }

    if !failures.is_empty() {
        return Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "{} of {} image uploads failed during replacement: {}",
                failures.len(),
                images.len(),
                failures.join("; ")
            ),
        ));
    }

    info!("Image links replaced: item_id={}, count={}", item_id, urls.len());
    Ok(())
}

// ========================================
// Helper Functions
// ========================================

pub(crate) async fn fetch_item(state: &AppState, item_id: &str) -> Result<Item, HandlerError> {
    let item: Option<Item> = sqlx::query_as("SELECT * FROM items WHERE item_id = ?")
        .bind(item_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {}", e)))?;
    item.ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Item not found".to_string()))
}

pub(crate) async fn fetch_images(
    state: &AppState,
    item_id: &str,
) -> Result<Vec<ItemImage>, HandlerError> {
    sqlx::query_as(
        "SELECT * FROM item_images WHERE item_id = ? ORDER BY display_order",
    )
    .bind(item_id)
    .fetch_all(&state.db)
    .await
    .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {}", e)))
}
