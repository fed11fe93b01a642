//! Cart API Handlers
//! /api/cart - in-memory POS cart endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::{error_response, ErrorResponse};
use crate::cart::CartItemSnapshot;
use crate::models::CartEntry;
use crate::AppState;

#[derive(Serialize)]
pub struct CartResponse {
    pub success: bool,
    pub items: Vec<CartEntry>,
    pub total: f64,
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub item_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub change: i64,
}

#[derive(Serialize)]
pub struct QuantityResponse {
    pub success: bool,
    pub item_id: String,
    /// 0 means the entry was removed.
    pub quantity: i64,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn cart_response(state: &AppState) -> Json<CartResponse> {
    Json(CartResponse {
        success: true,
        items: state.cart.entries(),
        total: state.cart.total(),
    })
}

// ========================================
// Handlers
// ========================================

/// GET /api/cart - entries plus total
pub async fn get_cart(State(state): State<Arc<AppState>>) -> Json<CartResponse> {
    cart_response(&state)
}

/// POST /api/cart/items - add one unit of an inventory item
pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddToCartRequest>,
) -> Result<Json<CartResponse>, HandlerError> {
    let item = crate::handlers::items::fetch_item(&state, &req.item_id).await?;
    let images = crate::handlers::items::fetch_images(&state, &req.item_id).await?;

    state.cart.add(CartItemSnapshot {
        item_id: item.item_id.clone(),
        name: item.title.clone(),
        price: item.price,
        image: images.first().map(|i| i.image_url.clone()),
        category: item.category.clone(),
        stock: item.status.clone(),
    });

    info!("Cart add: item_id={}", req.item_id);
    Ok(cart_response(&state))
}

/// PATCH /api/cart/items/:item_id - signed quantity change; dropping
/// below 1 removes the entry
pub async fn update_quantity(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<QuantityResponse>, HandlerError> {
    match state.cart.update_quantity(&item_id, req.change) {
        Some(quantity) => Ok(Json(QuantityResponse {
            success: true,
            item_id,
            quantity,
        })),
        None => Err(error_response(StatusCode::NOT_FOUND, "Item not in cart".to_string())),
    }
}

/// DELETE /api/cart/items/:item_id - remove an entry
pub async fn remove_from_cart(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
) -> Result<Json<CartResponse>, HandlerError> {
    if !state.cart.remove(&item_id) {
        return Err(error_response(StatusCode::NOT_FOUND, "Item not in cart".to_string()));
    }
    Ok(cart_response(&state))
}

/// POST /api/cart/clear - empty the cart
pub async fn clear_cart(State(state): State<Arc<AppState>>) -> Json<CartResponse> {
    state.cart.clear();
    info!("Cart cleared");
    cart_response(&state)
}
