//! API Handlers

pub mod analyze;
pub mod camera;
pub mod cart;
pub mod drafts;
pub mod items;

use axum::{http::StatusCode, response::Json};
use serde::Serialize;
use tracing::warn;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

pub fn error_response(status: StatusCode, message: String) -> (StatusCode, Json<ErrorResponse>) {
    warn!("API Error: {}", message);
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: message,
        }),
    )
}
