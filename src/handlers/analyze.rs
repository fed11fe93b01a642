//! Analyze API Handler
//! POST /api/analyze - standalone image-to-listing-suggestion endpoint

use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::analysis::{self, AnalysisError};
use crate::models::ListingSuggestion;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub image: String,
}

/// Error body matches the public contract: `{ "error": "..." }` with no
/// internal detail; the underlying cause goes to the log.
#[derive(Serialize)]
pub struct AnalyzeErrorResponse {
    pub error: String,
}

type AnalyzeFailure = (StatusCode, Json<AnalyzeErrorResponse>);

fn failure(status: StatusCode, error: &str) -> AnalyzeFailure {
    (
        status,
        Json(AnalyzeErrorResponse {
            error: error.to_string(),
        }),
    )
}

/// POST /api/analyze
pub async fn analyze_image(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<ListingSuggestion>, AnalyzeFailure> {
    if req.image.is_empty() {
        return Err(failure(StatusCode::BAD_REQUEST, "No image provided"));
    }

    info!("Received image analysis request");

    match analysis::analyze(state.vision.as_ref(), &req.image).await {
        Ok(suggestion) => Ok(Json(suggestion)),
        Err(e) => {
            match &e {
                AnalysisError::Unavailable(cause) => warn!("Analysis unavailable: {}", cause),
                AnalysisError::MalformedResponse(cause) => {
                    warn!("Malformed model output: {}", cause)
                }
                AnalysisError::IncompleteResponse(field) => {
                    warn!("Model output missing required field: {}", field)
                }
            }
            Err(failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to analyze image",
            ))
        }
    }
}
