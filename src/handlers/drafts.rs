//! Draft Session Handlers
//! /api/drafts - one listing-form session per add-item page

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::{error_response, ErrorResponse};
use crate::analysis;
use crate::form::{FormError, ListingForm};
use crate::handlers::items::{persist_new_item, CreateItemRequest};
use crate::media;
use crate::models::{DraftPatch, ListingSuggestion};
use crate::AppState;

// ========================================
// Response Types
// ========================================

#[derive(Serialize)]
pub struct DraftCreatedResponse {
    pub success: bool,
    pub draft_id: String,
}

#[derive(Serialize)]
pub struct DraftStateResponse {
    pub success: bool,
    pub draft: ListingForm,
}

#[derive(Serialize)]
pub struct DraftImagesResponse {
    pub success: bool,
    pub images: Vec<String>,
    /// Per-file failures; one bad file never aborts the batch.
    pub errors: Vec<String>,
}

#[derive(Serialize)]
pub struct DraftAnalyzeResponse {
    pub success: bool,
    /// False when a newer analysis already landed and this one was dropped.
    pub applied: bool,
    pub suggestion: ListingSuggestion,
}

#[derive(Serialize)]
pub struct DraftSubmitResponse {
    pub success: bool,
    pub item_id: String,
}

#[derive(Serialize)]
pub struct DraftDiscardResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct AddImagesRequest {
    /// Data-URI images, appended in the order given.
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    /// order[new_position] = old_position
    pub order: Vec<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeDraftRequest {
    #[serde(default)]
    pub image_index: usize,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn form_error(e: FormError) -> HandlerError {
    error_response(StatusCode::BAD_REQUEST, e.to_string())
}

fn draft_not_found() -> HandlerError {
    error_response(StatusCode::NOT_FOUND, "Draft not found".to_string())
}

// ========================================
// Handlers
// ========================================

/// POST /api/drafts - open a new empty form session
pub async fn create_draft(
    State(state): State<Arc<AppState>>,
) -> Json<DraftCreatedResponse> {
    let draft_id = state.drafts.create();
    info!("Draft opened: draft_id={}", draft_id);
    Json(DraftCreatedResponse {
        success: true,
        draft_id,
    })
}

/// GET /api/drafts/:draft_id - current draft, phase and image sequence
pub async fn get_draft(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
) -> Result<Json<DraftStateResponse>, HandlerError> {
    let draft = state.drafts.get(&draft_id).ok_or_else(draft_not_found)?;
    Ok(Json(DraftStateResponse {
        success: true,
        draft,
    }))
}

/// PATCH /api/drafts/:draft_id - manual field edits
pub async fn patch_draft(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
    Json(patch): Json<DraftPatch>,
) -> Result<Json<DraftStateResponse>, HandlerError> {
    state
        .drafts
        .with(&draft_id, |form| form.apply_patch(patch))
        .ok_or_else(draft_not_found)?;
    let draft = state.drafts.get(&draft_id).ok_or_else(draft_not_found)?;
    Ok(Json(DraftStateResponse {
        success: true,
        draft,
    }))
}

/// POST /api/drafts/:draft_id/images - attach images (JSON data-URIs)
pub async fn add_images(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
    Json(req): Json<AddImagesRequest>,
) -> Result<Json<DraftImagesResponse>, HandlerError> {
    if state.drafts.get(&draft_id).is_none() {
        return Err(draft_not_found());
    }

    let mut normalized = Vec::new();
    let mut errors = Vec::new();
    for (index, uri) in req.images.iter().enumerate() {
        match media::normalize_data_uri(uri) {
            Ok(out) => normalized.push(out),
            Err(e) => {
                warn!("Skipping image {} for draft {}: {}", index, draft_id, e);
                errors.push(format!("image {}: {}", index, e));
            }
        }
    }

    let images = state
        .drafts
        .with(&draft_id, |form| {
            for uri in normalized {
                form.add_image(uri);
            }
            form.images.clone()
        })
        .ok_or_else(draft_not_found)?;

    Ok(Json(DraftImagesResponse {
        success: true,
        images,
        errors,
    }))
}

/// POST /api/drafts/:draft_id/images/upload - attach images (multipart
/// files, e.g. from a file picker); non-image parts fail per file
pub async fn upload_images(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<DraftImagesResponse>, HandlerError> {
    if state.drafts.get(&draft_id).is_none() {
        return Err(draft_not_found());
    }

    let mut normalized = Vec::new();
    let mut errors = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let mime = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = match field.bytes().await {
            Ok(b) => b.to_vec(),
            Err(e) => {
                errors.push(format!("{}: read error: {}", file_name, e));
                continue;
            }
        };

        let result = media::ImagePayload::new(mime, bytes).and_then(|p| media::normalize(&p));
        match result {
            Ok(payload) => normalized.push(payload.to_data_uri()),
            Err(e) => {
                warn!("Skipping file {} for draft {}: {}", file_name, draft_id, e);
                errors.push(format!("{}: {}", file_name, e));
            }
        }
    }

    let images = state
        .drafts
        .with(&draft_id, |form| {
            for uri in normalized {
                form.add_image(uri);
            }
            form.images.clone()
        })
        .ok_or_else(draft_not_found)?;

    Ok(Json(DraftImagesResponse {
        success: true,
        images,
        errors,
    }))
}

/// DELETE /api/drafts/:draft_id/images/:index - remove + renumber
pub async fn remove_image(
    State(state): State<Arc<AppState>>,
    Path((draft_id, index)): Path<(String, usize)>,
) -> Result<Json<DraftImagesResponse>, HandlerError> {
    let result = state
        .drafts
        .with(&draft_id, |form| {
            form.remove_image(index).map(|_| form.images.clone())
        })
        .ok_or_else(draft_not_found)?;
    let images = result.map_err(form_error)?;
    Ok(Json(DraftImagesResponse {
        success: true,
        images,
        errors: Vec::new(),
    }))
}

/// PUT /api/drafts/:draft_id/images/order - reorder by permutation
pub async fn reorder_images(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<DraftImagesResponse>, HandlerError> {
    let result = state
        .drafts
        .with(&draft_id, |form| {
            form.reorder_images(&req.order).map(|_| form.images.clone())
        })
        .ok_or_else(draft_not_found)?;
    let images = result.map_err(form_error)?;
    Ok(Json(DraftImagesResponse {
        success: true,
        images,
        errors: Vec::new(),
    }))
}

/// POST /api/drafts/:draft_id/analyze - run the vision model on one
/// attached image and merge the suggestion into the draft. Responses that
/// arrive after a newer one has been applied are discarded.
pub async fn analyze_draft(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
    Json(req): Json<AnalyzeDraftRequest>,
) -> Result<Json<DraftAnalyzeResponse>, HandlerError> {
    let begun = state
        .drafts
        .with(&draft_id, |form| {
            form.begin_analysis(req.image_index)
                .map(|ticket| (ticket, form.images[req.image_index].clone()))
        })
        .ok_or_else(draft_not_found)?;
    let (ticket, image) = begun.map_err(form_error)?;

    // Model call runs without the session lock held.
    let suggestion = match analysis::analyze(state.vision.as_ref(), &image).await {
        Ok(s) => s,
        Err(e) => {
            warn!("Analysis failed for draft {}: {}", draft_id, e);
            state.drafts.with(&draft_id, |form| form.fail_analysis(ticket));
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to analyze image. You can continue filling in details manually.".to_string(),
            ));
        }
    };

    let applied = state
        .drafts
        .with(&draft_id, |form| form.apply_analysis(ticket, &suggestion))
        .ok_or_else(draft_not_found)?;

    Ok(Json(DraftAnalyzeResponse {
        success: true,
        applied,
        suggestion,
    }))
}

/// POST /api/drafts/:draft_id/submit - persist the draft as an item
pub async fn submit_draft(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
) -> Result<Json<DraftSubmitResponse>, HandlerError> {
    let form = state
        .drafts
        .with(&draft_id, |form| {
            form.begin_submit();
            form.clone()
        })
        .ok_or_else(draft_not_found)?;

    let price: f64 = form.draft.price.trim().parse().map_err(|_| {
        state.drafts.with(&draft_id, |f| f.mark_failed());
        error_response(
            StatusCode::BAD_REQUEST,
            format!("price is not a valid number: {:?}", form.draft.price),
        )
    })?;

    let request = CreateItemRequest {
        title: form.draft.name.clone(),
        description: if form.draft.description.is_empty() {
            None
        } else {
            Some(form.draft.description.clone())
        },
        price,
        category: form.draft.category.clone(),
        subcategory1: non_empty(&form.draft.subcategory1),
        subcategory2: non_empty(&form.draft.subcategory2),
        condition: form.draft.condition,
        size: form.draft.size.clone(),
        available_in_store: form.draft.available_in_store,
        list_on_paperclip: form.draft.list_on_paperclip,
        images: form.images.clone(),
    };

    match persist_new_item(&state, request).await {
        Ok(item) => {
            // Ownership of the images transfers to storage; the session ends.
            state.drafts.with(&draft_id, |f| f.mark_saved());
            state.drafts.remove(&draft_id);
            state.camera.stop(&draft_id);
            info!("Draft submitted: draft_id={} -> item_id={}", draft_id, item.item_id);
            Ok(Json(DraftSubmitResponse {
                success: true,
                item_id: item.item_id,
            }))
        }
        Err(e) => {
            state.drafts.with(&draft_id, |f| f.mark_failed());
            Err(e)
        }
    }
}

/// DELETE /api/drafts/:draft_id - discard (navigation away). Releases the
/// camera; in-flight analysis may still finish against a gone session,
/// which is harmless.
pub async fn discard_draft(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
) -> Json<DraftDiscardResponse> {
    state.drafts.remove(&draft_id);
    state.camera.stop(&draft_id);
    info!("Draft discarded: draft_id={}", draft_id);
    Json(DraftDiscardResponse { success: true })
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
