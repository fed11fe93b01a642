//! Camera Relay Handlers
//! /api/camera/:draft_id - phone-as-camera bridge feeding a draft's
//! image sequence, plus the mobile capture page

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::{error_response, ErrorResponse};
use crate::capture::CaptureError;
use crate::media;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StartCaptureRequest {
    /// Set by the device page when the user refused camera access.
    #[serde(default)]
    pub denied: bool,
}

#[derive(Serialize)]
pub struct CaptureStatusResponse {
    pub success: bool,
    pub active: bool,
}

#[derive(Serialize)]
pub struct CaptureResponse {
    pub success: bool,
    /// Position of the captured image in the draft's sequence.
    pub index: usize,
    pub image: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn capture_error(e: CaptureError) -> HandlerError {
    let status = match e {
        CaptureError::PermissionDenied => StatusCode::FORBIDDEN,
        CaptureError::DeviceUnavailable => StatusCode::NOT_FOUND,
        CaptureError::PlaybackFailed => StatusCode::CONFLICT,
        CaptureError::NotActive => StatusCode::CONFLICT,
    };
    error_response(status, e.to_string())
}

// ========================================
// Handlers
// ========================================

/// POST /api/camera/:draft_id/start - open (or reopen) a capture session
pub async fn start_capture(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
    body: Option<Json<StartCaptureRequest>>,
) -> Result<Json<CaptureStatusResponse>, HandlerError> {
    if state.drafts.get(&draft_id).is_none() {
        return Err(error_response(StatusCode::NOT_FOUND, "Draft not found".to_string()));
    }
    let denied = body.map(|Json(b)| b.denied).unwrap_or(false);
    state.camera.start(&draft_id, denied).map_err(capture_error)?;
    info!("Capture session started: draft={}", draft_id);
    Ok(Json(CaptureStatusResponse {
        success: true,
        active: true,
    }))
}

/// POST /api/camera/:draft_id/frame - device posts the current still
/// (multipart `image` part) or reports a playback `error`
pub async fn push_frame(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<CaptureStatusResponse>, HandlerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" => {
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    error_response(StatusCode::BAD_REQUEST, format!("Read error: {}", e))
                })?;
                let payload = media::ImagePayload::new(mime, bytes.to_vec()).map_err(|e| {
                    error_response(StatusCode::UNSUPPORTED_MEDIA_TYPE, e.to_string())
                })?;

                info!("Camera frame received: draft={}, {} bytes", draft_id, payload.bytes.len());
                state
                    .camera
                    .push_frame(&draft_id, payload)
                    .map_err(capture_error)?;
                return Ok(Json(CaptureStatusResponse {
                    success: true,
                    active: true,
                }));
            }
            "error" => {
                let detail = field.text().await.unwrap_or_default();
                warn!("Camera playback failure reported: draft={}, {}", draft_id, detail);
                state
                    .camera
                    .report_playback_failure(&draft_id)
                    .map_err(capture_error)?;
                return Err(error_response(
                    StatusCode::CONFLICT,
                    "camera playback failed; restart the capture session".to_string(),
                ));
            }
            _ => {}
        }
    }

    Err(error_response(StatusCode::BAD_REQUEST, "No image field found".to_string()))
}

/// POST /api/camera/:draft_id/capture - take the buffered frame,
/// normalize it and append it to the draft's image sequence
pub async fn capture_frame(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
) -> Result<Json<CaptureResponse>, HandlerError> {
    if state.drafts.get(&draft_id).is_none() {
        return Err(error_response(StatusCode::NOT_FOUND, "Draft not found".to_string()));
    }

    let frame = state.camera.capture(&draft_id).map_err(capture_error)?;
    let normalized = media::normalize(&frame).map_err(|e| {
        error_response(StatusCode::UNSUPPORTED_MEDIA_TYPE, e.to_string())
    })?;
    let data_uri = normalized.to_data_uri();

    let index = state
        .drafts
        .with(&draft_id, |form| {
            form.add_image(data_uri.clone());
            form.images.len() - 1
        })
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Draft not found".to_string()))?;

    info!("Frame captured into draft: draft={}, index={}", draft_id, index);

    Ok(Json(CaptureResponse {
        success: true,
        index,
        image: data_uri,
    }))
}

/// POST /api/camera/:draft_id/stop - release the session; idempotent
pub async fn stop_capture(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
) -> Json<CaptureStatusResponse> {
    state.camera.stop(&draft_id);
    Json(CaptureStatusResponse {
        success: true,
        active: false,
    })
}

/// GET /camera/:draft_id - minimal mobile page that posts stills into the
/// draft's capture session
pub async fn camera_page(Path(draft_id): Path<String>) -> impl IntoResponse {
    let page = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>Camera Capture</title>
<style>
*{{margin:0;padding:0;box-sizing:border-box}}
body{{background:#111;color:#fff;font-family:-apple-system,sans-serif;
  display:flex;flex-direction:column;align-items:center;
  min-height:100vh;padding:24px}}
h1{{font-size:20px;margin-bottom:24px;color:#aaa}}
.btn{{background:#6750A4;color:#fff;border:none;border-radius:12px;
  padding:16px 32px;font-size:18px;cursor:pointer;width:100%;max-width:320px}}
.btn:active{{background:#7E67C1}}
#preview{{max-width:300px;max-height:400px;margin:16px 0;border-radius:12px;display:none}}
#status{{margin-top:16px;font-size:16px;text-align:center}}
.success{{color:#4CAF50}}
.error{{color:#f44336}}
.uploading{{color:#FF9800}}
input[type=file]{{display:none}}
</style>
</head>
<body>
<h1>Inventory Camera</h1>
<button class="btn" onclick="document.getElementById('fileInput').click()">
  Take Photo
</button>
<input type="file" id="fileInput" accept="image/*" capture="environment">
<img id="preview">
<div id="status"></div>
<script>
const draftId={draft_id:?};
const fileInput=document.getElementById('fileInput');
const preview=document.getElementById('preview');
const status=document.getElementById('status');

fetch('/api/camera/'+draftId+'/start',{{method:'POST'}});

fileInput.addEventListener('change',async(e)=>{{
  const file=e.target.files[0];
  if(!file)return;

  const reader=new FileReader();
  reader.onload=(ev)=>{{
    preview.src=ev.target.result;
    preview.style.display='block';
  }};
  reader.readAsDataURL(file);

  status.className='uploading';
  status.textContent='Uploading...';

  try{{
    const form=new FormData();
    form.append('image',file);
    const res=await fetch('/api/camera/'+draftId+'/frame',{{method:'POST',body:form}});
    if(res.ok){{
      status.className='success';
      status.textContent='Frame sent. Use Capture in the listing form.';
    }}else{{
      const text=await res.text();
      status.className='error';
      status.textContent='Error: '+text;
    }}
  }}catch(err){{
    status.className='error';
    status.textContent='Network error: '+err.message;
  }}
}});
</script>
</body>
</html>"#
    );
    Html(page)
}
