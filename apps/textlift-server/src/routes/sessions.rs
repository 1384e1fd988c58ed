//! Session Routes
//!
//! HTTP endpoints a client page drives a conversion through.
//!
//! Endpoints:
//! - POST /api/v1/sessions - Create a session
//! - GET /api/v1/sessions/:id - Current session view
//! - DELETE /api/v1/sessions/:id - Drop a session
//! - POST /api/v1/sessions/:id/upload - Upload an image (multipart, field `file`)
//! - PUT /api/v1/sessions/:id/upload - Upload an image as a base64 data URL
//! - PUT /api/v1/sessions/:id/url - Set the image URL field
//! - PUT /api/v1/sessions/:id/language - Select the recognition language
//! - POST /api/v1/sessions/:id/convert - Start recognizing
//! - POST /api/v1/sessions/:id/reset - Start a new session in place
//! - POST /api/v1/sessions/:id/copy - Copy the extracted text
//! - GET /api/v1/sessions/:id/preview - Image bytes of the active source
//! - GET /api/v1/sessions/:id/events - Server-sent session views

use std::convert::Infallible;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post, put},
    Json, Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::ocr::LanguageCode;
use crate::session::SessionInfo;
use crate::source::{ImageReference, SourceError, UploadedImage};
use crate::state::AppState;

// ============================================================================
// Router
// ============================================================================

/// Create the sessions router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/:id", get(get_session).delete(delete_session))
        .route("/:id/upload", post(upload_file).put(upload_data_url))
        .route("/:id/url", put(set_url))
        .route("/:id/language", put(set_language))
        .route("/:id/convert", post(convert))
        .route("/:id/reset", post(reset))
        .route("/:id/copy", post(copy_text))
        .route("/:id/preview", get(preview))
        .route("/:id/events", get(session_events))
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DataUrlRequest {
    pub data_url: String,
}

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct LanguageRequest {
    pub language: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConvertRequest {
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CopyResponse {
    pub copied: bool,
    pub text: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/sessions
async fn create_session(State(state): State<AppState>) -> Result<(StatusCode, Json<SessionInfo>)> {
    let session = state.sessions().create_session().await?;
    Ok((StatusCode::CREATED, Json(session.info())))
}

/// GET /api/v1/sessions/:id
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>> {
    let session = state.sessions().get_session_by_str(&id).await?;
    Ok(Json(session.info()))
}

/// DELETE /api/v1/sessions/:id
async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let session = state.sessions().get_session_by_str(&id).await?;
    state.sessions().remove_session(session.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/upload
///
/// Multipart upload; the image is read from the `file` field.
async fn upload_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<SessionInfo>> {
    let session = state.sessions().get_session_by_str(&id).await?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let mime_type = field
            .content_type()
            .map(str::to_string)
            .or_else(|| {
                field
                    .file_name()
                    .and_then(|name| mime_guess::from_path(name).first())
                    .map(|mime| mime.essence_str().to_string())
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let bytes = field.bytes().await?;
        let image = UploadedImage::new(mime_type, bytes.to_vec());
        check_upload_size(&image, state.loader().max_bytes())?;

        session.controller.set_from_upload(image);
        return Ok(Json(session.info()));
    }

    Err(AppError::BadRequest("Missing multipart field `file`".to_string()))
}

/// PUT /api/v1/sessions/:id/upload
async fn upload_data_url(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<DataUrlRequest>,
) -> Result<Json<SessionInfo>> {
    let session = state.sessions().get_session_by_str(&id).await?;

    let image = UploadedImage::from_data_url(&request.data_url)?;
    check_upload_size(&image, state.loader().max_bytes())?;

    session.controller.set_from_upload(image);
    Ok(Json(session.info()))
}

/// PUT /api/v1/sessions/:id/url
async fn set_url(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UrlRequest>,
) -> Result<Json<SessionInfo>> {
    let session = state.sessions().get_session_by_str(&id).await?;
    session.controller.set_from_url(request.url);
    Ok(Json(session.info()))
}

/// PUT /api/v1/sessions/:id/language
async fn set_language(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<LanguageRequest>,
) -> Result<Json<SessionInfo>> {
    let session = state.sessions().get_session_by_str(&id).await?;
    let language: LanguageCode = request.language.parse()?;
    session.controller.set_language(language);
    Ok(Json(session.info()))
}

/// POST /api/v1/sessions/:id/convert
///
/// Starts the job and returns immediately; poll the session or follow
/// `/events` for progress.
async fn convert(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Option<Json<ConvertRequest>>,
) -> Result<(StatusCode, Json<SessionInfo>)> {
    let session = state.sessions().get_session_by_str(&id).await?;

    if let Some(Json(ConvertRequest {
        language: Some(language),
    })) = request
    {
        if session.controller.is_running() {
            return Err(AppError::Job(crate::job::JobError::Busy));
        }
        session.controller.set_language(language.parse()?);
    }

    let ticket = session.controller.start()?;

    tracing::debug!(
        session_id = %session.id,
        generation = ticket.generation,
        "Conversion accepted"
    );

    Ok((StatusCode::ACCEPTED, Json(session.info())))
}

/// POST /api/v1/sessions/:id/reset
async fn reset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>> {
    let session = state.sessions().get_session_by_str(&id).await?;
    session.controller.reset();
    Ok(Json(session.info()))
}

/// POST /api/v1/sessions/:id/copy
async fn copy_text(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CopyResponse>> {
    let session = state.sessions().get_session_by_str(&id).await?;
    let copied = session.controller.copy_result(state.clipboard()).await;

    Ok(Json(CopyResponse {
        copied,
        text: session.controller.snapshot().result_text,
    }))
}

/// GET /api/v1/sessions/:id/preview
///
/// Serves the active image. A URL that does not load as an image sets the
/// session error, the same way a broken `<img>` would.
async fn preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let session = state.sessions().get_session_by_str(&id).await?;
    let image = session
        .controller
        .image()
        .ok_or_else(|| AppError::NotFound("No image selected".to_string()))?;

    match state.loader().load(&image).await {
        Ok(loaded) => {
            Ok(([(header::CONTENT_TYPE, loaded.mime_type())], loaded.bytes).into_response())
        }
        Err(e) => {
            tracing::debug!(session_id = %session.id, "Preview failed: {}", e);
            match image {
                ImageReference::Url(_) => {
                    session.controller.report_image_load_error();
                    Err(AppError::ImageLoad)
                }
                ImageReference::Upload(_) => Err(AppError::BadRequest(
                    "Uploaded file is not a valid image".to_string(),
                )),
            }
        }
    }
}

/// GET /api/v1/sessions/:id/events
async fn session_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let session = state.sessions().get_session_by_str(&id).await?;
    let updates = session.controller.subscribe();

    // First item is the current view, then one per change
    let stream = futures::stream::unfold((updates, true), |(mut updates, first)| async move {
        if !first && updates.changed().await.is_err() {
            return None;
        }
        let view = updates.borrow_and_update().clone();
        let event = Event::default()
            .event("session")
            .json_data(&view)
            .unwrap_or_else(|_| Event::default().event("session"));
        Some((Ok(event), (updates, false)))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ============================================================================
// Helpers
// ============================================================================

fn check_upload_size(image: &UploadedImage, max: usize) -> std::result::Result<(), SourceError> {
    if image.bytes.is_empty() {
        return Err(SourceError::Empty);
    }
    if image.bytes.len() > max {
        return Err(SourceError::TooLarge {
            size: image.bytes.len(),
            max,
        });
    }
    Ok(())
}
