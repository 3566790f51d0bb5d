//! Standalone WebP conversion service.
//!
//! Routes:
//! - `POST /convert-base64` takes `{"imageData": "<data URI>"}` and answers
//!   with an embedded WebP data URI.
//! - `POST /convert-file` takes a multipart upload in the `image` field,
//!   stores `<uuid>.webp` in the output directory and answers with its URL.
//! - `GET /converted-images/:name` serves stored files.

use crate::image::webp::{encode_webp, WebpOptions};
use crate::models::ImageReference;
use crate::{Error, Result};
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

/// Request body cap for both conversion routes.
pub const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

pub const CONVERTED_PREFIX: &str = "/converted-images";

#[derive(Clone)]
struct ServerState {
    output_dir: Arc<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConvertBase64Request {
    image_data: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConvertBase64Response {
    success: bool,
    webp_image: String,
}

#[derive(Debug, Serialize)]
struct ConvertFileResponse {
    url: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

// Extractor rejections keep their status but answer in the JSON error shape.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected JSON body: {}", rejection.body_text());
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        debug!("Rejected multipart body: {}", rejection.body_text());
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub fn router(output_dir: PathBuf) -> Router {
    let state = ServerState {
        output_dir: Arc::new(output_dir),
    };

    Router::new()
        .route("/convert-base64", post(convert_base64))
        .route("/convert-file", post(convert_file))
        .route("/converted-images/:name", get(serve_converted))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve on an already-bound listener. Creates `output_dir` first.
pub async fn serve(listener: TcpListener, output_dir: PathBuf) -> Result<()> {
    tokio::fs::create_dir_all(&output_dir).await?;

    info!(
        "WebP converter listening on {} (output: {})",
        listener.local_addr()?,
        output_dir.display()
    );

    axum::serve(listener, router(output_dir)).await?;
    Ok(())
}

pub async fn run(port: u16, output_dir: PathBuf) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    serve(listener, output_dir).await
}

async fn encode_off_thread(bytes: Vec<u8>, options: WebpOptions) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || encode_webp(&bytes, options))
        .await
        .map_err(|e| Error::Invariant(format!("WebP encoding task join error: {}", e)))?
}

async fn convert_base64(
    request: std::result::Result<Json<ConvertBase64Request>, JsonRejection>,
) -> std::result::Result<Json<ConvertBase64Response>, ApiError> {
    let Json(request) = request?;
    let image_data = request
        .image_data
        .filter(|data| !data.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("No image data provided"))?;

    let (mime, bytes) = ImageReference::new(image_data)
        .decode_data_uri()
        .map_err(|e| {
            debug!("Rejected base64 payload: {}", e);
            ApiError::bad_request("Invalid base64 image format")
        })?;
    debug!("Converting {} bytes of {} to WebP", bytes.len(), mime);

    let webp = encode_off_thread(bytes, WebpOptions::photo())
        .await
        .map_err(|e| {
            warn!("Base64 conversion failed: {}", e);
            ApiError::internal(format!("Conversion failed: {}", e))
        })?;

    Ok(Json(ConvertBase64Response {
        success: true,
        webp_image: ImageReference::from_bytes("image/webp", &webp).into_inner(),
    }))
}

async fn convert_file(
    State(state): State<ServerState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<ConvertFileResponse>, ApiError> {
    let mut multipart = multipart?;
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if field.name() == Some(crate::image::remote::UPLOAD_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(e.to_string()))?;
            upload = Some(bytes.to_vec());
            break;
        }
    }
    let upload = upload.ok_or_else(|| ApiError::bad_request("No image file provided"))?;

    let file_name = format!("{}.webp", uuid::Uuid::new_v4());
    store_upload(&state, upload, &file_name).await.map_err(|e| {
        error!("File conversion failed: {}", e);
        ApiError::internal("Failed to convert image")
    })?;

    info!("Stored converted image {}", file_name);
    Ok(Json(ConvertFileResponse {
        url: format!("{}/{}", CONVERTED_PREFIX, file_name),
    }))
}

async fn store_upload(state: &ServerState, upload: Vec<u8>, file_name: &str) -> Result<()> {
    let webp = encode_off_thread(upload, WebpOptions::upload()).await?;
    tokio::fs::write(state.output_dir.join(file_name), webp).await?;
    Ok(())
}

async fn serve_converted(
    State(state): State<ServerState>,
    Path(name): Path<String>,
) -> Response {
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return StatusCode::NOT_FOUND.into_response();
    }

    match tokio::fs::read(state.output_dir.join(&name)).await {
        Ok(bytes) => {
            let content_type = if name.ends_with(".webp") {
                "image/webp"
            } else {
                "application/octet-stream"
            };
            ([(CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}
