//! Image upload and static serving of stored attachments.

use std::io::ErrorKind;
use std::path::Path as FsPath;

use axum::extract::{Multipart, Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use super::{AppState, Preloaded};
use crate::error::{AppError, AppResult};

/// Multipart field carrying the file.
pub const IMAGE_FIELD: &str = "image";

pub async fn upload_image(
    State(state): State<AppState>,
    Preloaded(animal): Preloaded,
    mut multipart: Multipart,
) -> AppResult<Json<Value>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) { continue; }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let image_url = state.attachments.replace(&animal, &file_name, field).await?;
        return Ok(Json(json!({"imageUrl": image_url})));
    }
    Err(AppError::user("missing_image", format!("multipart field '{}' is required", IMAGE_FIELD)))
}

pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = FsPath::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}

pub async fn serve_image(State(state): State<AppState>, Path(file): Path<String>) -> AppResult<impl IntoResponse> {
    let Some(path) = state.attachments.resolve_file(&file) else {
        return Err(AppError::not_found("image_not_found", format!("no image '{}'", file)));
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(CONTENT_TYPE, content_type_for(&file))], bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::not_found("image_not_found", format!("no image '{}'", file))),
        Err(e) => Err(AppError::storage("attachment_io", format!("read image: {}", e))),
    }
}
