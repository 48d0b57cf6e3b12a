//! Conversion handlers: upload-and-convert, one-shot download.

use super::ProcessResponse;
use crate::api::AppState;
use crate::error::{ApiError, Error};
use crate::utils::attachment_disposition;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
};

/// POST /process - Upload a file and convert it
///
/// Multipart fields: `file` (the image) and `mode` (`compress` or `decompress`).
#[utoipa::path(
    post,
    path = "/api/process",
    tag = "conversions",
    request_body(content = Vec<u8>, description = "Image upload with `file` and `mode` fields (multipart/form-data)", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File converted; download it once from downloadUrl", body = ProcessResponse),
        (status = 400, description = "Missing or empty file, or invalid mode", body = ApiError),
        (status = 413, description = "Upload exceeds the configured size limit"),
        (status = 422, description = "Codec failed or produced no output", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError),
        (status = 503, description = "Codec unavailable or shutting down", body = ApiError),
        (status = 504, description = "Codec timed out", body = ApiError)
    )
)]
pub async fn process_upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut file_content: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut mode: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (e.status(), Json(ApiError::new("invalid_upload", e.body_text())))
                    .into_response();
            }
        };
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                if let Some(filename) = field.file_name() {
                    file_name = Some(filename.to_string());
                }
                match field.bytes().await {
                    Ok(bytes) => file_content = Some(bytes.to_vec()),
                    Err(e) => {
                        return (e.status(), Json(ApiError::new("invalid_upload", e.body_text())))
                            .into_response();
                    }
                }
            }
            "mode" => {
                if let Ok(text) = field.text().await {
                    mode = Some(text);
                }
            }
            _ => {}
        }
    }

    let bytes = match file_content {
        Some(bytes) => bytes,
        None => return ApiError::new("missing_file", "No file uploaded").into_response(),
    };
    if bytes.is_empty() {
        return ApiError::new("empty_file", "Uploaded file is empty").into_response();
    }

    let original_filename = file_name.unwrap_or_else(|| "upload".to_string());
    let mode = mode.unwrap_or_default();

    match state
        .service
        .submit(bytes, &original_filename, &mode)
        .await
    {
        Ok(result) => Json(ProcessResponse::from(&result)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /download/:filename - Download a finished artifact
///
/// Each artifact can be downloaded once; shortly after the transfer ends the
/// file is deleted and the URL answers 404.
#[utoipa::path(
    get,
    path = "/api/download/{filename}",
    tag = "conversions",
    params(
        ("filename" = String, Path, description = "Artifact name from downloadUrl")
    ),
    responses(
        (status = 200, description = "Artifact bytes", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown or already expired artifact", body = ApiError)
    )
)]
pub async fn download_artifact(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, Error> {
    let download = state.service.retrieve(&filename).await?;

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (header::CONTENT_LENGTH, download.len.to_string()),
        (
            header::CONTENT_DISPOSITION,
            attachment_disposition(&download.filename),
        ),
    ];

    Ok((headers, Body::from_stream(download.into_stream())).into_response())
}
