use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use utoipa::ToSchema;

use super::error::{AppError, ErrorBody};
use super::AppContext;
use crate::error::Error;
use crate::orchestrator::{new_request_id, MediaInfo, ProcessResponse, StagedInput};

/// Routes behind the API key.
pub fn protected_routes() -> Router<AppContext> {
    Router::new()
        .route("/process", post(process))
        .route("/download/*filename", get(download))
        .route("/info/*filename", get(info))
}

/// Routes open to everyone.
pub fn public_routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/tools", get(get_tools))
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Serialize, ToSchema)]
pub struct ToolStatusResponse {
    pub name: String,
    pub available: bool,
    pub version: Option<String>,
    pub path: Option<String>,
}

/// Multipart form accepted by `/process`.
#[derive(ToSchema)]
pub struct ProcessForm {
    /// The video to edit.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// JSON action list, `{"actions": [...]}` or a bare array.
    pub actions: String,
    /// Where to write the result, relative to the output directory.
    pub output_path: Option<String>,
}

/// Uploads must be declared as video. Clients that send no type or the
/// generic `application/octet-stream` are let through.
fn check_video_type(content_type: Option<&str>) -> Result<(), Error> {
    match content_type {
        None => Ok(()),
        Some(ct) => {
            let essence = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            if essence.starts_with("video/") || essence == "application/octet-stream" {
                Ok(())
            } else {
                Err(Error::BadRequest(
                    "Invalid file type. Only video files are allowed.".to_string(),
                ))
            }
        }
    }
}

fn multipart_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge(e.body_text())
    } else {
        Error::BadRequest(e.body_text())
    }
}

/// Edit an uploaded video.
#[utoipa::path(
    post,
    path = "/process",
    tag = "processing",
    request_body(content = ProcessForm, content_type = "multipart/form-data"),
    params(
        ("X-API-Key" = Option<String>, Header, description = "Required when an API key is configured")
    ),
    responses(
        (status = 200, description = "Video processed", body = ProcessResponse),
        (status = 400, description = "Malformed request, non-video upload or bad action list", body = ErrorBody),
        (status = 401, description = "Invalid API key", body = ErrorBody),
        (status = 413, description = "Upload too large", body = ErrorBody),
        (status = 500, description = "Processing failed", body = ErrorBody),
        (status = 502, description = "ffmpeg failed or timed out", body = ErrorBody)
    )
)]
pub async fn process(
    State(ctx): State<AppContext>,
    multipart: Multipart,
) -> Result<Json<ProcessResponse>, AppError> {
    let request_id = new_request_id();
    handle_process(&ctx, &request_id, multipart)
        .await
        .map(Json)
        .map_err(|e| AppError::new(e).with_request_id(request_id))
}

async fn handle_process(
    ctx: &AppContext,
    request_id: &str,
    mut multipart: Multipart,
) -> Result<ProcessResponse, Error> {
    let mut staged: Option<StagedInput> = None;
    let mut actions: Option<String> = None;
    let mut output_path: Option<String> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if staged.is_some() {
                    return Err(Error::BadRequest("duplicate 'file' field".to_string()));
                }
                check_video_type(field.content_type())?;
                let filename = field.file_name().map(str::to_string);
                let (input, mut file) = ctx
                    .orchestrator
                    .stage(request_id, filename.as_deref())
                    .await?;
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    file.write_all(&chunk).await?;
                }
                file.flush().await?;
                staged = Some(input);
            }
            "actions" => actions = Some(field.text().await.map_err(multipart_error)?),
            "output_path" => output_path = Some(field.text().await.map_err(multipart_error)?),
            other => tracing::debug!("Ignoring multipart field '{}'", other),
        }
    }

    let staged = staged.ok_or_else(|| Error::BadRequest("missing 'file' field".to_string()))?;
    let actions =
        actions.ok_or_else(|| Error::BadRequest("missing 'actions' field".to_string()))?;

    ctx.orchestrator
        .process(staged, &actions, output_path.as_deref())
        .await
}

/// Download an edited file from the output directory.
#[utoipa::path(
    get,
    path = "/download/{filename}",
    tag = "processing",
    params(
        ("filename" = String, Path, description = "The `filename` returned by /process"),
        ("X-API-Key" = Option<String>, Header, description = "Required when an API key is configured")
    ),
    responses(
        (status = 200, description = "The file, as video/mp4 attachment"),
        (status = 400, description = "Not a plain relative path", body = ErrorBody),
        (status = 401, description = "Invalid API key", body = ErrorBody),
        (status = 404, description = "File not found", body = ErrorBody)
    )
)]
pub async fn download(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let path = ctx.orchestrator.output_file(&filename)?;

    let file = tokio::fs::File::open(&path).await?;
    let len = file.metadata().await?.len();
    let body = Body::from_stream(ReaderStream::new(file));

    let base = filename.rsplit('/').next().unwrap_or(&filename);
    let disposition = format!(
        "attachment; filename=\"{}\"",
        base.replace(['"', '\\'], "_")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// Size, duration, bitrate and audio of an edited file.
#[utoipa::path(
    get,
    path = "/info/{filename}",
    tag = "processing",
    params(
        ("filename" = String, Path, description = "The `filename` returned by /process"),
        ("X-API-Key" = Option<String>, Header, description = "Required when an API key is configured")
    ),
    responses(
        (status = 200, description = "Media details", body = MediaInfo),
        (status = 400, description = "Not a plain relative path", body = ErrorBody),
        (status = 401, description = "Invalid API key", body = ErrorBody),
        (status = 404, description = "File not found", body = ErrorBody),
        (status = 502, description = "ffprobe failed", body = ErrorBody)
    )
)]
pub async fn info(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
) -> Result<Json<MediaInfo>, AppError> {
    Ok(Json(ctx.orchestrator.info(&filename).await?))
}

/// Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "Video Processing Engine".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Availability of ffmpeg and ffprobe.
#[utoipa::path(
    get,
    path = "/tools",
    tag = "tools",
    responses(
        (status = 200, description = "Tool status", body = Vec<ToolStatusResponse>)
    )
)]
pub async fn get_tools(State(ctx): State<AppContext>) -> Result<Json<Vec<ToolStatusResponse>>, AppError> {
    let tools = ctx.orchestrator.tools().clone();
    let infos = tokio::task::spawn_blocking(move || tools.check_all())
        .await
        .map_err(|e| Error::Internal(format!("tool check panicked: {e}")))?;

    let response = infos
        .into_iter()
        .map(|t| ToolStatusResponse {
            name: t.name,
            available: t.available,
            version: t.version,
            path: t.path.map(|p| p.display().to_string()),
        })
        .collect();
    Ok(Json(response))
}
