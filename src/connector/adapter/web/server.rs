use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::connector::api::Container;
use crate::domain::{DomainError, TranscribeRequest, TranscriptionArtifacts};

use super::output::TranscribeOutput;
use super::page;

/// Default request body cap; larger uploads are answered with 413.
pub const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

/// Error surfaced to HTTP clients as a status code and a plain-text message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        let status = match &error {
            DomainError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DomainError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Request failed: {}", error);
        }
        Self::new(status, error.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(error: std::io::Error) -> Self {
        DomainError::from(error).into()
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        Self::new(error.status(), error.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

/// Multipart form contents, staged on disk for the lifetime of the request.
struct Upload {
    _dir: TempDir,
    path: Option<PathBuf>,
    musicxml: bool,
}

impl Upload {
    fn request(&self) -> TranscribeRequest {
        match &self.path {
            Some(path) => TranscribeRequest::new(path).with_musicxml(self.musicxml),
            None => TranscribeRequest::empty(),
        }
    }
}

/// Reduces a client-supplied file name to a safe single path component.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(|c| matches!(c, '/' | '\\' | '"'))
        && !name.contains("..")
        && !name.chars().any(char::is_control)
}

fn content_type(name: &str) -> &'static str {
    match name.rsplit('.').next() {
        Some("mid") | Some("midi") => "audio/midi",
        Some("musicxml") => "application/vnd.recordare.musicxml+xml",
        Some("html") => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn form_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "on" | "true" | "1" | "yes"
    )
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let dir = tempfile::tempdir()?;
    let mut path = None;
    let mut musicxml = false;

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("audio") => {
                let Some(file_name) = field.file_name().and_then(sanitize_file_name) else {
                    continue;
                };
                let target = dir.path().join(&file_name);
                let mut file = tokio::fs::File::create(&target).await?;
                let mut written = 0usize;
                while let Some(chunk) = field.chunk().await? {
                    file.write_all(&chunk).await?;
                    written += chunk.len();
                }
                file.flush().await?;

                debug!("Received upload {} ({} bytes)", file_name, written);
                if written > 0 {
                    path = Some(target);
                }
            }
            Some("musicxml") => {
                let value = field.text().await?;
                musicxml = form_flag(&value);
            }
            _ => {}
        }
    }

    Ok(Upload {
        _dir: dir,
        path,
        musicxml,
    })
}

async fn run_transcription(
    container: &Container,
    multipart: Multipart,
) -> Result<(TranscriptionArtifacts, Option<String>), ApiError> {
    let upload = read_upload(multipart).await?;
    let request = upload.request();

    // Reject empty forms before the model is loaded.
    if request.audio_path().is_none() {
        return Err(DomainError::invalid_input("No file provided").into());
    }

    let use_case = container.transcribe_use_case().await?;
    let artifacts = use_case.execute(&request).await?;
    let score_html = artifacts
        .musicxml()
        .map(|document| container.renderer().render(document));

    Ok((artifacts, score_html))
}

async fn index() -> Html<String> {
    Html(page::index())
}

async fn health() -> &'static str {
    "ok"
}

async fn transcribe_page(
    State(container): State<Arc<Container>>,
    multipart: Multipart,
) -> Result<Html<String>, ApiError> {
    let (artifacts, score_html) = run_transcription(&container, multipart).await?;
    Ok(Html(page::result(&artifacts, score_html.as_deref())))
}

async fn transcribe_api(
    State(container): State<Arc<Container>>,
    multipart: Multipart,
) -> Result<Json<TranscribeOutput>, ApiError> {
    let (artifacts, score_html) = run_transcription(&container, multipart).await?;
    Ok(Json(TranscribeOutput::new(&artifacts, score_html)))
}

async fn download(
    State(container): State<Arc<Container>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    if !is_safe_file_name(&name) {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Invalid file name"));
    }

    let path = container.output_dir().join(&name);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DomainError::not_found(format!("File not found: {}", name)).into())
        }
        Err(e) => return Err(e.into()),
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type(&name).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// HTTP front end: upload form, transcription endpoints and artifact downloads.
#[derive(Clone)]
pub struct PianoscribeWebServer {
    container: Arc<Container>,
    upload_limit: usize,
}

impl PianoscribeWebServer {
    pub fn new(container: Arc<Container>) -> Self {
        Self {
            container,
            upload_limit: MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_upload_limit(mut self, bytes: usize) -> Self {
        self.upload_limit = bytes;
        self
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(index))
            .route("/transcribe", post(transcribe_page))
            .route("/api/transcribe", post(transcribe_api))
            .route("/files/{name}", get(download))
            .route("/health", get(health))
            .layer(DefaultBodyLimit::max(self.upload_limit))
            .with_state(self.container.clone())
    }

    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening on http://{}", listener.local_addr()?);
        info!(
            "Artifacts are written to {}",
            self.container.output_dir().display()
        );

        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}
