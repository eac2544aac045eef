use std::fs;
use std::path::Path;

use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::recon::{reconcile_files, InputPaths, Reconciliation, Region, RegionProfile};
use crate::report::{write_report, XLSX_CONTENT_TYPE};
use crate::server::AppState;

const ALLOWED_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("invalid upload: {0}")]
    Upload(#[from] MultipartError),
    #[error("analysis failed: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("analysis failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("analysis failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upload(err) => err.status(),
            Self::Pipeline(_) | Self::Io(_) | Self::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(%status, "{message}");
        } else {
            tracing::warn!(%status, "{message}");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Raw multipart fields of one analysis request.
#[derive(Debug, Default)]
pub struct Upload {
    pub orders: Vec<UploadedFile>,
    pub settlements: Vec<UploadedFile>,
    pub consumption: Vec<UploadedFile>,
    pub region: Option<String>,
}

/// A validated upload bound to its region profile.
#[derive(Debug)]
pub struct Job {
    pub profile: RegionProfile,
    pub upload: Upload,
}

pub async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "analysis_type" | "region" => upload.region = Some(field.text().await?),
            "orders" | "settlements" | "consumption" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                // Browsers send an empty part for an untouched file input.
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                let file = UploadedFile { file_name, bytes };
                match name.as_str() {
                    "orders" => upload.orders.push(file),
                    "settlements" => upload.settlements.push(file),
                    _ => upload.consumption.push(file),
                }
            }
            _ => {}
        }
    }
    Ok(upload)
}

fn has_allowed_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

impl Job {
    pub fn validate(upload: Upload, state: &AppState) -> Result<Self, ApiError> {
        let region: Region = upload
            .region
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(ApiError::BadRequest)?;

        if upload.orders.is_empty() {
            return Err(ApiError::BadRequest("at least one orders file is required".into()));
        }
        if upload.settlements.is_empty() {
            return Err(ApiError::BadRequest(
                "at least one settlements file is required".into(),
            ));
        }
        if upload.consumption.len() != 1 {
            return Err(ApiError::BadRequest(format!(
                "exactly one consumption file is required, got {}",
                upload.consumption.len()
            )));
        }

        let all_files = upload
            .orders
            .iter()
            .chain(&upload.settlements)
            .chain(&upload.consumption);
        for file in all_files {
            if !has_allowed_extension(&file.file_name) {
                return Err(ApiError::BadRequest(format!(
                    "unsupported file type '{}': only .xlsx and .xls are accepted",
                    file.file_name
                )));
            }
        }

        Ok(Self {
            profile: state.profiles.get(region).clone(),
            upload,
        })
    }

    /// Writes the uploads into `dir` under indexed, sanitized names.
    pub fn stage(&self, dir: &Path) -> std::io::Result<InputPaths> {
        let write = |prefix: &str, index: usize, file: &UploadedFile| {
            let path = dir.join(format!("{prefix}_{index}_{}", sanitize(&file.file_name)));
            fs::write(&path, &file.bytes).map(|()| path)
        };

        let orders = self
            .upload
            .orders
            .iter()
            .enumerate()
            .map(|(i, f)| write("order", i, f))
            .collect::<std::io::Result<Vec<_>>>()?;
        let settlements = self
            .upload
            .settlements
            .iter()
            .enumerate()
            .map(|(i, f)| write("settlement", i, f))
            .collect::<std::io::Result<Vec<_>>>()?;
        let consumption = match self.upload.consumption.first() {
            Some(file) => write("consumption", 0, file)?,
            None => dir.join("consumption_missing.xlsx"),
        };

        Ok(InputPaths {
            orders,
            settlements,
            consumption,
        })
    }

    /// Stages the files in a scratch directory and reconciles them. The directory is
    /// removed when the returned guard drops.
    fn run(&self) -> Result<(Reconciliation, tempfile::TempDir), ApiError> {
        let dir = tempfile::tempdir()?;
        let paths = self.stage(dir.path())?;
        let recon = reconcile_files(&self.profile, &paths)?;
        Ok((recon, dir))
    }
}

/// Keeps ASCII letters, digits, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "skuledger",
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": state.started_at.to_rfc3339(),
    }))
}

pub async fn process(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("process", %request_id);

    async move {
        let job = Job::validate(read_upload(multipart).await?, &state)?;
        let download_name = job.profile.report.download_name.clone();
        tracing::info!(
            region = %job.profile.region,
            orders = job.upload.orders.len(),
            settlements = job.upload.settlements.len(),
            "analysis requested"
        );

        let span = tracing::Span::current();
        let bytes = tokio::task::spawn_blocking(move || {
            span.in_scope(|| -> Result<Vec<u8>, ApiError> {
                let (recon, dir) = job.run()?;
                let out = dir.path().join(&job.profile.report.download_name);
                write_report(&recon, &job.profile, &out)?;
                Ok(fs::read(&out)?)
            })
        })
        .await??;

        let disposition = format!("attachment; filename=\"{download_name}\"");
        Ok((
            [
                (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            bytes,
        )
            .into_response())
    }
    .instrument(span)
    .await
}

pub async fn process_dashboard(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("process_dashboard", %request_id);

    async move {
        let job = Job::validate(read_upload(multipart).await?, &state)?;
        if job.profile.region != Region::Indonesia {
            return Err(ApiError::BadRequest(format!(
                "dashboard data is only available for indonesia, not {}",
                job.profile.region
            )));
        }

        let span = tracing::Span::current();
        let recon = tokio::task::spawn_blocking(move || {
            span.in_scope(|| job.run().map(|(recon, _dir)| recon))
        })
        .await??;

        Ok(Json(json!({ "data": recon.skus })).into_response())
    }
    .instrument(span)
    .await
}
