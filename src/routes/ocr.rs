//! OCR Routes
//!
//! HTTP endpoint for the upload-convert-publish flow.
//!
//! Endpoints:
//! - POST /ocr - Upload a PDF, convert it, and return the published URL

use std::collections::HashMap;

use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::config::ConversionConfig;
use crate::convert::{ConversionOptions, ConvertError, OutputKind, ScratchFile};
use crate::state::AppState;
use crate::storage::StorageError;

// ============================================================================
// Error Response
// ============================================================================

/// Request-level errors for the conversion endpoint
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing PDF file (field name: file)")]
    MissingFile,

    #[error("no file selected")]
    NoFileSelected,

    #[error("only PDF files are allowed")]
    InvalidFileType,

    #[error("invalid multipart request: {0}")]
    Multipart(String),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("failed to publish converted document: {0}")]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::MissingFile | Self::NoFileSelected | Self::InvalidFileType => {
                StatusCode::BAD_REQUEST
            }
            Self::Multipart(_) => StatusCode::BAD_REQUEST,
            Self::Convert(e) => e.status_code(),
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
    /// Diagnostic text captured from external tools, preserved whole so
    /// operators can re-run the classifiers on logged output
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let (code, details) = match &self {
            ApiError::MissingFile => ("MISSING_FILE", None),
            ApiError::NoFileSelected => ("NO_FILE_SELECTED", None),
            ApiError::InvalidFileType => ("INVALID_FILE_TYPE", None),
            ApiError::Multipart(_) => ("MULTIPART_ERROR", None),
            ApiError::Convert(e) => match e {
                ConvertError::EncryptedDocument { details } => {
                    ("ENCRYPTED_DOCUMENT", Some(details.clone()))
                }
                ConvertError::DecryptionFailed { details } => {
                    ("DECRYPTION_FAILED", Some(details.clone()))
                }
                ConvertError::ToolMissing(_) => ("TOOL_MISSING", None),
                ConvertError::Timeout(_) => ("CONVERSION_TIMEOUT", None),
                ConvertError::ToolFailure { diagnostics, .. } => {
                    ("CONVERSION_FAILED", Some(diagnostics.clone()))
                }
                ConvertError::Io(_) => ("IO_ERROR", None),
            },
            ApiError::Storage(_) => ("STORAGE_ERROR", None),
            ApiError::Io(_) => ("IO_ERROR", None),
        };

        if status.is_server_error() {
            tracing::error!(code = code, error = %self, "Conversion request failed");
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Create the OCR router
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(convert_document))
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Serialize)]
struct ConvertResponse {
    url: String,
}

/// POST /ocr
///
/// Multipart form: `file` (the PDF), optional `pdf_password`, and the
/// conversion option fields (see `options_from_form`). On success the
/// converted document is published to storage and its URL returned.
async fn convert_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ConvertResponse>, ApiError> {
    let mut file_bytes: Option<axum::body::Bytes> = None;
    let mut file_name = String::new();
    let mut mime_type: Option<String> = None;
    let mut form: HashMap<String, String> = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Multipart(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            file_name = field.file_name().unwrap_or_default().to_string();
            mime_type = field.content_type().map(|s| s.to_string());
            file_bytes = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Multipart(e.to_string()))?,
            );
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::Multipart(e.to_string()))?;
            form.insert(name, value);
        }
    }

    let data = file_bytes.ok_or(ApiError::MissingFile)?;
    if file_name.is_empty() || data.is_empty() {
        return Err(ApiError::NoFileSelected);
    }
    let is_pdf = mime_type.as_deref() == Some("application/pdf")
        || file_name.to_lowercase().ends_with(".pdf");
    if !is_pdf {
        return Err(ApiError::InvalidFileType);
    }

    let options = options_from_form(&form, &state.config().conversion);
    let password = form
        .get("pdf_password")
        .map(String::as_str)
        .filter(|p| !p.is_empty());

    // Uploaded copy lives only for the duration of this request
    let input = ScratchFile::in_temp("upload.pdf");
    tokio::fs::write(input.path(), &data).await?;

    tracing::info!(
        file_name = %file_name,
        size = data.len(),
        output_kind = ?options.output_kind,
        has_password = password.is_some(),
        "Received conversion request"
    );

    // Held for the whole pipeline when admission control is configured
    let _slot = state.acquire_conversion_slot().await;

    let converted = state
        .controller()
        .convert(input.path(), password, &options)
        .await?;

    let output_name = format!("{}_ocr.pdf", sanitize_stem(&file_name));
    let key = format!("ocr_outputs/{}/{}", Uuid::new_v4(), output_name);
    let output_data = tokio::fs::read(converted.path()).await?;

    let stored = state
        .s3_client()
        .put_object(&key, output_data, "application/pdf")
        .await?;

    tracing::info!(
        key = %stored.key,
        size = stored.size,
        attempts = converted.attempts(),
        "Published converted document"
    );

    Ok(Json(ConvertResponse { url: stored.url }))
}

// ============================================================================
// Helpers
// ============================================================================

/// Permissive boolean parsing for form values
fn parse_bool(value: Option<&String>, default: bool) -> bool {
    match value {
        None => default,
        Some(v) => matches!(
            v.trim().to_lowercase().as_str(),
            "true" | "1" | "yes" | "y" | "on"
        ),
    }
}

/// Build a validated options record from the request's form fields,
/// falling back to the configured defaults.
///
/// Fields: `languages` (comma or plus separated), `output_format`
/// (`pdf`|`pdfa`), `optimize_level`, `deskew`, `fast_web_view`,
/// `rotate_pages`, `skip_text`, `redo_ocr`, `force_ocr`,
/// `invalidate_digital_signatures`, `jobs`, `timeout` (seconds).
pub fn options_from_form(
    form: &HashMap<String, String>,
    defaults: &ConversionConfig,
) -> ConversionOptions {
    let languages: Vec<String> = form
        .get("languages")
        .map(|v| {
            v.split(|c| c == ',' || c == '+')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .filter(|langs: &Vec<String>| !langs.is_empty())
        .unwrap_or_else(|| vec![defaults.default_language.clone()]);

    ConversionOptions {
        languages,
        output_kind: OutputKind::parse(form.get("output_format").map(String::as_str)),
        optimize: form
            .get("optimize_level")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0),
        deskew: parse_bool(form.get("deskew"), false),
        fast_web_view: parse_bool(form.get("fast_web_view"), false),
        rotate_pages: parse_bool(form.get("rotate_pages"), false),
        skip_text: parse_bool(form.get("skip_text"), false),
        redo_ocr: parse_bool(form.get("redo_ocr"), false),
        force_ocr: parse_bool(form.get("force_ocr"), false),
        invalidate_signatures: parse_bool(form.get("invalidate_digital_signatures"), false),
        jobs: form
            .get("jobs")
            .and_then(|v| v.trim().parse().ok())
            .filter(|&j| j > 0)
            .unwrap_or(defaults.default_jobs),
        timeout: form
            .get("timeout")
            .and_then(|v| v.trim().parse().ok())
            .filter(|&secs: &u64| secs > 0)
            .map(std::time::Duration::from_secs)
            .unwrap_or(defaults.default_timeout),
    }
}

/// File-system and URL safe stem of an uploaded file name
fn sanitize_stem(file_name: &str) -> String {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _ext)| stem)
        .unwrap_or(file_name);
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}
