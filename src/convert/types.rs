//! Conversion types
//!
//! Data model for the OCR conversion pipeline: caller options, captured
//! tool output, failure categories, and the conversion error taxonomy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Default recognition language when none is requested
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Default time budget for one conversion attempt
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default worker count passed to the conversion tool
pub const DEFAULT_JOBS: u32 = 4;

/// Optimization levels the conversion tool accepts; anything else is
/// silently omitted from the invocation rather than rejected
pub const VALID_OPTIMIZE_LEVELS: std::ops::RangeInclusive<u32> = 0..=3;

// ============================================================================
// Options
// ============================================================================

/// Output kind for the converted document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Plain PDF, no long-term format guarantees
    Pdf,
    /// PDF/A, the archival default
    Pdfa,
}

impl Default for OutputKind {
    fn default() -> Self {
        Self::Pdfa
    }
}

impl OutputKind {
    /// Permissive parse: unset defaults to archival, anything that is not
    /// "pdfa" (case-insensitive) falls back to plain PDF.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None => Self::Pdfa,
            Some(v) if v.trim().eq_ignore_ascii_case("pdfa") => Self::Pdfa,
            Some(_) => Self::Pdf,
        }
    }

    /// Flag value passed to the conversion tool
    pub fn as_flag_value(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Pdfa => "pdfa",
        }
    }
}

/// A validated, immutable options record for one conversion request.
///
/// Retries never mutate an existing record; they build a new one via the
/// `with_*` constructors so the caller's original survives for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Recognition languages, in caller order (joined with `+` on the argv)
    pub languages: Vec<String>,
    /// Requested output kind
    pub output_kind: OutputKind,
    /// Optimization level; only 0..=3 is forwarded to the tool
    pub optimize: u32,
    pub deskew: bool,
    pub fast_web_view: bool,
    pub rotate_pages: bool,
    /// Skip pages that already carry text
    pub skip_text: bool,
    /// Re-run recognition over existing text
    pub redo_ocr: bool,
    /// Overwrite any existing text layer
    pub force_ocr: bool,
    pub invalidate_signatures: bool,
    /// Parallelism hint for the conversion tool
    pub jobs: u32,
    /// Time budget for one invocation
    pub timeout: Duration,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            languages: vec![DEFAULT_LANGUAGE.to_string()],
            output_kind: OutputKind::default(),
            optimize: 0,
            deskew: false,
            fast_web_view: false,
            rotate_pages: false,
            skip_text: false,
            redo_ocr: false,
            force_ocr: false,
            invalidate_signatures: false,
            jobs: DEFAULT_JOBS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ConversionOptions {
    /// Retry shape for a document that already carries a text layer:
    /// clear the skip/redo flags and force recognition, whatever the
    /// caller originally asked for.
    pub fn with_forced_ocr(&self) -> Self {
        Self {
            skip_text: false,
            redo_ocr: false,
            force_ocr: true,
            ..self.clone()
        }
    }

    /// Retry shape for an archival conversion that failed for no
    /// recognizable reason: drop down to plain PDF output.
    pub fn with_plain_output(&self) -> Self {
        Self {
            output_kind: OutputKind::Pdf,
            ..self.clone()
        }
    }
}

// ============================================================================
// Tool output
// ============================================================================

/// Captured result of one external tool invocation.
///
/// Produced once per call and never mutated. A non-zero exit status is a
/// normal value here, not an error; only timeouts and unresolvable
/// executables are invocation errors (see `InvokeError`).
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Combined stdout + stderr, the sole signal for failure
    /// classification. Never truncated.
    pub fn diagnostics(&self) -> String {
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        text.push_str(&self.stdout);
        if !self.stdout.is_empty() && !self.stderr.is_empty() {
            text.push(' ');
        }
        text.push_str(&self.stderr);
        text
    }
}

// ============================================================================
// Failure categories
// ============================================================================

/// Category assigned to a failed conversion attempt.
///
/// Derived purely from text pattern matching over the attempt's combined
/// diagnostics, never from the exit code alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// The tool reports the document is encrypted (the preflight check
    /// was a false negative)
    EncryptionDetected,
    /// The source already carries a machine-readable text layer
    AlreadyHasTextLayer,
    /// The archival output pipeline itself failed
    OutputFormatUnsupported,
    /// No recognizable signature in the diagnostics
    Unclassified,
}

// ============================================================================
// Error types
// ============================================================================

/// Conversion error taxonomy
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("document is encrypted; supply a password or decrypt it before uploading")]
    EncryptedDocument {
        /// Diagnostic text from the tool that detected the encryption
        details: String,
    },

    #[error("failed to decrypt document")]
    DecryptionFailed {
        /// The decrypt tool's stderr, surfaced to the caller
        details: String,
    },

    #[error("required tool not found on PATH: {0}")]
    ToolMissing(String),

    #[error("conversion timed out after {0:?}")]
    Timeout(Duration),

    #[error("conversion failed (exit code {exit_code:?})")]
    ToolFailure {
        exit_code: Option<i32>,
        /// Full diagnostics from the final failed attempt
        diagnostics: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            // Client errors: resolved at the boundary, never retried
            Self::EncryptedDocument { .. } => StatusCode::BAD_REQUEST,
            Self::DecryptionFailed { .. } => StatusCode::BAD_REQUEST,
            // Server-side faults
            Self::ToolMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::ToolFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
