//! Configuration management for Papermill Server
//!
//! Everything the conversion controller and storage layer need is loaded
//! here and passed in at construction; nothing reads ambient global state
//! after startup, so components run against fake tool paths and fake
//! storage in tests.

use std::env;
use std::time::Duration;

use serde::Deserialize;

use crate::convert::{DEFAULT_JOBS, DEFAULT_LANGUAGE, DEFAULT_TIMEOUT};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub tools: ToolchainConfig,
    pub conversion: ConversionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Custom endpoint for MinIO/R2/B2; unset means AWS S3 proper
    pub endpoint: Option<String>,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
    /// Base for published object URLs; defaults to the virtual-hosted
    /// AWS form when unset
    pub public_base_url: Option<String>,
}

/// External executables the pipeline shells out to. Overridable so tests
/// and odd installs can point at specific binaries.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolchainConfig {
    pub ocrmypdf: String,
    pub qpdf: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            ocrmypdf: "ocrmypdf".to_string(),
            qpdf: "qpdf".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversionConfig {
    /// Language applied when the request names none
    pub default_language: String,
    /// Per-invocation time budget applied when the request names none
    pub default_timeout: Duration,
    /// Parallelism hint applied when the request names none
    pub default_jobs: u32,
    /// Upper bound on simultaneous external conversions; `None`
    /// preserves the historical unbounded behavior
    pub max_concurrent_jobs: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            storage: StorageConfig {
                endpoint: None,
                bucket: "papermill".to_string(),
                access_key: "admin".to_string(),
                secret_key: "password123".to_string(),
                region: Some("us-east-1".to_string()),
                public_base_url: None,
            },
            tools: ToolchainConfig::default(),
            conversion: ConversionConfig {
                default_language: DEFAULT_LANGUAGE.to_string(),
                default_timeout: DEFAULT_TIMEOUT,
                default_jobs: DEFAULT_JOBS,
                max_concurrent_jobs: None,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .unwrap_or(5000),
            },
            storage: StorageConfig {
                endpoint: env::var("S3_ENDPOINT").ok(),
                bucket: env::var("S3_BUCKET")?,
                access_key: env::var("S3_ACCESS_KEY")?,
                secret_key: env::var("S3_SECRET_KEY")?,
                region: env::var("S3_REGION").ok(),
                public_base_url: env::var("S3_PUBLIC_BASE_URL").ok(),
            },
            tools: ToolchainConfig {
                ocrmypdf: env::var("OCRMYPDF_BIN").unwrap_or_else(|_| "ocrmypdf".to_string()),
                qpdf: env::var("QPDF_BIN").unwrap_or_else(|_| "qpdf".to_string()),
            },
            conversion: ConversionConfig {
                default_language: env::var("OCR_DEFAULT_LANGUAGE")
                    .unwrap_or_else(|_| DEFAULT_LANGUAGE.to_string()),
                default_timeout: env::var("OCR_DEFAULT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_TIMEOUT),
                default_jobs: env::var("OCR_DEFAULT_JOBS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_JOBS),
                max_concurrent_jobs: env::var("CONVERSION_MAX_JOBS")
                    .ok()
                    .and_then(|v| v.parse().ok()),
            },
        })
    }
}

/// Resolve the first of several candidate executables on PATH.
pub fn which_any(names: &[&str]) -> Option<std::path::PathBuf> {
    names.iter().find_map(|n| which::which(n).ok())
}

/// External dependencies reported by the health endpoint: resolved path
/// per tool, `None` when not found. Tesseract and ghostscript are
/// transitive dependencies of the conversion tool, probed so operators
/// see a broken install before the first upload does.
pub fn check_dependencies(tools: &ToolchainConfig) -> std::collections::BTreeMap<&'static str, Option<String>> {
    let resolve = |candidates: &[&str]| {
        which_any(candidates).map(|p| p.display().to_string())
    };
    let mut deps = std::collections::BTreeMap::new();
    deps.insert("ocrmypdf", resolve(&[tools.ocrmypdf.as_str()]));
    deps.insert("qpdf", resolve(&[tools.qpdf.as_str()]));
    deps.insert("tesseract", resolve(&["tesseract"]));
    deps.insert("ghostscript", resolve(&["gswin64c", "gswin32c", "gs"]));
    deps
}
