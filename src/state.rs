//! Application state management

use std::sync::Arc;

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::config::Config;
use crate::convert::{ConversionController, SystemToolRunner};
use crate::storage::S3Client;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    s3_client: S3Client,
    controller: ConversionController,
    /// Admission control for external conversions; `None` leaves
    /// concurrency bounded only by host capacity
    admission: Option<Semaphore>,
}

impl AppState {
    /// Create a new application state wired to the real toolchain
    pub fn new(config: Config, s3_client: S3Client) -> Self {
        let controller =
            ConversionController::new(Arc::new(SystemToolRunner), config.tools.clone());
        let admission = config.conversion.max_concurrent_jobs.map(Semaphore::new);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                s3_client,
                controller,
                admission,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the S3 client
    pub fn s3_client(&self) -> &S3Client {
        &self.inner.s3_client
    }

    /// Get the conversion controller
    pub fn controller(&self) -> &ConversionController {
        &self.inner.controller
    }

    /// Wait for a conversion slot when admission control is configured.
    /// The permit is held for the duration of the request's pipeline.
    pub async fn acquire_conversion_slot(&self) -> Option<SemaphorePermit<'_>> {
        match &self.inner.admission {
            // The semaphore is never closed, so acquire cannot fail
            Some(semaphore) => semaphore.acquire().await.ok(),
            None => None,
        }
    }
}
