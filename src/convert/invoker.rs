//! External tool invocation
//!
//! Runs an external executable with a time budget and captures exit
//! status plus both output streams. A non-zero exit is a normal
//! `ToolOutput`, never an error; only a blown time budget or an
//! unresolvable executable are invocation errors the controller has to
//! branch on.

use std::ffi::OsString;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

use super::types::{ConvertError, ToolOutput};

/// Invocation failure kinds
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("{0} not found on PATH")]
    ToolMissing(String),

    #[error("{program} exceeded its time budget of {budget:?}")]
    Timeout { program: String, budget: Duration },

    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },
}

impl From<InvokeError> for ConvertError {
    fn from(e: InvokeError) -> Self {
        match e {
            InvokeError::ToolMissing(program) => ConvertError::ToolMissing(program),
            InvokeError::Timeout { budget, .. } => ConvertError::Timeout(budget),
            InvokeError::Io { source, .. } => ConvertError::Io(source),
        }
    }
}

/// Abstraction over external tool execution so the conversion controller
/// can be driven by a scripted runner in tests.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `program` with `args`, enforcing `time_budget`. Captures both
    /// streams regardless of exit status.
    async fn run(
        &self,
        program: &str,
        args: &[OsString],
        time_budget: Duration,
    ) -> Result<ToolOutput, InvokeError>;
}

/// Production runner backed by tokio's process support.
#[derive(Debug, Clone, Default)]
pub struct SystemToolRunner;

#[async_trait]
impl ToolRunner for SystemToolRunner {
    async fn run(
        &self,
        program: &str,
        args: &[OsString],
        time_budget: Duration,
    ) -> Result<ToolOutput, InvokeError> {
        let started = Instant::now();

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout must take the process
            // down with it
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InvokeError::ToolMissing(program.to_string())
            } else {
                InvokeError::Io {
                    program: program.to_string(),
                    source: e,
                }
            }
        })?;

        let output = match tokio::time::timeout(time_budget, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| InvokeError::Io {
                program: program.to_string(),
                source: e,
            })?,
            Err(_) => {
                tracing::warn!(
                    program = program,
                    budget_secs = time_budget.as_secs(),
                    "External tool exceeded its time budget, killed"
                );
                return Err(InvokeError::Timeout {
                    program: program.to_string(),
                    budget: time_budget,
                });
            }
        };

        Ok(ToolOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed: started.elapsed(),
        })
    }
}
