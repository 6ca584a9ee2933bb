//! Conversion controller
//!
//! The state machine that sequences one conversion request: encryption
//! preflight, optional decryption, the first conversion attempt, failure
//! classification, and at most one prioritized retry. States are a tagged
//! union driven by a loop so every transition is a single match arm.
//!
//! Retry policy, in priority order over the first attempt's diagnostics:
//! encryption detected is terminal (client error, the preflight was a
//! false negative); an existing text layer earns one retry with forced
//! recognition; an archival-output failure or an unrecognized failure
//! earns one retry with plain PDF output, but only when the caller asked
//! for archival output. The budget is one extra attempt total; a failed
//! retry is never reclassified.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::args::build_args;
use super::classify::classify_failure;
use super::encryption::{decrypt, is_encrypted};
use super::invoker::ToolRunner;
use super::scratch::ScratchFile;
use super::types::{ConversionOptions, ConvertError, FailureCategory, OutputKind};
use crate::config::ToolchainConfig;

/// Which attempt an invocation represents. At most one retry phase is
/// ever entered per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptPhase {
    First,
    RetryForceOcr,
    RetryPlainOutput,
}

impl AttemptPhase {
    fn is_retry(&self) -> bool {
        !matches!(self, Self::First)
    }
}

/// Conversion sequence states
enum State {
    EncryptionCheck,
    Decrypt,
    Attempt {
        options: ConversionOptions,
        phase: AttemptPhase,
    },
}

/// A successfully converted document. Owns the output scratch file; the
/// file is deleted when this value is dropped, so callers publish the
/// bytes before letting go.
#[derive(Debug)]
pub struct ConvertedDocument {
    output: ScratchFile,
    attempts: u32,
}

impl ConvertedDocument {
    pub fn path(&self) -> &Path {
        self.output.path()
    }

    /// Number of conversion invocations it took (1 or 2)
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Sequences classification, decryption, conversion, and retry for one
/// request at a time. Tool locations come in at construction so the
/// whole controller runs against fake tools in tests.
pub struct ConversionController {
    runner: Arc<dyn ToolRunner>,
    tools: ToolchainConfig,
}

impl ConversionController {
    pub fn new(runner: Arc<dyn ToolRunner>, tools: ToolchainConfig) -> Self {
        Self { runner, tools }
    }

    /// Convert one uploaded document.
    ///
    /// All intermediate files (decrypted copy, conversion output) are
    /// scratch guards: they are removed on every exit path, including
    /// timeout and panic unwind.
    pub async fn convert(
        &self,
        input: &Path,
        password: Option<&str>,
        options: &ConversionOptions,
    ) -> Result<ConvertedDocument, ConvertError> {
        let output = ScratchFile::in_temp("ocr.pdf");
        // Held purely for its drop: the plaintext copy must outlive both
        // conversion attempts and vanish on return
        let mut _decrypted: Option<ScratchFile> = None;
        let mut source: PathBuf = input.to_path_buf();
        let mut attempts: u32 = 0;

        let mut state = State::EncryptionCheck;
        loop {
            state = match state {
                State::EncryptionCheck => {
                    if is_encrypted(self.runner.as_ref(), &self.tools.qpdf, &source).await? {
                        if password.is_none() {
                            return Err(ConvertError::EncryptedDocument {
                                details: "encryption reported by preflight check".to_string(),
                            });
                        }
                        State::Decrypt
                    } else {
                        State::Attempt {
                            options: options.clone(),
                            phase: AttemptPhase::First,
                        }
                    }
                }

                State::Decrypt => {
                    // Password presence was checked on the way here
                    let password = password.unwrap_or_default();
                    let plaintext =
                        decrypt(self.runner.as_ref(), &self.tools.qpdf, &source, password).await?;
                    source = plaintext.path().to_path_buf();
                    _decrypted = Some(plaintext);
                    State::Attempt {
                        options: options.clone(),
                        phase: AttemptPhase::First,
                    }
                }

                State::Attempt {
                    options: attempt_options,
                    phase,
                } => {
                    attempts += 1;
                    let args = build_args(&source, output.path(), &attempt_options);
                    tracing::info!(
                        attempt = attempts,
                        retry = phase.is_retry(),
                        tool = %self.tools.ocrmypdf,
                        "Running conversion"
                    );

                    // Timeout and a missing tool are terminal here; they
                    // bypass classification entirely
                    let result = self
                        .runner
                        .run(&self.tools.ocrmypdf, &args, attempt_options.timeout)
                        .await?;

                    if result.success() {
                        return Ok(ConvertedDocument { output, attempts });
                    }

                    if phase.is_retry() {
                        // The retry budget is spent; never reclassify
                        tracing::error!(
                            exit_code = ?result.status,
                            "Conversion retry failed, giving up"
                        );
                        return Err(ConvertError::ToolFailure {
                            exit_code: result.status,
                            diagnostics: result.diagnostics(),
                        });
                    }

                    match classify_failure(&result) {
                        FailureCategory::EncryptionDetected => {
                            // Same client error as the early preflight
                            // failure, never retried
                            return Err(ConvertError::EncryptedDocument {
                                details: result.diagnostics(),
                            });
                        }
                        FailureCategory::AlreadyHasTextLayer => {
                            tracing::info!(
                                "Source already has a text layer; retrying with forced recognition"
                            );
                            State::Attempt {
                                options: attempt_options.with_forced_ocr(),
                                phase: AttemptPhase::RetryForceOcr,
                            }
                        }
                        FailureCategory::OutputFormatUnsupported | FailureCategory::Unclassified
                            if attempt_options.output_kind == OutputKind::Pdfa =>
                        {
                            tracing::info!(
                                "Archival conversion failed; retrying with plain PDF output"
                            );
                            State::Attempt {
                                options: attempt_options.with_plain_output(),
                                phase: AttemptPhase::RetryPlainOutput,
                            }
                        }
                        _ => {
                            tracing::error!(
                                exit_code = ?result.status,
                                "Conversion failed with no applicable retry"
                            );
                            return Err(ConvertError::ToolFailure {
                                exit_code: result.status,
                                diagnostics: result.diagnostics(),
                            });
                        }
                    }
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::invoker::InvokeError;
    use crate::convert::testing::ScriptedRunner;
    use crate::convert::types::ToolOutput;
    use std::time::Duration;

    fn controller(runner: ScriptedRunner) -> ConversionController {
        ConversionController::new(Arc::new(runner), ToolchainConfig::default())
    }

    fn reply(status: i32, stdout: &str, stderr: &str) -> Result<ToolOutput, InvokeError> {
        Ok(ToolOutput {
            status: Some(status),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            elapsed: Duration::from_millis(5),
        })
    }

    fn not_encrypted() -> Result<ToolOutput, InvokeError> {
        reply(0, "no encryption\n", "")
    }

    fn encrypted() -> Result<ToolOutput, InvokeError> {
        reply(0, "R = 6\nkey length: 256\n", "")
    }

    fn args_of(call: &crate::convert::testing::RecordedCall) -> Vec<String> {
        call.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn clean_document_converts_in_one_attempt() {
        let runner = ScriptedRunner::replying(vec![not_encrypted(), reply(0, "", "")]);
        let calls = runner.call_log();
        let controller = controller(runner);

        let converted = controller
            .convert(Path::new("in.pdf"), None, &ConversionOptions::default())
            .await
            .unwrap();

        assert_eq!(converted.attempts(), 1);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].program, "qpdf");
        assert_eq!(calls[1].program, "ocrmypdf");
    }

    #[tokio::test]
    async fn encrypted_without_password_never_reaches_the_converter() {
        let runner = ScriptedRunner::replying(vec![encrypted()]);
        let calls = runner.call_log();
        let controller = controller(runner);

        let result = controller
            .convert(Path::new("in.pdf"), None, &ConversionOptions::default())
            .await;

        assert!(matches!(result, Err(ConvertError::EncryptedDocument { .. })));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1, "only the preflight check may run");
        assert_eq!(calls[0].program, "qpdf");
    }

    #[tokio::test]
    async fn wrong_password_fails_before_any_conversion() {
        let runner = ScriptedRunner::replying(vec![
            encrypted(),
            reply(2, "", "qpdf: invalid password\n"),
        ]);
        let calls = runner.call_log();
        let controller = controller(runner);

        let result = controller
            .convert(
                Path::new("in.pdf"),
                Some("nope"),
                &ConversionOptions::default(),
            )
            .await;

        match result {
            Err(ConvertError::DecryptionFailed { details }) => {
                assert!(details.contains("invalid password"));
            }
            other => panic!("expected DecryptionFailed, got {other:?}"),
        }
        let calls = calls.lock().unwrap();
        assert!(calls.iter().all(|c| c.program == "qpdf"));
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test]
    async fn decrypted_copy_feeds_the_conversion() {
        let runner =
            ScriptedRunner::replying(vec![encrypted(), reply(0, "", ""), reply(0, "", "")]);
        let calls = runner.call_log();
        let controller = controller(runner);

        controller
            .convert(
                Path::new("in.pdf"),
                Some("s3cret"),
                &ConversionOptions::default(),
            )
            .await
            .unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].program, "ocrmypdf");
        let convert_args = args_of(&calls[2]);
        let input_arg = &convert_args[convert_args.len() - 2];
        assert_ne!(input_arg, "in.pdf", "conversion must use the decrypted copy");
        assert!(input_arg.ends_with("decrypted.pdf"));
    }

    #[tokio::test]
    async fn text_layer_failure_retries_once_with_forced_recognition() {
        let runner = ScriptedRunner::replying(vec![
            not_encrypted(),
            reply(6, "", "ERROR: page already has a text layer"),
            reply(0, "", ""),
        ]);
        let calls = runner.call_log();
        let controller = controller(runner);

        let options = ConversionOptions {
            skip_text: true,
            redo_ocr: true,
            ..Default::default()
        };
        let converted = controller
            .convert(Path::new("in.pdf"), None, &options)
            .await
            .unwrap();

        assert_eq!(converted.attempts(), 2);
        let calls = calls.lock().unwrap();
        let retry_args = args_of(&calls[2]);
        assert!(retry_args.contains(&"--force-ocr".to_string()));
        assert!(!retry_args.contains(&"--skip-text".to_string()));
        assert!(!retry_args.contains(&"--redo-ocr".to_string()));
        // Output kind is untouched by this retry shape
        assert!(retry_args.contains(&"pdfa".to_string()));
    }

    #[tokio::test]
    async fn failed_force_ocr_retry_is_terminal() {
        let runner = ScriptedRunner::replying(vec![
            not_encrypted(),
            reply(6, "", "tagged pdf"),
            reply(1, "", "still broken"),
        ]);
        let calls = runner.call_log();
        let controller = controller(runner);

        let result = controller
            .convert(Path::new("in.pdf"), None, &ConversionOptions::default())
            .await;

        match result {
            Err(ConvertError::ToolFailure { diagnostics, .. }) => {
                // Carries the retry's diagnostics, not the first attempt's
                assert!(diagnostics.contains("still broken"));
            }
            other => panic!("expected ToolFailure, got {other:?}"),
        }
        // One preflight + exactly two conversion attempts, never a third
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unclassified_archival_failure_retries_with_plain_output() {
        let runner = ScriptedRunner::replying(vec![
            not_encrypted(),
            reply(1, "", "some inscrutable failure"),
            reply(1, "", "plain retry also failed"),
        ]);
        let calls = runner.call_log();
        let controller = controller(runner);

        let result = controller
            .convert(Path::new("in.pdf"), None, &ConversionOptions::default())
            .await;

        assert!(matches!(result, Err(ConvertError::ToolFailure { .. })));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        let retry_args = args_of(&calls[2]);
        let idx = retry_args.iter().position(|a| a == "--output-type").unwrap();
        assert_eq!(retry_args[idx + 1], "pdf");
    }

    #[tokio::test]
    async fn unclassified_plain_failure_has_no_retry_path() {
        let runner = ScriptedRunner::replying(vec![
            not_encrypted(),
            reply(1, "mystery", "failure"),
        ]);
        let calls = runner.call_log();
        let controller = controller(runner);

        let options = ConversionOptions {
            output_kind: OutputKind::Pdf,
            ..Default::default()
        };
        let result = controller.convert(Path::new("in.pdf"), None, &options).await;

        match result {
            Err(ConvertError::ToolFailure { diagnostics, .. }) => {
                assert!(diagnostics.contains("mystery"));
            }
            other => panic!("expected ToolFailure, got {other:?}"),
        }
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn late_encryption_detection_is_a_client_error_without_retry() {
        let runner = ScriptedRunner::replying(vec![
            not_encrypted(),
            reply(1, "", "EncryptedPdfError: password required"),
        ]);
        let calls = runner.call_log();
        let controller = controller(runner);

        let result = controller
            .convert(Path::new("in.pdf"), None, &ConversionOptions::default())
            .await;

        assert!(matches!(result, Err(ConvertError::EncryptedDocument { .. })));
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn timeout_bypasses_classification_and_retry() {
        let runner = ScriptedRunner::replying(vec![
            not_encrypted(),
            Err(InvokeError::Timeout {
                program: "ocrmypdf".to_string(),
                budget: Duration::from_secs(600),
            }),
        ]);
        let calls = runner.call_log();
        let controller = controller(runner);

        let result = controller
            .convert(Path::new("in.pdf"), None, &ConversionOptions::default())
            .await;

        assert!(matches!(result, Err(ConvertError::Timeout(_))));
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_converter_is_terminal() {
        let runner = ScriptedRunner::replying(vec![
            not_encrypted(),
            Err(InvokeError::ToolMissing("ocrmypdf".to_string())),
        ]);
        let controller = controller(runner);

        let result = controller
            .convert(Path::new("in.pdf"), None, &ConversionOptions::default())
            .await;

        assert!(matches!(result, Err(ConvertError::ToolMissing(_))));
    }

    #[tokio::test]
    async fn caller_options_survive_the_retry() {
        let runner = ScriptedRunner::replying(vec![
            not_encrypted(),
            reply(6, "", "already has a text layer"),
            reply(0, "", ""),
        ]);
        let controller = controller(runner);

        let options = ConversionOptions {
            skip_text: true,
            ..Default::default()
        };
        controller
            .convert(Path::new("in.pdf"), None, &options)
            .await
            .unwrap();

        // Copy-with-override: the caller's record is never mutated
        assert!(options.skip_text);
        assert!(!options.force_ocr);
    }
}
