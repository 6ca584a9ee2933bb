//! Encryption preflight and decryption
//!
//! Both operations shell out to qpdf. The preflight check is a heuristic
//! text classifier over `--show-encryption` output, not a structural PDF
//! parse; diagnostic wording varies between qpdf versions, so false
//! negatives are possible. That is acceptable because the first
//! conversion attempt independently surfaces encryption through its own
//! failure text (see the classification policy).

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use super::invoker::{InvokeError, ToolRunner};
use super::scratch::ScratchFile;
use super::types::ConvertError;

/// Time budget for the `--show-encryption` diagnostic call
const SHOW_ENCRYPTION_BUDGET: Duration = Duration::from_secs(60);

/// Time budget for a decrypt run; qpdf rewrites the whole file
const DECRYPT_BUDGET: Duration = Duration::from_secs(300);

/// Substrings whose presence in the diagnostic output marks the document
/// as encrypted: a generic encryption marker, the AES cipher, the
/// encryption revision ("R = n"), and the key length line.
pub const ENCRYPTION_MARKERS: &[&str] = &["encryption", "aes", "r =", "key length"];

/// Check whether a document is password-protected.
///
/// Returns `false` only when the diagnostic output unambiguously states
/// no encryption is present. When qpdf itself cannot be located this
/// fails open and returns `false`: the conversion attempt that follows
/// re-checks encryption through its failure path.
pub async fn is_encrypted(
    runner: &dyn ToolRunner,
    qpdf: &str,
    document: &Path,
) -> Result<bool, ConvertError> {
    let args: Vec<OsString> = vec!["--show-encryption".into(), document.as_os_str().into()];

    let output = match runner.run(qpdf, &args, SHOW_ENCRYPTION_BUDGET).await {
        Ok(output) => output,
        Err(InvokeError::ToolMissing(program)) => {
            tracing::warn!(
                program = %program,
                "Encryption preflight tool not found; assuming unencrypted"
            );
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    let diagnostics = output.diagnostics().to_lowercase();
    if diagnostics.contains("no encryption") {
        return Ok(false);
    }
    Ok(ENCRYPTION_MARKERS.iter().any(|m| diagnostics.contains(m)))
}

/// Remove password protection, writing a plaintext copy to a fresh
/// scratch path.
///
/// A non-zero exit is a client error (bad password or corrupt file)
/// carrying the tool's stderr. The scratch guard owns whatever qpdf may
/// have written, so a failed decrypt leaves nothing behind.
pub async fn decrypt(
    runner: &dyn ToolRunner,
    qpdf: &str,
    document: &Path,
    password: &str,
) -> Result<ScratchFile, ConvertError> {
    let scratch = ScratchFile::in_temp("decrypted.pdf");

    let args: Vec<OsString> = vec![
        format!("--password={password}").into(),
        "--decrypt".into(),
        document.as_os_str().into(),
        scratch.path().as_os_str().into(),
    ];

    tracing::info!(input = %document.display(), "Decrypting document with qpdf");

    let output = runner.run(qpdf, &args, DECRYPT_BUDGET).await?;
    if !output.success() {
        return Err(ConvertError::DecryptionFailed {
            details: output.stderr.trim().to_string(),
        });
    }

    Ok(scratch)
}
