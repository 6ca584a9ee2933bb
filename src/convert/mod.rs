//! OCR conversion pipeline
//!
//! Control core for turning an uploaded PDF into a text-searchable one:
//! classify the document's encryption state, decrypt when a password is
//! supplied, invoke the external OCR tool with a policy-driven argument
//! set, classify failure diagnostics, and retry at most once.
//!
//! The external tools (ocrmypdf, qpdf) are opaque engines behind a
//! command-line contract; everything here is sequencing and text
//! classification around them.

mod args;
mod classify;
mod controller;
mod encryption;
mod invoker;
mod scratch;
mod types;

pub use args::build_args;
pub use classify::{classify_failure, classify_with_rules, ClassificationRule, DEFAULT_RULES};
pub use controller::{ConversionController, ConvertedDocument};
pub use encryption::{decrypt, is_encrypted, ENCRYPTION_MARKERS};
pub use invoker::{InvokeError, SystemToolRunner, ToolRunner};
pub use scratch::ScratchFile;
pub use types::{
    ConversionOptions, ConvertError, FailureCategory, OutputKind, ToolOutput, DEFAULT_JOBS,
    DEFAULT_LANGUAGE, DEFAULT_TIMEOUT,
};
