//! Failure classification policy
//!
//! Assigns a failed conversion attempt to a `FailureCategory` by matching
//! substrings against the attempt's combined diagnostics. The rules are a
//! data table rather than branches in the state machine, so they can be
//! versioned and tested on their own. The patterns track the wording of
//! a specific tool generation and are inherently brittle across versions.
//!
//! Rule order is load-bearing: the first matching rule wins, and the
//! encryption rule comes first so a diagnostic mentioning both an
//! encryption marker and a text-layer marker always resolves to
//! `EncryptionDetected`.

use super::types::{FailureCategory, ToolOutput};

/// One classification rule: any of `patterns` (matched case-insensitively
/// against lowercased diagnostics) assigns `category`.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRule {
    pub patterns: &'static [&'static str],
    pub category: FailureCategory,
}

/// Default policy for the ocrmypdf diagnostic vocabulary, in priority
/// order.
pub const DEFAULT_RULES: &[ClassificationRule] = &[
    // An encryption condition the preflight check missed takes
    // precedence over every recovery path
    ClassificationRule {
        patterns: &["encryptedpdferror", "encryp"],
        category: FailureCategory::EncryptionDetected,
    },
    ClassificationRule {
        patterns: &["taggedpdferror", "tagged pdf", "already has a text layer"],
        category: FailureCategory::AlreadyHasTextLayer,
    },
    ClassificationRule {
        patterns: &["pdfa conversion", "ghostscript"],
        category: FailureCategory::OutputFormatUnsupported,
    },
];

/// Classify diagnostic text against an explicit rule table.
pub fn classify_with_rules(rules: &[ClassificationRule], diagnostics: &str) -> FailureCategory {
    let lowered = diagnostics.to_lowercase();
    for rule in rules {
        if rule.patterns.iter().any(|p| lowered.contains(p)) {
            return rule.category;
        }
    }
    FailureCategory::Unclassified
}

/// Classify a failed invocation using the default policy.
pub fn classify_failure(output: &ToolOutput) -> FailureCategory {
    classify_with_rules(DEFAULT_RULES, &output.diagnostics())
}
