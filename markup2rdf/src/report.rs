//! Structured diagnostics collected while extracting.
//!
//! Reports are the non-fatal channel: everything recoverable that a caller
//! might still want to know about ends up here, tagged with the path of the
//! element that produced it. The fatal channel is [`crate::Error`].

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// What kind of condition a report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// A `lang`/`xml:lang` value that did not parse as a language tag.
    InvalidLanguage,
    /// A document base declaration whose value is not a valid IRI.
    InvalidBaseDeclaration,
    /// A `prefix` attribute token pair whose first token did not end in `:`,
    /// or a prefix the mapping table rejected.
    InvalidPrefixDeclaration,
    /// A profile/context reference that could not be loaded.
    ProfileLoadFailure,
    /// A profile reference present but no loader was configured.
    ProfileSkipped,
    /// A resolved value with the wrong shape for its position, e.g. a blank
    /// node used as a predicate or datatype.
    MalformedStatement,
}

/// A single diagnostic, located by the ancestor-chain of element names.
#[derive(Debug, Clone)]
pub struct Report {
    pub severity: Severity,
    pub kind: ReportKind,
    pub message: String,
    pub path: Vec<String>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{severity} at `{}`: {}", self.path.join(" > "), self.message)
    }
}
