//! Error types for the extraction entry points.
//!
//! Per-token failures (an unresolvable CURIE or term) are never errors; those
//! tokens are simply dropped and, where useful, recorded as [`crate::Report`]s.
//! Only conditions that abort an entire extraction surface here.

/// A fatal extraction failure.
///
/// In lax mode (the default) only IRI parse failures on caller-supplied
/// values can occur; the malformed-statement and missing-root variants are
/// produced in strict mode only.
#[derive(derive_more::Error, derive_more::Display, derive_more::From, Debug)]
pub enum Error {
    #[display("IRI parse error: `{iri}`")]
    IriParse {
        source: oxiri::IriParseError,
        iri: String,
    },

    /// The document has no root element. Lax mode treats this as an empty
    /// result instead.
    #[display("document has no root element")]
    MissingRoot,

    /// A resolved value had the wrong shape for its statement position
    /// (for example a blank node in predicate position). Carries the
    /// ancestor-chain path of the offending element.
    #[display("malformed statement at `{}`: {cause}", path.join(" > "))]
    MalformedStatement { path: Vec<String>, cause: String },
}

impl Error {
    pub(crate) fn iri(source: oxiri::IriParseError, iri: impl Into<String>) -> Self {
        Error::IriParse {
            source,
            iri: iri.into(),
        }
    }
}
