use thiserror::Error;

/// Errors surfaced by the rendering side (format selection, template
/// application, grammar construction).
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template rendering failed: {0}")]
    Template(String),
    #[error("schema-to-grammar conversion failed: {0}")]
    Schema(String),
    #[error("malformed ingest data: {0}")]
    Ingest(String),
    #[error("cannot specify a grammar together with tools")]
    GrammarWithTools,
}

/// Errors that can arise while parsing model output. `Partial` and
/// `XmlToolCallSyntax` are unwind signals caught inside the crate; only
/// `Fatal` (and an uncaught `XmlToolCallSyntax` promoted to `Fatal`) is
/// ever meant to reach a caller, and even then `parse()` downgrades it to
/// a content-only fallback per the no-silent-data-loss policy.
#[derive(Debug, Error)]
pub enum ParseError {
    /// More input is needed to finish parsing the current construct.
    #[error("partial input")]
    Partial,
    /// Unrecoverable syntax inside an XML-style tool call. Recoverable by
    /// the XML engine unless a partial tool call was already emitted.
    #[error("xml tool-call syntax error: {0}")]
    XmlToolCallSyntax(String),
    /// A real parse failure at `is_partial = false`.
    #[error("parse failed: {0}")]
    Fatal(String),
}

impl ParseError {
    pub fn is_partial(&self) -> bool {
        matches!(self, ParseError::Partial)
    }
}
