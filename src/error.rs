/// Errors that can occur while parsing or converting an MHTML archive.
///
/// A decode failure or an unresolved reference are deliberately not variants
/// here: both are non-fatal, leaving a resource's body empty or a reference
/// unchanged, and are logged via `tracing` at the point they occur instead.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MhtmlError {
    /// The input does not satisfy a structural invariant: missing outer
    /// `Content-Type`, missing boundary parameter, missing or non-HTML
    /// index part.
    #[error("invalid MHTML archive: {0}")]
    InvalidArchive(String),

    /// The stream ended while the parser was mid-header or mid-body.
    /// Surfaced only in strict mode; lenient mode instead returns the
    /// archive built so far.
    #[error("unexpected end of input while parsing MHTML ({0})")]
    UnexpectedEof(String),

    /// A part is missing `Content-Transfer-Encoding`, `Content-Type`, or
    /// both `Content-ID` and `Content-Location`. Surfaced only in strict
    /// mode; lenient mode drops the part.
    #[error("part at offset {offset} is missing required header(s): {detail}")]
    MissingPartHeader { offset: usize, detail: String },
}
