use thiserror::Error;

/// A recoverable failure reported to the caller.
///
/// Internal invariant violations (incompatible stamps, out-of-range cuts, ...) are not represented
/// here: they are bugs and panic immediately.
#[derive(Debug, Error)]
pub enum CompilationError {
    #[error("General error: {0}")]
    /// Something the user can fix, most often a malformed `YKD_*` environment variable.
    General(String),
    #[error("Internal error: {0}")]
    /// Something went wrong that is probably the result of a bug in yk.
    InternalError(String),
    #[error("Limit exceeded: {0}")]
    /// A limit was exceeded (e.g. a byte buffer was too short or the canonicaliser did not reach a
    /// fixpoint within its round limit).
    LimitExceeded(String),
}
