use std::io;
use std::path::PathBuf;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A payload addressed one document but arrived at another.
    #[error("uri mismatch: {expected} expected, {found} found")]
    IdentityMismatch { expected: String, found: String },

    #[error("no session for document {uri}")]
    UnknownDocument { uri: String },

    #[error("no decoration snapshot for document {uri}")]
    NoSnapshot { uri: String },

    /// External tool (the graph renderer) is not configured or not present.
    #[error("missing tool: {what} not found at {path:?}")]
    MissingTool { what: &'static str, path: Option<PathBuf> },

    #[error("missing file: {0}")]
    MissingFile(PathBuf),

    /// The host refused a batched edit, usually because the document changed concurrently.
    #[error("edit rejected for {uri}: {reason}")]
    EditRejected { uri: String, reason: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
