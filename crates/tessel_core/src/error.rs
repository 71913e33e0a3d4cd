//! Error type shared by loading and query paths.
//!
//! Every error carries a format path (for example `accessors[3].bufferView`
//! or `glb.chunk[1]`) naming the piece of the document that was rejected.

use thiserror::Error;

/// Coarse classification of a [`GltfError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller passed something that can never be valid.
    InvalidArgument,
    /// Grammar, type or layout violation in the input.
    Parse,
    /// Filesystem failure.
    Io,
    /// An index pointed past the end of its array.
    Range,
    /// A feature this loader does not implement.
    Unsupported,
}

/// Errors that can occur while loading or querying a document.
#[derive(Error, Debug)]
pub enum GltfError {
    #[error("invalid argument at {path}: {message}")]
    InvalidArgument { path: String, message: String },

    #[error("parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("index out of range at {path}: {message}")]
    Range { path: String, message: String },

    #[error("unsupported at {path}: {message}")]
    Unsupported { path: String, message: String },
}

/// Result type for loading and query operations.
pub type GltfResult<T> = Result<T, GltfError>;

impl GltfError {
    pub fn invalid_argument(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn range(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Range {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn unsupported(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unsupported {
            path: path.into(),
            message: message.into(),
        }
    }

    /// The error's classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Io { .. } => ErrorKind::Io,
            Self::Range { .. } => ErrorKind::Range,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
        }
    }

    /// Format path of the offending element.
    pub fn path(&self) -> &str {
        match self {
            Self::InvalidArgument { path, .. }
            | Self::Parse { path, .. }
            | Self::Io { path, .. }
            | Self::Range { path, .. }
            | Self::Unsupported { path, .. } => path,
        }
    }
}

impl From<serde_json::Error> for GltfError {
    fn from(err: serde_json::Error) -> Self {
        let path = format!("json:{}:{}", err.line(), err.column());
        Self::parse(path, err.to_string())
    }
}
