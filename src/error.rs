use crate::parser::ParseError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("search backend error: {0}")]
    Tantivy(tantivy::TantivyError),

    #[error("invalid query: {0}")]
    Parse(#[from] ParseError),

    #[error("cannot translate {field}:{value}: {reason}")]
    Translate {
        field: String,
        value: String,
        reason: String,
    },

    #[error("index is closed")]
    IndexClosed,

    #[error("document not found: {path}")]
    NotFound { path: String },

    #[error("index is corrupted: {0}")]
    IndexCorrupted(String),

    #[error("index is locked by another process: {0}")]
    IndexLocked(String),

    #[error("invalid condition: {0}")]
    Condition(String),

    #[error("semantic backend unavailable")]
    SemanticUnavailable,

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid frontmatter: {0}")]
    Frontmatter(#[from] serde_yaml::Error),

    #[error("invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error("{op}{}: {source}", path_suffix(.path))]
    Index {
        op: &'static str,
        path: String,
        #[source]
        source: Box<Error>,
    },
}

fn path_suffix(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!(" {path}")
    }
}

impl From<tantivy::TantivyError> for Error {
    fn from(err: tantivy::TantivyError) -> Self {
        match err {
            tantivy::TantivyError::LockFailure(lock, msg) => {
                Error::IndexLocked(msg.unwrap_or_else(|| lock.to_string()))
            }
            tantivy::TantivyError::DataCorruption(corruption) => {
                Error::IndexCorrupted(format!("{corruption:?}"))
            }
            other => Error::Tantivy(other),
        }
    }
}

impl From<tantivy::directory::error::OpenDirectoryError> for Error {
    fn from(err: tantivy::directory::error::OpenDirectoryError) -> Self {
        Error::Tantivy(tantivy::TantivyError::SystemError(err.to_string()))
    }
}

impl Error {
    /// Wrap a backend failure with the operation name and document path.
    pub fn during(
        op: &'static str,
        path: impl Into<String>,
        err: Error,
    ) -> Self {
        match err {
            // Sentinels stay unwrapped so callers can match on them directly.
            Error::IndexClosed
            | Error::NotFound { .. }
            | Error::Cancelled
            | Error::Parse(_)
            | Error::Translate { .. }
            | Error::Condition(_) => err,
            other => Error::Index {
                op,
                path: path.into(),
                source: Box::new(other),
            },
        }
    }

    /// Whether the failure leaves the index usable for further requests.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Parse(_)
            | Error::Translate { .. }
            | Error::Condition(_)
            | Error::IndexClosed
            | Error::NotFound { .. }
            | Error::SemanticUnavailable
            | Error::Cancelled => true,
            Error::Index { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }

    /// Unwraps `Index` wrappers down to the underlying failure.
    pub fn root(&self) -> &Error {
        match self {
            Error::Index { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn during_keeps_sentinels_unwrapped() {
        let err = Error::during("find", "a.md", Error::IndexClosed);
        assert!(matches!(err, Error::IndexClosed));
    }

    #[test]
    fn during_names_op_and_path() {
        let io = std::io::Error::other("disk gone");
        let err = Error::during("add", "notes/a.md", io.into());
        assert_eq!(err.to_string(), "add notes/a.md: I/O error: disk gone");
        assert!(matches!(err.root(), Error::Io(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn during_without_path() {
        let err = Error::during("reindex", "", Error::Config("x".into()));
        assert_eq!(err.to_string(), "reindex: configuration error: x");
    }

    #[test]
    fn corruption_and_lock_are_fatal_to_operation() {
        assert!(!Error::IndexCorrupted("bad segment".into()).is_recoverable());
        assert!(!Error::IndexLocked("writer".into()).is_recoverable());
        assert!(Error::SemanticUnavailable.is_recoverable());
    }
}
