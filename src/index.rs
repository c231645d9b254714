//! The retrieval contract every search backend implements.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::document::Document;
use crate::error::Result;
use crate::options::FindOpts;
use crate::results::Results;

/// A searchable store of [`Document`]s keyed by path.
///
/// Implementations must be safe to share across threads: reads may run
/// concurrently, writes exclude every other operation. Once
/// [`Index::close`] has been called every other method fails with
/// [`Error::IndexClosed`](crate::Error::IndexClosed).
pub trait Index: Send + Sync {
    /// Insert or replace the document stored under `doc.path`.
    fn add(&self, doc: Document, cancel: &CancelToken) -> Result<()>;

    /// Remove a document. Removing an unknown path is not an error.
    fn remove(&self, path: &str, cancel: &CancelToken) -> Result<()>;

    fn find(&self, opts: &FindOpts, cancel: &CancelToken) -> Result<Results>;

    /// Fails with [`Error::NotFound`](crate::Error::NotFound) when absent.
    fn find_by_path(
        &self,
        path: &str,
        cancel: &CancelToken,
    ) -> Result<Document>;

    fn count(&self, opts: &FindOpts, cancel: &CancelToken) -> Result<u64>;

    /// Rebuild the whole index from its document source.
    fn reindex(&self, cancel: &CancelToken) -> Result<()>;

    fn stats(&self, cancel: &CancelToken) -> Result<IndexStats>;

    fn close(&self) -> Result<()>;
}

/// Supplies the full document set for [`Index::reindex`].
pub trait DocumentSource: Send + Sync {
    fn load(&self, cancel: &CancelToken) -> Result<Vec<Document>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub document_count: u64,
    /// Bytes on disk, zero for in-memory indexes.
    pub index_size: u64,
    pub last_indexed: Option<DateTime<Utc>>,
    pub index_path: Option<PathBuf>,
    pub status: IndexStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    #[default]
    Unopened,
    Indexing,
    Ready,
    Error,
}

impl IndexStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IndexStatus::Unopened => "unopened",
            IndexStatus::Indexing => "indexing",
            IndexStatus::Ready => "ready",
            IndexStatus::Error => "error",
        }
    }
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fixed, in-memory document set. Handy for tests and for callers that
/// already hold their documents.
#[derive(Debug, Clone, Default)]
pub struct StaticSource(pub Vec<Document>);

impl DocumentSource for StaticSource {
    fn load(&self, cancel: &CancelToken) -> Result<Vec<Document>> {
        cancel.check()?;
        Ok(self.0.clone())
    }
}
