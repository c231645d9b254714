//! The vector-similarity capability used by hybrid retrieval.

use serde::Serialize;

use crate::cancel::CancelToken;
use crate::document::Document;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticFindOpts {
    /// Maximum number of results.
    pub top_k: usize,
}

impl Default for SemanticFindOpts {
    fn default() -> Self {
        Self {
            top_k: crate::retrieval::DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticResult {
    pub document: Document,
    /// Similarity, higher is closer.
    pub score: f32,
}

/// A similarity search backend.
///
/// Results come back highest similarity first. A backend that is disabled
/// or unreachable fails with [`Error::SemanticUnavailable`] rather than a
/// generic error, so callers can degrade to keyword search.
pub trait SemanticIndex: Send + Sync {
    fn find_similar(
        &self,
        query: &str,
        opts: &SemanticFindOpts,
        cancel: &CancelToken,
    ) -> Result<Vec<SemanticResult>>;

    fn is_available(&self) -> bool;
}

/// The backend used when no semantic engine is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSemanticIndex;

impl SemanticIndex for NoopSemanticIndex {
    fn find_similar(
        &self,
        _query: &str,
        _opts: &SemanticFindOpts,
        cancel: &CancelToken,
    ) -> Result<Vec<SemanticResult>> {
        cancel.check()?;
        Err(Error::SemanticUnavailable)
    }

    fn is_available(&self) -> bool {
        false
    }
}
