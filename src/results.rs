use std::time::Duration;

use serde::Serialize;

use crate::document::Document;
use crate::options::FindOpts;

/// One matching document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub document: Document,
    /// Backend relevance score, higher is better.
    pub score: f32,
    pub snippets: Vec<Snippet>,
}

/// An excerpt of a document field around the matched terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snippet {
    pub field: String,
    pub text: String,
    /// Byte ranges of matched terms within `text`.
    pub ranges: Vec<std::ops::Range<usize>>,
}

/// A page of results plus the total match count.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Results {
    pub items: Vec<SearchResult>,
    /// Matches before limit/offset were applied.
    pub total: u64,
    pub query: FindOpts,
    pub elapsed: Duration,
}

impl Results {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.items
            .iter()
            .map(|item| item.document.path.as_str())
            .collect()
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.items.iter().map(|item| &item.document)
    }
}
