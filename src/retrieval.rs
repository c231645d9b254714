//! Keyword, semantic and hybrid retrieval over one request.
//!
//! The [`Retriever`] decides which backend(s) to call for a request, fuses
//! their rankings in hybrid mode, and degrades to keyword-only results
//! when the semantic backend is unavailable.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::fusion::{self, MatchType, DEFAULT_RRF_K};
use crate::index::Index;
use crate::matcher;
use crate::options::{FindOpts, SortDirection, SortField};
use crate::query::{Expr, Query};
use crate::results::SearchResult;
use crate::semantic::{SemanticFindOpts, SemanticIndex, SemanticResult};
use crate::text_util;

/// Result cap used when a request asks for zero results.
pub const DEFAULT_TOP_K: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Both backends, fused.
    #[default]
    Hybrid,
    Keyword,
    Semantic,
}

impl RetrievalMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RetrievalMode::Hybrid => "hybrid",
            RetrievalMode::Keyword => "keyword",
            RetrievalMode::Semantic => "semantic",
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMode {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "hybrid" => Ok(RetrievalMode::Hybrid),
            "keyword" => Ok(RetrievalMode::Keyword),
            "semantic" => Ok(RetrievalMode::Semantic),
            _ => Err(Error::Config(format!(
                "invalid mode {raw:?} (allowed: hybrid, keyword, semantic)"
            ))),
        }
    }
}

/// One retrieval request.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// Free text, matched as a single term. May be empty.
    pub query: String,
    /// Structured conditions ANDed with the free text.
    pub conditions: Query,
    pub mode: RetrievalMode,
    /// Result cap; zero means [`DEFAULT_TOP_K`].
    pub top_k: usize,
    /// Attach an explanation snippet to each hit.
    pub explain: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_conditions(mut self, conditions: Query) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_mode(mut self, mode: RetrievalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    fn effective_top_k(&self) -> usize {
        if self.top_k == 0 {
            DEFAULT_TOP_K
        } else {
            self.top_k
        }
    }
}

/// How a request was actually served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchMeta {
    pub mode: RetrievalMode,
    pub used_keyword: bool,
    pub used_semantic: bool,
    /// Hybrid mode degraded to keyword-only results.
    pub semantic_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub document: Document,
    pub match_type: MatchType,
    /// Backend score for single-source modes, fused score in hybrid mode.
    pub score: f64,
    /// Present when the request asked for explanations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub meta: SearchMeta,
}

impl SearchResponse {
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.hits.iter().map(|hit| &hit.document)
    }
}

/// Serves [`SearchRequest`]s from a keyword index and a semantic backend.
pub struct Retriever<'a> {
    index: &'a dyn Index,
    semantic: &'a dyn SemanticIndex,
    rrf_k: usize,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a dyn Index, semantic: &'a dyn SemanticIndex) -> Self {
        Self {
            index,
            semantic,
            rrf_k: DEFAULT_RRF_K,
        }
    }

    pub fn with_rrf_k(mut self, k: usize) -> Self {
        self.rrf_k = k;
        self
    }

    pub fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancelToken,
    ) -> Result<SearchResponse> {
        cancel.check()?;
        let top_k = request.effective_top_k();
        let mut meta = SearchMeta {
            mode: request.mode,
            ..SearchMeta::default()
        };
        tracing::debug!(
            mode = %request.mode,
            top_k,
            query = %request.query,
            "retrieval request"
        );

        let hits: Vec<SearchHit> = match request.mode {
            RetrievalMode::Keyword => {
                meta.used_keyword = true;
                let keyword = self.keyword(request, top_k, cancel)?;
                keyword.into_iter().map(exact_hit).collect()
            }
            RetrievalMode::Semantic => {
                let semantic = self.semantic(request, top_k, cancel)?;
                meta.used_semantic = true;
                semantic.into_iter().map(semantic_hit).collect()
            }
            RetrievalMode::Hybrid => {
                meta.used_keyword = true;
                let keyword = self.keyword(request, top_k, cancel)?;
                match self.semantic(request, top_k, cancel) {
                    Ok(semantic) => {
                        meta.used_semantic = true;
                        let mut merged = fusion::merge_hybrid(
                            &keyword,
                            &semantic,
                            self.rrf_k,
                        );
                        merged.truncate(top_k);
                        merged
                            .into_iter()
                            .map(|fused| SearchHit {
                                document: fused.document,
                                match_type: fused.match_type,
                                score: fused.score,
                                explanation: None,
                            })
                            .collect()
                    }
                    Err(Error::SemanticUnavailable) => {
                        tracing::warn!(
                            "semantic backend unavailable, using keyword \
                             results"
                        );
                        meta.semantic_fallback = true;
                        keyword.into_iter().map(exact_hit).collect()
                    }
                    Err(err) => return Err(err),
                }
            }
        };

        let hits = if request.explain {
            explain(hits, &request.query)
        } else {
            hits
        };
        Ok(SearchResponse { hits, meta })
    }

    /// The conditions plus the free text as one more term. Without any
    /// predicate, results come back in path order.
    fn keyword(
        &self,
        request: &SearchRequest,
        top_k: usize,
        cancel: &CancelToken,
    ) -> Result<Vec<SearchResult>> {
        let text = request.query.trim();
        let query = if text.is_empty() {
            request.conditions.clone()
        } else {
            request.conditions.and_also(Expr::term(text))
        };
        let mut opts = FindOpts::new().with_limit(top_k);
        if query.is_empty() {
            opts = opts.with_sort(SortField::Path, SortDirection::Asc);
        }
        let results = self.index.find(&opts.with_query(query), cancel)?;
        Ok(results.items)
    }

    /// Similar documents, filtered by the request conditions.
    fn semantic(
        &self,
        request: &SearchRequest,
        top_k: usize,
        cancel: &CancelToken,
    ) -> Result<Vec<SemanticResult>> {
        if !self.semantic.is_available() {
            return Err(Error::SemanticUnavailable);
        }
        let opts = SemanticFindOpts { top_k };
        let candidates =
            self.semantic.find_similar(&request.query, &opts, cancel)?;
        if request.conditions.is_empty() {
            return Ok(candidates);
        }

        let now = Utc::now();
        let conditions = &request.conditions;
        let mut kept = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            cancel.check()?;
            if matcher::matches(conditions, &candidate.document, now)? {
                kept.push(candidate);
            }
        }
        tracing::debug!(kept = kept.len(), "filtered semantic candidates");
        Ok(kept)
    }
}

fn exact_hit(result: SearchResult) -> SearchHit {
    SearchHit {
        document: result.document,
        match_type: MatchType::Exact,
        score: f64::from(result.score),
        explanation: None,
    }
}

fn semantic_hit(result: SemanticResult) -> SearchHit {
    SearchHit {
        document: result.document,
        match_type: MatchType::Semantic,
        score: f64::from(result.score),
        explanation: None,
    }
}

fn explain(hits: Vec<SearchHit>, query: &str) -> Vec<SearchHit> {
    hits.into_iter()
        .map(|mut hit| {
            hit.explanation = Some(text_util::explain_snippet(
                &hit.document,
                query,
                hit.match_type,
            ));
            hit
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing() {
        assert_eq!(
            " Keyword ".parse::<RetrievalMode>().unwrap(),
            RetrievalMode::Keyword
        );
        assert_eq!(RetrievalMode::default(), RetrievalMode::Hybrid);
        let err = "fuzzy".parse::<RetrievalMode>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: invalid mode \"fuzzy\" \
             (allowed: hybrid, keyword, semantic)"
        );
    }

    #[test]
    fn zero_top_k_means_default() {
        assert_eq!(SearchRequest::new("x").effective_top_k(), DEFAULT_TOP_K);
        assert_eq!(
            SearchRequest::new("x").with_top_k(5).effective_top_k(),
            5
        );
    }
}
