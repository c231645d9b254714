//! Reciprocal Rank Fusion of keyword and semantic result lists.
//!
//! A document at 1-based rank `r` in a list contributes `1 / (k + r)` to
//! its fused score. Documents are keyed by their trimmed, lower-cased path
//! so the same note never shows up twice.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::document::Document;
use crate::results::SearchResult;
use crate::semantic::SemanticResult;

/// Smoothing constant used when the caller passes zero.
pub const DEFAULT_RRF_K: usize = 60;

/// Which source(s) a fused result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Keyword list only.
    Exact,
    /// Semantic list only.
    Semantic,
    /// Both lists.
    Hybrid,
}

impl MatchType {
    pub fn label(self) -> &'static str {
        match self {
            MatchType::Exact => "Exact match",
            MatchType::Semantic => "Semantic match",
            MatchType::Hybrid => "Hybrid",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HybridResult {
    pub document: Document,
    /// Fused RRF score.
    pub score: f64,
    pub match_type: MatchType,
    /// 1-based rank in the keyword list, if present there.
    pub keyword_rank: Option<usize>,
    pub keyword_score: Option<f32>,
    /// 1-based rank in the semantic list, if present there.
    pub semantic_rank: Option<usize>,
    pub semantic_score: Option<f32>,
}

impl HybridResult {
    fn new(document: Document) -> Self {
        Self {
            document,
            score: 0.0,
            match_type: MatchType::Exact,
            keyword_rank: None,
            keyword_score: None,
            semantic_rank: None,
            semantic_score: None,
        }
    }

    /// Number of sources the document appeared in.
    pub fn coverage(&self) -> u8 {
        u8::from(self.keyword_rank.is_some())
            + u8::from(self.semantic_rank.is_some())
    }
}

/// Merge two independently ranked lists into one, best first.
///
/// Ordering is fused score descending, then coverage descending, then
/// normalized path ascending, so the output is fully deterministic. `k`
/// of zero means [`DEFAULT_RRF_K`].
pub fn merge_hybrid(
    keyword: &[SearchResult],
    semantic: &[SemanticResult],
    k: usize,
) -> Vec<HybridResult> {
    let k = if k == 0 { DEFAULT_RRF_K } else { k };
    let mut by_path: HashMap<String, HybridResult> = HashMap::new();

    for (i, result) in keyword.iter().enumerate() {
        let rank = i + 1;
        let entry = by_path
            .entry(normalize_path(&result.document.path))
            .or_insert_with(|| HybridResult::new(result.document.clone()));
        if entry.keyword_rank.is_none() {
            entry.keyword_rank = Some(rank);
            entry.keyword_score = Some(result.score);
        }
        entry.score += reciprocal_rank(k, rank);
    }

    for (i, result) in semantic.iter().enumerate() {
        let rank = i + 1;
        let entry = by_path
            .entry(normalize_path(&result.document.path))
            .or_insert_with(|| HybridResult::new(result.document.clone()));
        if entry.semantic_rank.is_none() {
            entry.semantic_rank = Some(rank);
            entry.semantic_score = Some(result.score);
        }
        entry.score += reciprocal_rank(k, rank);
    }

    let mut merged: Vec<(String, HybridResult)> = by_path
        .into_iter()
        .map(|(key, mut result)| {
            result.match_type =
                match (result.keyword_rank, result.semantic_rank) {
                    (Some(_), Some(_)) => MatchType::Hybrid,
                    (Some(_), None) => MatchType::Exact,
                    _ => MatchType::Semantic,
                };
            (key, result)
        })
        .collect();

    merged.sort_by(|(a_key, a), (b_key, b)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.coverage().cmp(&a.coverage()))
            .then_with(|| a_key.cmp(b_key))
    });
    merged.into_iter().map(|(_, result)| result).collect()
}

fn reciprocal_rank(k: usize, rank: usize) -> f64 {
    1.0 / (k + rank) as f64
}

fn normalize_path(path: &str) -> String {
    path.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyword(paths: &[&str]) -> Vec<SearchResult> {
        paths
            .iter()
            .enumerate()
            .map(|(i, p)| SearchResult {
                document: Document::new(*p),
                score: 10.0 - i as f32,
                snippets: Vec::new(),
            })
            .collect()
    }

    fn semantic(paths: &[&str]) -> Vec<SemanticResult> {
        paths
            .iter()
            .enumerate()
            .map(|(i, p)| SemanticResult {
                document: Document::new(*p),
                score: 0.9 - i as f32 / 10.0,
            })
            .collect()
    }

    fn order(merged: &[HybridResult]) -> Vec<&str> {
        merged.iter().map(|r| r.document.path.as_str()).collect()
    }

    #[test]
    fn fuses_the_worked_example() {
        let merged = merge_hybrid(
            &keyword(&["A", "B", "C"]),
            &semantic(&["B", "D", "A"]),
            60,
        );
        assert_eq!(order(&merged), vec!["B", "A", "D", "C"]);
        let labels: Vec<MatchType> =
            merged.iter().map(|r| r.match_type).collect();
        assert_eq!(
            labels,
            vec![
                MatchType::Hybrid,
                MatchType::Hybrid,
                MatchType::Semantic,
                MatchType::Exact,
            ]
        );
        assert!((merged[0].score - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-12);
        assert!((merged[1].score - (1.0 / 61.0 + 1.0 / 63.0)).abs() < 1e-12);
        assert_eq!(merged[1].keyword_rank, Some(1));
        assert_eq!(merged[1].semantic_rank, Some(3));
        assert_eq!(merged[3].semantic_rank, None);
    }

    #[test]
    fn path_casing_does_not_duplicate() {
        let merged = merge_hybrid(
            &keyword(&["Notes/A.md"]),
            &semantic(&[" notes/a.md"]),
            60,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].match_type, MatchType::Hybrid);
        assert_eq!(merged[0].document.path, "Notes/A.md");
    }

    #[test]
    fn equal_scores_prefer_coverage_then_path() {
        // Both singletons at rank 1 tie on score; path decides.
        let merged = merge_hybrid(&keyword(&["b"]), &semantic(&["a"]), 60);
        assert_eq!(order(&merged), vec!["a", "b"]);
    }

    #[test]
    fn empty_inputs() {
        assert!(merge_hybrid(&[], &[], 60).is_empty());
        let merged = merge_hybrid(&[], &semantic(&["x", "y"]), 60);
        assert_eq!(order(&merged), vec!["x", "y"]);
        assert!(merged.iter().all(|r| r.match_type == MatchType::Semantic));
    }

    #[test]
    fn labels_render_for_humans() {
        assert_eq!(MatchType::Exact.to_string(), "Exact match");
        assert_eq!(MatchType::Semantic.to_string(), "Semantic match");
        assert_eq!(MatchType::Hybrid.to_string(), "Hybrid");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn path_list() -> impl Strategy<Value = Vec<String>> {
            prop::collection::btree_set("[a-f]{1,3}", 0..8)
                .prop_map(|set| set.into_iter().collect::<Vec<_>>())
                .prop_shuffle()
        }

        fn refs(paths: &[String]) -> Vec<&str> {
            paths.iter().map(String::as_str).collect()
        }

        proptest! {
            #[test]
            fn merge_is_deterministic(k in path_list(), s in path_list()) {
                let kw = keyword(&refs(&k));
                let sem = semantic(&refs(&s));
                let first = merge_hybrid(&kw, &sem, 60);
                let second = merge_hybrid(&kw, &sem, 60);
                prop_assert_eq!(order(&first), order(&second));
            }

            #[test]
            fn zero_k_means_sixty(k in path_list(), s in path_list()) {
                let kw = keyword(&refs(&k));
                let sem = semantic(&refs(&s));
                prop_assert_eq!(
                    merge_hybrid(&kw, &sem, 0),
                    merge_hybrid(&kw, &sem, 60)
                );
            }

            #[test]
            fn keyword_alone_keeps_its_order(k in path_list()) {
                let merged = merge_hybrid(&keyword(&refs(&k)), &[], 60);
                prop_assert_eq!(order(&merged), refs(&k));
                prop_assert!(
                    merged.iter().all(|r| r.match_type == MatchType::Exact)
                );
            }
        }
    }
}
