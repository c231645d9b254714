use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::query::Query;

/// Limit used by [`Index::find`](crate::index::Index::find) when none is set.
pub const DEFAULT_FIND_LIMIT: usize = 100;

/// Filters, ordering and paging for one [`Index::find`] call.
///
/// `FindOpts` is a plain value: every `with_*` method consumes the options
/// and returns the updated copy, so a request never shares filter state
/// with another one.
///
/// [`Index::find`]: crate::index::Index::find
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FindOpts {
    pub query: Option<Query>,
    pub tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub path_prefix: Option<String>,
    pub exclude_paths: Vec<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub modified_after: Option<DateTime<Utc>>,
    pub modified_before: Option<DateTime<Utc>>,
    /// Exact, case-insensitive frontmatter matches.
    pub metadata: BTreeMap<String, String>,
    pub sort: SortSpec,
    /// Zero means [`DEFAULT_FIND_LIMIT`].
    pub limit: usize,
    pub offset: usize,
}

impl FindOpts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn excluding_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_path(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }

    pub fn excluding_paths<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_paths
            .extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn with_created_after(mut self, at: DateTime<Utc>) -> Self {
        self.created_after = Some(at);
        self
    }

    pub fn with_created_before(mut self, at: DateTime<Utc>) -> Self {
        self.created_before = Some(at);
        self
    }

    pub fn with_created_between(
        self,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Self {
        self.with_created_after(after).with_created_before(before)
    }

    pub fn with_modified_after(mut self, at: DateTime<Utc>) -> Self {
        self.modified_after = Some(at);
        self
    }

    pub fn with_modified_before(mut self, at: DateTime<Utc>) -> Self {
        self.modified_before = Some(at);
        self
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_sort(
        mut self,
        field: SortField,
        direction: SortDirection,
    ) -> Self {
        self.sort = SortSpec { field, direction };
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// The limit actually applied to a search.
    pub fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            DEFAULT_FIND_LIMIT
        } else {
            self.limit
        }
    }

    /// True when no selection filter is set. Sort, limit and offset only
    /// shape the result window and do not count.
    pub fn is_empty(&self) -> bool {
        self.query.as_ref().is_none_or(Query::is_empty)
            && self.tags.is_empty()
            && self.exclude_tags.is_empty()
            && self.path_prefix.as_deref().is_none_or(str::is_empty)
            && self.exclude_paths.is_empty()
            && self.created_after.is_none()
            && self.created_before.is_none()
            && self.modified_after.is_none()
            && self.modified_before.is_none()
            && self.metadata.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    /// Backend ranking score.
    #[default]
    Relevance,
    Created,
    Modified,
    Title,
    Path,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    /// Best match first under the default relevance sort.
    #[default]
    Desc,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Expr;

    #[test]
    fn default_is_empty() {
        assert!(FindOpts::new().is_empty());
        assert!(FindOpts::new().with_query(Query::default()).is_empty());
    }

    #[test]
    fn window_options_do_not_affect_emptiness() {
        let opts = FindOpts::new()
            .with_limit(5)
            .with_offset(10)
            .with_sort(SortField::Title, SortDirection::Asc);
        assert!(opts.is_empty());
        assert_eq!(opts.effective_limit(), 5);
    }

    #[test]
    fn any_filter_makes_it_non_empty() {
        let base = FindOpts::new();
        assert!(!base.clone().with_tags(["work"]).is_empty());
        assert!(!base.clone().excluding_paths(["archive/"]).is_empty());
        assert!(!base.clone().with_metadata("status", "todo").is_empty());
        assert!(
            !base
                .clone()
                .with_query(Query::new(vec![Expr::term("x")]))
                .is_empty()
        );
        assert!(base.is_empty());
    }

    #[test]
    fn zero_limit_uses_default() {
        assert_eq!(FindOpts::new().effective_limit(), DEFAULT_FIND_LIMIT);
    }
}
