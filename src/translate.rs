//! Compiles [`Query`] trees and [`FindOpts`] filters into tantivy queries.

use std::ops::Bound;

use chrono::{DateTime, Utc};
use tantivy::query::{
    AllQuery,
    BooleanQuery,
    BoostQuery,
    EmptyQuery,
    Occur,
    PhraseQuery,
    Query as TantivyQuery,
    RangeQuery,
    RegexQuery,
    TermQuery,
};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, Term};

use crate::dates::{self, DateWindow};
use crate::document::DocField;
use crate::error::{Error, Result};
use crate::options::FindOpts;
use crate::query::{CompareOp, Expr, Query, WildcardKind};
use crate::tantivy_index::SchemaFields;

/// Static boost of a title hit for bare terms.
pub const WEIGHT_TITLE: f32 = 500.0;
/// Static boost of a lead-paragraph hit for bare terms.
pub const WEIGHT_LEAD: f32 = 50.0;
/// Static boost of a body hit for bare terms.
pub const WEIGHT_BODY: f32 = 1.0;

type Boxed = Box<dyn TantivyQuery>;

/// Translates query trees against one index schema.
///
/// Relative dates (`today`, `this-week`, ...) resolve against `now`.
pub struct Translator<'a> {
    index: &'a Index,
    fields: &'a SchemaFields,
    now: DateTime<Utc>,
}

impl<'a> Translator<'a> {
    pub(crate) fn new(
        index: &'a Index,
        fields: &'a SchemaFields,
        now: DateTime<Utc>,
    ) -> Self {
        Self { index, fields, now }
    }

    /// The whole search predicate: the query AND every convenience filter.
    pub fn find_opts(&self, opts: &FindOpts) -> Result<Boxed> {
        let f = self.fields;
        let mut clauses: Vec<(Occur, Boxed)> = Vec::new();

        if let Some(query) = opts.query.as_ref().filter(|q| !q.is_empty()) {
            clauses.push((Occur::Must, self.query(query)?));
        }
        for tag in &opts.tags {
            clauses.push((Occur::Must, keyword(f.tags, &tag.to_lowercase())));
        }
        for tag in &opts.exclude_tags {
            clauses
                .push((Occur::MustNot, keyword(f.tags, &tag.to_lowercase())));
        }
        if let Some(prefix) = opts.path_prefix.as_deref() {
            if !prefix.is_empty() {
                clauses.push((Occur::Must, self.path_prefix(prefix)?));
            }
        }
        for prefix in &opts.exclude_paths {
            clauses.push((Occur::MustNot, self.path_prefix(prefix)?));
        }
        if opts.created_after.is_some() || opts.created_before.is_some() {
            let window = DateWindow::from_options(
                opts.created_after,
                opts.created_before,
            );
            clauses.push((Occur::Must, date_range(f.created, window)));
        }
        if opts.modified_after.is_some() || opts.modified_before.is_some() {
            let window = DateWindow::from_options(
                opts.modified_after,
                opts.modified_before,
            );
            clauses.push((Occur::Must, date_range(f.modified, window)));
        }
        for (key, value) in &opts.metadata {
            let entry = meta_entry(key, value);
            clauses.push((Occur::Must, keyword(f.meta, &entry)));
        }

        Ok(conjunction(clauses))
    }

    /// Top-level expressions are ANDed; an empty query matches everything.
    pub fn query(&self, query: &Query) -> Result<Boxed> {
        tracing::debug!(query = %query, "translating query");
        let clauses = query
            .expressions
            .iter()
            .map(|expr| Ok((Occur::Must, self.expr(expr)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(conjunction(clauses))
    }

    pub fn expr(&self, expr: &Expr) -> Result<Boxed> {
        match expr {
            Expr::Term { value } => self.term(value),
            Expr::Field { field, op, value } => self.field(field, *op, value),
            Expr::Not { inner } => Ok(negate(self.expr(inner)?)),
            Expr::Or { left, right } => Ok(Box::new(BooleanQuery::new(vec![
                (Occur::Should, self.expr(left)?),
                (Occur::Should, self.expr(right)?),
            ]))),
            Expr::And { expressions } => {
                let clauses = expressions
                    .iter()
                    .map(|e| Ok((Occur::Must, self.expr(e)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(conjunction(clauses))
            }
            Expr::Date { field, op, value } => self.date(field, *op, value),
            Expr::Range { field, start, end } => self.range(field, start, end),
            Expr::Wildcard {
                field,
                pattern,
                kind,
            } => self.wildcard(field, pattern, *kind),
            Expr::Exists { field, negated } => {
                let key = DocField::resolve(field).presence_key();
                let exists = keyword(self.fields.present, &key);
                Ok(if *negated { negate(exists) } else { exists })
            }
        }
    }

    /// Free text: title, lead and body with decreasing static boosts.
    fn term(&self, value: &str) -> Result<Boxed> {
        let f = self.fields;
        let weighted = [
            (f.title, WEIGHT_TITLE),
            (f.lead, WEIGHT_LEAD),
            (f.body, WEIGHT_BODY),
        ];
        let mut clauses = Vec::with_capacity(weighted.len());
        for (field, weight) in weighted {
            let matched: Boxed =
                Box::new(BoostQuery::new(self.text(field, value)?, weight));
            clauses.push((Occur::Should, matched));
        }
        Ok(Box::new(BooleanQuery::new(clauses)))
    }

    /// Analyzed match on one text field. Several tokens form a phrase.
    fn text(&self, field: Field, value: &str) -> Result<Boxed> {
        let mut analyzer = self.index.tokenizer_for_field(field)?;
        let mut terms = Vec::new();
        let mut stream = analyzer.token_stream(value);
        stream.process(&mut |token| {
            terms.push(Term::from_field_text(field, &token.text));
        });

        Ok(match terms.len() {
            0 => Box::new(EmptyQuery),
            1 => Box::new(TermQuery::new(
                terms.remove(0),
                IndexRecordOption::WithFreqs,
            )),
            _ => Box::new(PhraseQuery::new(terms)),
        })
    }

    fn field(&self, name: &str, op: CompareOp, value: &str) -> Result<Boxed> {
        let field = DocField::resolve(name);
        if field.is_date() {
            return self.date(name, op, value);
        }
        if op.is_ordering() {
            return Err(translate_error(
                name,
                value,
                "comparison operators apply only to created and modified",
            ));
        }

        let f = self.fields;
        let lower = value.to_lowercase();
        match (op, &field) {
            (CompareOp::Equals, DocField::Title) => self.text(f.title, value),
            (CompareOp::Equals, DocField::Lead) => self.text(f.lead, value),
            (CompareOp::Equals, DocField::Body) => self.text(f.body, value),
            (CompareOp::Equals, DocField::Tags) => Ok(keyword(f.tags, &lower)),
            (CompareOp::Equals, DocField::Path) if lower.ends_with('/') => {
                self.path_prefix(&lower)
            }
            (CompareOp::Equals, DocField::Path) => {
                Ok(keyword(f.path_lc, &lower))
            }
            (CompareOp::Equals, DocField::Checksum) => {
                Ok(keyword(f.checksum, value))
            }
            (CompareOp::Equals, DocField::Meta(key)) => {
                Ok(keyword(f.meta, &meta_entry(key, value)))
            }
            (CompareOp::Prefix, _) => {
                let regex = format!("{}.*", regex::escape(&lower));
                self.pattern(name, &field, &regex)
            }
            (CompareOp::Suffix, _) => {
                let regex = format!(".*{}", regex::escape(&lower));
                self.pattern(name, &field, &regex)
            }
            (CompareOp::Equals, DocField::Created | DocField::Modified)
            | (CompareOp::Gt | CompareOp::Gte, _)
            | (CompareOp::Lt | CompareOp::Lte, _) => Err(translate_error(
                name,
                value,
                "unsupported operator for this field",
            )),
        }
    }

    fn date(&self, name: &str, op: CompareOp, value: &str) -> Result<Boxed> {
        let field = self.date_field(name, value)?;
        let resolved = dates::resolve_value(value, self.now).ok_or_else(|| {
            translate_error(name, value, "unrecognized date")
        })?;
        let window = DateWindow::for_value(op, resolved).ok_or_else(|| {
            translate_error(name, value, "unsupported date operator")
        })?;
        Ok(date_range(field, window))
    }

    fn range(&self, name: &str, start: &str, end: &str) -> Result<Boxed> {
        let field = self.date_field(name, start)?;
        let from = self.resolve_date(name, start)?;
        let to = self.resolve_date(name, end)?;
        let window = DateWindow::through_day(from, to).ok_or_else(|| {
            translate_error(name, end, "date out of range")
        })?;
        Ok(date_range(field, window))
    }

    fn wildcard(
        &self,
        name: &str,
        pattern: &str,
        kind: WildcardKind,
    ) -> Result<Boxed> {
        let field = if name.is_empty() {
            DocField::Body
        } else {
            DocField::resolve(name)
        };
        let normalized = kind.normalize(&pattern.to_lowercase());
        let regex: String = normalized
            .chars()
            .map(|c| match c {
                '*' => ".*".to_string(),
                '?' => ".".to_string(),
                c => regex::escape(c.encode_utf8(&mut [0; 4])),
            })
            .collect();
        self.pattern(name, &field, &regex)
    }

    /// Regular-expression match over the indexed terms of `field`.
    fn pattern(
        &self,
        name: &str,
        field: &DocField,
        regex: &str,
    ) -> Result<Boxed> {
        let f = self.fields;
        let (target, regex) = match field {
            DocField::Title => (f.title_raw, regex.to_string()),
            DocField::Lead => (f.lead_raw, regex.to_string()),
            DocField::Body => (f.body_raw, regex.to_string()),
            DocField::Tags => (f.tags, regex.to_string()),
            DocField::Path => (f.path_lc, regex.to_string()),
            DocField::Checksum => (f.checksum, regex.to_string()),
            DocField::Meta(key) => {
                (f.meta, format!("{}={regex}", regex::escape(key)))
            }
            DocField::Created | DocField::Modified => {
                return Err(translate_error(
                    name,
                    regex,
                    "wildcards do not apply to dates",
                ));
            }
        };
        Ok(Box::new(RegexQuery::from_pattern(&regex, target)?))
    }

    fn path_prefix(&self, prefix: &str) -> Result<Boxed> {
        let regex = format!("{}.*", regex::escape(&prefix.to_lowercase()));
        Ok(Box::new(RegexQuery::from_pattern(&regex, self.fields.path_lc)?))
    }

    fn date_field(&self, name: &str, value: &str) -> Result<Field> {
        match DocField::resolve(name) {
            DocField::Created => Ok(self.fields.created),
            DocField::Modified => Ok(self.fields.modified),
            _ => Err(translate_error(name, value, "not a date field")),
        }
    }

    fn resolve_date(&self, name: &str, value: &str) -> Result<DateTime<Utc>> {
        dates::resolve(value, self.now).ok_or_else(|| {
            translate_error(name, value, "unrecognized date")
        })
    }
}

fn translate_error(field: &str, value: &str, reason: &str) -> Error {
    Error::Translate {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// The indexed `meta` entry for a frontmatter key/value pair.
pub(crate) fn meta_entry(key: &str, value: &str) -> String {
    format!("{}={}", key.trim().to_lowercase(), value.trim().to_lowercase())
}

fn keyword(field: Field, value: &str) -> Boxed {
    Box::new(TermQuery::new(
        Term::from_field_text(field, value),
        IndexRecordOption::Basic,
    ))
}

/// Everything except what `inner` matches.
fn negate(inner: Boxed) -> Boxed {
    Box::new(BooleanQuery::new(vec![
        (Occur::Must, Box::new(AllQuery)),
        (Occur::MustNot, inner),
    ]))
}

/// ANDs the clauses. Without any positive clause the universal set is the
/// base, so pure exclusions still match.
fn conjunction(mut clauses: Vec<(Occur, Boxed)>) -> Boxed {
    if !clauses.iter().any(|(occur, _)| *occur == Occur::Must) {
        clauses.push((Occur::Must, Box::new(AllQuery)));
    }
    if clauses.len() == 1 {
        if let Some((_, only)) = clauses.pop() {
            return only;
        }
    }
    Box::new(BooleanQuery::new(clauses))
}

fn date_range(field: Field, window: DateWindow) -> Boxed {
    let term = |t: DateTime<Utc>| {
        Term::from_field_date(
            field,
            tantivy::DateTime::from_timestamp_secs(t.timestamp()),
        )
    };
    let bound = |b: Bound<DateTime<Utc>>| match b {
        Bound::Included(t) => Bound::Included(term(t)),
        Bound::Excluded(t) => Bound::Excluded(term(t)),
        Bound::Unbounded => Bound::Unbounded,
    };
    Box::new(RangeQuery::new(bound(window.start), bound(window.end)))
}
