//! Evaluates a [`Query`] against a single in-memory [`Document`].
//!
//! Used to apply structured conditions to candidates that come from a
//! backend unable to evaluate them itself, such as semantic search. The
//! rules follow the tantivy translation as closely as plain string
//! matching allows: text fields use case-insensitive containment instead
//! of stemmed tokens.

use chrono::{DateTime, Utc};
use globset::GlobBuilder;

use crate::dates::{self, DateWindow};
use crate::document::{DocField, Document};
use crate::error::{Error, Result};
use crate::query::{CompareOp, Expr, Query, WildcardKind};

/// Whether `doc` satisfies every top-level expression of `query`.
///
/// An empty query matches every document.
pub fn matches(
    query: &Query,
    doc: &Document,
    now: DateTime<Utc>,
) -> Result<bool> {
    for expr in &query.expressions {
        if !matches_expr(expr, doc, now)? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub fn matches_expr(
    expr: &Expr,
    doc: &Document,
    now: DateTime<Utc>,
) -> Result<bool> {
    match expr {
        Expr::Term { value } => {
            let needle = value.to_lowercase();
            Ok([&doc.title, &doc.lead, &doc.body]
                .iter()
                .any(|text| text.to_lowercase().contains(&needle)))
        }
        Expr::Field { field, op, value } => {
            field_matches(field, *op, value, doc, now)
        }
        Expr::Not { inner } => Ok(!matches_expr(inner, doc, now)?),
        Expr::Or { left, right } => Ok(matches_expr(left, doc, now)?
            || matches_expr(right, doc, now)?),
        Expr::And { expressions } => {
            for e in expressions {
                if !matches_expr(e, doc, now)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Expr::Date { field, op, value } => {
            date_matches(field, *op, value, doc, now)
        }
        Expr::Range { field, start, end } => {
            let from = resolve_date(field, start, now)?;
            let to = resolve_date(field, end, now)?;
            let window = DateWindow::through_day(from, to).ok_or_else(|| {
                mismatch(field, end, "date out of range")
            })?;
            Ok(date_of(field, end, doc)?.is_some_and(|t| window.contains(t)))
        }
        Expr::Wildcard {
            field,
            pattern,
            kind,
        } => wildcard_matches(field, pattern, *kind, doc),
        Expr::Exists { field, negated } => {
            let key = DocField::resolve(field).presence_key();
            let present = doc.present_fields().contains(&key);
            Ok(present != *negated)
        }
    }
}

fn field_matches(
    name: &str,
    op: CompareOp,
    value: &str,
    doc: &Document,
    now: DateTime<Utc>,
) -> Result<bool> {
    let field = DocField::resolve(name);
    if field.is_date() {
        return date_matches(name, op, value, doc, now);
    }
    if op.is_ordering() {
        return Err(mismatch(
            name,
            value,
            "comparison operators apply only to created and modified",
        ));
    }

    let needle = value.trim().to_lowercase();
    let values = doc.values_of(&field);
    let mut values = values.iter().map(|v| v.to_lowercase());
    Ok(match op {
        CompareOp::Equals if field.is_text() => {
            values.any(|v| v.contains(&needle))
        }
        CompareOp::Equals
            if field == DocField::Path && needle.ends_with('/') =>
        {
            values.any(|v| v.starts_with(&needle))
        }
        CompareOp::Equals => values.any(|v| v == needle),
        CompareOp::Prefix => values.any(|v| v.starts_with(&needle)),
        CompareOp::Suffix => values.any(|v| v.ends_with(&needle)),
        CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
            false
        }
    })
}

fn date_matches(
    name: &str,
    op: CompareOp,
    value: &str,
    doc: &Document,
    now: DateTime<Utc>,
) -> Result<bool> {
    let resolved = dates::resolve_value(value, now)
        .ok_or_else(|| mismatch(name, value, "unrecognized date"))?;
    let window = DateWindow::for_value(op, resolved)
        .ok_or_else(|| mismatch(name, value, "unsupported date operator"))?;
    Ok(date_of(name, value, doc)?.is_some_and(|t| window.contains(t)))
}

fn wildcard_matches(
    name: &str,
    pattern: &str,
    kind: WildcardKind,
    doc: &Document,
) -> Result<bool> {
    let field = if name.is_empty() {
        DocField::Body
    } else {
        DocField::resolve(name)
    };
    if field.is_date() {
        return Err(mismatch(
            name,
            pattern,
            "wildcards do not apply to dates",
        ));
    }

    let glob = GlobBuilder::new(&kind.normalize(pattern))
        .case_insensitive(true)
        .literal_separator(false)
        .build()?
        .compile_matcher();

    let values = doc.values_of(&field);
    if field.is_text() {
        // Text fields match word by word, like the indexed tokens.
        Ok(values
            .iter()
            .flat_map(|v| v.split(|c: char| !c.is_alphanumeric()))
            .filter(|word| !word.is_empty())
            .any(|word| glob.is_match(word)))
    } else {
        Ok(values.iter().any(|v| glob.is_match(v)))
    }
}

fn date_of(
    name: &str,
    value: &str,
    doc: &Document,
) -> Result<Option<DateTime<Utc>>> {
    match DocField::resolve(name) {
        DocField::Created => Ok(doc.created),
        DocField::Modified => Ok(doc.modified),
        _ => Err(mismatch(name, value, "not a date field")),
    }
}

fn resolve_date(
    name: &str,
    value: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    dates::resolve(value, now)
        .ok_or_else(|| mismatch(name, value, "unrecognized date"))
}

fn mismatch(field: &str, value: &str, reason: &str) -> Error {
    Error::Translate {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
