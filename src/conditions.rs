//! `field=value` conditions as given on the command line with `--and`,
//! `--or` and `--not`, and their conversion into a [`Query`].

use std::fmt;

use crate::error::{Error, Result};
use crate::query::{CompareOp, Expr, Query, WildcardKind};

/// Fields a condition may name.
pub const ALLOWED_FIELDS: &[&str] = &[
    "data.tag",
    "data.tags",
    "data.status",
    "data.priority",
    "data.assignee",
    "data.author",
    "data.type",
    "data.category",
    "data.project",
    "data.sprint",
    "path",
    "title",
    "links-to",
    "linked-by",
];

/// Longest accepted condition value, in bytes.
pub const MAX_VALUE_LENGTH: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    And,
    Or,
    Not,
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConditionKind::And => "and",
            ConditionKind::Or => "or",
            ConditionKind::Not => "not",
        })
    }
}

/// One validated `field=value` condition. Only equality is supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCondition {
    pub kind: ConditionKind,
    pub field: String,
    pub value: String,
}

/// Parse the `--and`, `--or` and `--not` flag values, in that order.
pub fn parse_conditions<S: AsRef<str>>(
    and: &[S],
    or: &[S],
    not: &[S],
) -> Result<Vec<QueryCondition>> {
    let groups = [
        (ConditionKind::And, and),
        (ConditionKind::Or, or),
        (ConditionKind::Not, not),
    ];
    let mut conditions = Vec::new();
    for (kind, flags) in groups {
        for flag in flags {
            conditions.push(parse_condition(kind, flag.as_ref())?);
        }
    }
    Ok(conditions)
}

fn parse_condition(kind: ConditionKind, flag: &str) -> Result<QueryCondition> {
    let Some((field, value)) = flag.split_once('=') else {
        return Err(Error::Condition(format!(
            "{flag} (expected field=value)"
        )));
    };
    let (field, value) = (field.trim(), value.trim());

    if !ALLOWED_FIELDS.contains(&field) {
        return Err(Error::Condition(format!(
            "unknown field {field} (allowed: {})",
            ALLOWED_FIELDS.join(", ")
        )));
    }
    if value.len() > MAX_VALUE_LENGTH {
        return Err(Error::Condition(format!(
            "value too long (max {MAX_VALUE_LENGTH} chars)"
        )));
    }
    if value.is_empty() {
        return Err(Error::Condition(format!(
            "value cannot be empty for field {field}"
        )));
    }

    Ok(QueryCondition {
        kind,
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Build a query from conditions.
///
/// AND conditions become top-level expressions, OR conditions fold left
/// into a single `Or` chain, NOT conditions are wrapped in `Not`. Link
/// fields are rejected.
pub fn build_query(conditions: &[QueryCondition]) -> Result<Query> {
    let mut and = Vec::new();
    let mut or = Vec::new();
    let mut not = Vec::new();

    for condition in conditions {
        let expr = condition_expr(condition)?;
        match condition.kind {
            ConditionKind::And => and.push(expr),
            ConditionKind::Or => or.push(expr),
            ConditionKind::Not => not.push(Expr::not(expr)),
        }
    }

    let counts = (and.len(), or.len(), not.len());
    let mut expressions = and;
    let mut or = or.into_iter();
    if let Some(first) = or.next() {
        expressions.push(or.fold(first, Expr::or));
    }
    expressions.extend(not);

    tracing::debug!(
        and = counts.0,
        or = counts.1,
        not = counts.2,
        "built query from conditions"
    );
    Ok(Query::new(expressions))
}

fn condition_expr(condition: &QueryCondition) -> Result<Expr> {
    let QueryCondition { field, value, .. } = condition;
    if let Some(key) = field.strip_prefix("data.") {
        let key = if key == "tags" { "tag" } else { key };
        return Ok(Expr::field(
            format!("metadata.{key}"),
            CompareOp::Equals,
            value,
        ));
    }
    match field.as_str() {
        "path" => Ok(path_expr(value)),
        "title" => Ok(Expr::field("title", CompareOp::Equals, value)),
        "links-to" | "linked-by" => Err(Error::Condition(format!(
            "link queries are not yet supported: {field} needs a link \
             graph index (supported: data.*, path, title)"
        ))),
        other => Err(Error::Condition(format!(
            "unsupported field {other} (allowed: data.*, path, title)"
        ))),
    }
}

/// `dir/` and `dir/*` are prefix matches, other globs are wildcards.
fn path_expr(value: &str) -> Expr {
    let globbed = value.contains('*') || value.contains('?');
    if !globbed {
        let op = if value.ends_with('/') {
            CompareOp::Prefix
        } else {
            CompareOp::Equals
        };
        return Expr::field("path", op, value);
    }

    if let Some(dir) = value.strip_suffix('*') {
        if dir.ends_with('/') && !dir.contains(['*', '?']) {
            return Expr::field("path", CompareOp::Prefix, dir);
        }
    }
    Expr::Wildcard {
        field: "path".into(),
        pattern: value.to_string(),
        kind: WildcardKind::detect(value),
    }
}
