//! Backend-agnostic query AST.
//!
//! A [`Query`] is what the grammar parser produces and what every backend
//! translator consumes. Top-level expressions are implicitly ANDed:
//!
//! ```
//! use notesearch::query::{CompareOp, Expr};
//! use notesearch::parser::Parser;
//!
//! let query = Parser::new().parse("tag:work -archived").unwrap();
//! assert_eq!(
//!     query.expressions,
//!     vec![
//!         Expr::field("tag", CompareOp::Equals, "work"),
//!         Expr::not(Expr::term("archived")),
//!     ]
//! );
//! ```

use std::fmt;

use serde::Serialize;

/// A parsed search query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Query {
    /// Expressions combined with an implicit AND.
    pub expressions: Vec<Expr>,
    /// The query text this was parsed from, verbatim.
    pub raw: String,
}

impl Query {
    pub fn new(expressions: Vec<Expr>) -> Self {
        Self {
            expressions,
            raw: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// Returns a copy with one more top-level (ANDed) expression.
    pub fn and_also(&self, expr: Expr) -> Self {
        let mut next = self.clone();
        next.expressions.push(expr);
        next
    }
}

/// One node of the query tree.
///
/// The set is closed: translators match on every variant and there is no
/// catch-all arm anywhere in the crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expr {
    /// Free text matched against title, lead and body.
    Term { value: String },
    /// `field:value`, optionally with a comparison operator.
    Field {
        field: String,
        op: CompareOp,
        value: String,
    },
    /// Excludes documents matching the inner expression.
    Not { inner: Box<Expr> },
    /// Either operand matches.
    Or { left: Box<Expr>, right: Box<Expr> },
    /// Conjunction used only to carry precedence inside `Or`.
    And { expressions: Vec<Expr> },
    /// Date comparison; the value is resolved at translation time.
    Date {
        field: String,
        op: CompareOp,
        value: String,
    },
    /// Inclusive range, e.g. `created:2024-01-01..2024-06-30`.
    Range {
        field: String,
        start: String,
        end: String,
    },
    /// `java*`, `*java`, `*java*`. An empty field means the body.
    Wildcard {
        field: String,
        pattern: String,
        kind: WildcardKind,
    },
    /// `has:field` (negated = false) or `missing:field` (negated = true).
    Exists { field: String, negated: bool },
}

impl Expr {
    pub fn term(value: impl Into<String>) -> Self {
        Expr::Term {
            value: value.into(),
        }
    }

    pub fn field(
        field: impl Into<String>,
        op: CompareOp,
        value: impl Into<String>,
    ) -> Self {
        Expr::Field {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn not(inner: Expr) -> Self {
        Expr::Not {
            inner: Box::new(inner),
        }
    }

    pub fn date(
        field: impl Into<String>,
        op: CompareOp,
        value: impl Into<String>,
    ) -> Self {
        Expr::Date {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn range(
        field: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Expr::Range {
            field: field.into(),
            start: start.into(),
            end: end.into(),
        }
    }

    pub fn wildcard(
        field: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        let pattern = pattern.into();
        Expr::Wildcard {
            field: field.into(),
            kind: WildcardKind::detect(&pattern),
            pattern,
        }
    }

    pub fn exists(field: impl Into<String>, negated: bool) -> Self {
        Expr::Exists {
            field: field.into(),
            negated,
        }
    }

    // Boolean combinators are built by the grammar parser and the condition
    // builder only.
    pub(crate) fn or(left: Expr, right: Expr) -> Self {
        Expr::Or {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub(crate) fn and(mut expressions: Vec<Expr>) -> Self {
        if expressions.len() == 1 {
            expressions.remove(0)
        } else {
            Expr::And { expressions }
        }
    }

    /// Short variant name, used in logs and error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Term { .. } => "term",
            Expr::Field { .. } => "field",
            Expr::Not { .. } => "not",
            Expr::Or { .. } => "or",
            Expr::And { .. } => "and",
            Expr::Date { .. } => "date",
            Expr::Range { .. } => "range",
            Expr::Wildcard { .. } => "wildcard",
            Expr::Exists { .. } => "exists",
        }
    }
}

/// Comparison operator of a field or date expression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum CompareOp {
    /// Exact match for keyword fields, contains for text fields.
    #[default]
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "^")]
    Prefix,
    #[serde(rename = "$")]
    Suffix,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Equals => "=",
            CompareOp::Prefix => "^",
            CompareOp::Suffix => "$",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }

    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte
        )
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the `*` sits in a wildcard pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WildcardKind {
    /// `java*`
    Prefix,
    /// `*java`
    Suffix,
    /// `*java*`, or a star in the middle
    Both,
}

impl WildcardKind {
    pub fn detect(pattern: &str) -> Self {
        match (pattern.starts_with('*'), pattern.ends_with('*')) {
            (true, true) => WildcardKind::Both,
            (true, false) => WildcardKind::Suffix,
            (false, true) => WildcardKind::Prefix,
            (false, false) => WildcardKind::Both,
        }
    }

    /// The pattern with stars normalized to this kind's shape.
    pub fn normalize(self, pattern: &str) -> String {
        match self {
            WildcardKind::Prefix => {
                format!("{}*", pattern.trim_end_matches('*'))
            }
            WildcardKind::Suffix => {
                format!("*{}", pattern.trim_start_matches('*'))
            }
            WildcardKind::Both => {
                let inner = pattern.trim_matches('*');
                if inner.contains('*') {
                    pattern.to_string()
                } else {
                    format!("*{inner}*")
                }
            }
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, expr) in self.expressions.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{expr}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Term { value } => write_value(f, value),
            Expr::Field { field, op, value }
            | Expr::Date { field, op, value } => {
                write!(f, "{field}:")?;
                if op.is_ordering() {
                    write!(f, "{op}")?;
                }
                write_value(f, value)
            }
            Expr::Not { inner } => write!(f, "-{inner}"),
            Expr::Or { left, right } => write!(f, "{left} OR {right}"),
            Expr::And { expressions } => {
                for (i, expr) in expressions.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{expr}")?;
                }
                Ok(())
            }
            Expr::Range { field, start, end } => {
                write!(f, "{field}:{start}..{end}")
            }
            Expr::Wildcard { field, pattern, .. } if field.is_empty() => {
                f.write_str(pattern)
            }
            Expr::Wildcard { field, pattern, .. } => {
                write!(f, "{field}:{pattern}")
            }
            Expr::Exists { field, negated } => {
                let keyword = if *negated { "missing" } else { "has" };
                write!(f, "{keyword}:{field}")
            }
        }
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    if value.is_empty() || value.contains(char::is_whitespace) {
        write!(f, "\"{value}\"")
    } else {
        f.write_str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query() {
        assert!(Query::default().is_empty());
        assert!(!Query::new(vec![Expr::term("a")]).is_empty());
    }

    #[test]
    fn and_also_does_not_touch_original() {
        let base = Query::new(vec![Expr::field("tag", CompareOp::Equals, "x")]);
        let extended = base.and_also(Expr::term("meeting"));
        assert_eq!(base.expressions.len(), 1);
        assert_eq!(extended.expressions.len(), 2);
    }

    #[test]
    fn and_of_one_collapses() {
        let expr = Expr::and(vec![Expr::term("a")]);
        assert_eq!(expr, Expr::term("a"));
    }

    #[test]
    fn wildcard_kind_detection() {
        assert_eq!(WildcardKind::detect("java*"), WildcardKind::Prefix);
        assert_eq!(WildcardKind::detect("*java"), WildcardKind::Suffix);
        assert_eq!(WildcardKind::detect("*java*"), WildcardKind::Both);
        assert_eq!(WildcardKind::detect("ja*va"), WildcardKind::Both);
    }

    #[test]
    fn wildcard_normalize() {
        assert_eq!(WildcardKind::Prefix.normalize("java**"), "java*");
        assert_eq!(WildcardKind::Suffix.normalize("**java"), "*java");
        assert_eq!(WildcardKind::Both.normalize("java"), "*java*");
        assert_eq!(WildcardKind::Both.normalize("ja*va"), "ja*va");
    }

    #[test]
    fn display_renders_query_syntax() {
        let query = Query::new(vec![
            Expr::field("tag", CompareOp::Equals, "work"),
            Expr::date("created", CompareOp::Gte, "2024-01-01"),
            Expr::not(Expr::term("project plan")),
            Expr::or(Expr::term("a"), Expr::exists("status", true)),
        ]);
        assert_eq!(
            query.to_string(),
            "tag:work created:>=2024-01-01 -\"project plan\" a OR missing:status"
        );
    }
}
