//! Hand-written recursive-descent parser for the query language.
//!
//! ```text
//! query      := and-chain ( "OR" and-chain )*
//! and-chain  := expression+
//! expression := "-" atom | atom
//! atom       := field ":" op? value | "has:" name | "missing:" name
//!             | word | "quoted text"
//! ```
//!
//! Juxtaposition binds tighter than `OR`, and `OR` chains fold to the left.
//! There is no grouping operator. Date values are kept verbatim here and
//! resolved when the query is translated.

use serde::Serialize;

use crate::query::{CompareOp, Expr, Query};

/// Field names accepted before a colon, besides `has` and `missing`.
pub const KNOWN_FIELDS: &[&str] = &[
    "tag", "tags", "title", "path", "created", "modified", "body", "lead",
    "status",
];

const DATE_FIELDS: &[&str] = &["created", "modified"];

const OR_HINT: &str = "put a term on both sides of OR, e.g. work OR home";

/// A query that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", self.render())]
pub struct ParseError {
    pub message: String,
    /// Byte offset into `input`.
    pub position: usize,
    /// 1-based.
    pub line: usize,
    /// 1-based, in characters.
    pub column: usize,
    pub input: String,
    pub suggestion: Option<String>,
}

impl ParseError {
    fn new(input: &str, position: usize, message: impl Into<String>) -> Self {
        let before = &input[..position.min(input.len())];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rsplit('\n')
            .next()
            .map_or(0, |tail| tail.chars().count())
            + 1;
        Self {
            message: message.into(),
            position,
            line,
            column,
            input: input.to_string(),
            suggestion: None,
        }
    }

    fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    fn render(&self) -> String {
        match &self.suggestion {
            Some(s) => format!("{}. Did you mean: {s}?", self.message),
            None => self.message.clone(),
        }
    }
}

/// Describes one field of the query language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub example: &'static str,
    pub supports_wildcard: bool,
    pub supports_range: bool,
    pub supports_comparison: bool,
}

const FIELD_SPECS: &[FieldSpec] = &[
    FieldSpec {
        name: "tag",
        description: "Filter by tag",
        example: "tag:work",
        supports_wildcard: true,
        supports_range: false,
        supports_comparison: false,
    },
    FieldSpec {
        name: "title",
        description: "Search in title",
        example: "title:meeting",
        supports_wildcard: true,
        supports_range: false,
        supports_comparison: false,
    },
    FieldSpec {
        name: "path",
        description: "Filter by path",
        example: "path:projects/*",
        supports_wildcard: true,
        supports_range: false,
        supports_comparison: false,
    },
    FieldSpec {
        name: "created",
        description: "Filter by creation date",
        example: "created:>2024-01-01",
        supports_wildcard: false,
        supports_range: true,
        supports_comparison: true,
    },
    FieldSpec {
        name: "modified",
        description: "Filter by modification date",
        example: "modified:<2024-06-30",
        supports_wildcard: false,
        supports_range: true,
        supports_comparison: true,
    },
    FieldSpec {
        name: "body",
        description: "Search in body only",
        example: "body:important",
        supports_wildcard: true,
        supports_range: false,
        supports_comparison: false,
    },
    FieldSpec {
        name: "lead",
        description: "Search in the first paragraph",
        example: "lead:summary",
        supports_wildcard: true,
        supports_range: false,
        supports_comparison: false,
    },
    FieldSpec {
        name: "status",
        description: "Filter by the frontmatter status field",
        example: "status:todo",
        supports_wildcard: true,
        supports_range: false,
        supports_comparison: false,
    },
];

/// Fields recognized by the query language, for help output and completion.
pub fn supported_fields() -> &'static [FieldSpec] {
    FIELD_SPECS
}

/// Parses query strings into [`Query`] trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self
    }

    /// Parse `input`. The returned query's `raw` is `input`, untouched.
    pub fn parse(&self, input: &str) -> Result<Query, ParseError> {
        let expressions = Cursor::new(input).query()?;
        Ok(Query {
            expressions,
            raw: input.to_string(),
        })
    }

    /// Succeeds exactly when [`Parser::parse`] does.
    pub fn validate(&self, input: &str) -> Result<(), ParseError> {
        self.parse(input).map(|_| ())
    }

    pub fn help(&self) -> &'static str {
        HELP
    }
}

/// Shorthand for `Parser::new().parse(input)`.
pub fn parse(input: &str) -> Result<Query, ParseError> {
    Parser::new().parse(input)
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, at: usize, message: impl Into<String>) -> ParseError {
        ParseError::new(self.input, at, message)
    }

    /// `OR` standing alone as a token.
    fn at_or_keyword(&self) -> bool {
        let rest = self.rest();
        rest.starts_with("OR")
            && rest[2..].chars().next().is_none_or(char::is_whitespace)
    }

    /// Consume characters until whitespace or a stop character.
    fn take_while_word(&mut self, stop: &[char]) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || stop.contains(&c) {
                break;
            }
            self.bump();
        }
        &self.input[start..self.pos]
    }

    fn query(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.skip_whitespace();
        if self.is_eof() {
            return Ok(Vec::new());
        }
        if self.at_or_keyword() {
            return Err(self
                .error(self.pos, "expected a search term before OR")
                .suggest(OR_HINT));
        }

        let first = self.and_chain()?;
        let mut left: Option<Expr> = None;
        loop {
            self.skip_whitespace();
            if self.is_eof() {
                break;
            }
            // and_chain only stops at end of input or at OR.
            let or_at = self.pos;
            self.pos += 2;
            self.skip_whitespace();
            if self.is_eof() || self.at_or_keyword() {
                return Err(self
                    .error(or_at, "expected a search term after OR")
                    .suggest(OR_HINT));
            }
            let right = Expr::and(self.and_chain()?);
            let acc = left.take().unwrap_or_else(|| Expr::and(first.clone()));
            left = Some(Expr::or(acc, right));
        }

        Ok(match left {
            Some(or) => vec![or],
            None => first,
        })
    }

    fn and_chain(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut expressions = Vec::new();
        loop {
            self.skip_whitespace();
            if self.is_eof() || self.at_or_keyword() {
                break;
            }
            expressions.push(self.expression()?);
        }
        Ok(expressions)
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        if self.peek() != Some('-') {
            return self.atom();
        }
        let dash = self.pos;
        self.bump();
        if self.peek().is_none_or(char::is_whitespace) {
            return Err(self
                .error(dash, "expected a term after '-'")
                .suggest("attach the term to the dash, e.g. -archived"));
        }
        Ok(Expr::not(self.atom()?))
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        if self.peek() == Some('"') {
            return Ok(Expr::term(self.quoted()?));
        }

        let start = self.pos;
        let word = self.take_while_word(&['"', ':']);
        if self.peek() != Some(':') {
            return Ok(bare_word(word));
        }
        if word.is_empty() {
            return Err(self
                .error(start, "expected a field name before ':'")
                .suggest("tag:work"));
        }

        self.bump();
        if self.peek() == Some(':') {
            return Err(self
                .error(self.pos, "unexpected ':'")
                .suggest("use single colon for field:value"));
        }

        let name = word.to_lowercase();
        if name == "has" || name == "missing" {
            return self.existence(&name);
        }
        if !KNOWN_FIELDS.contains(&name.as_str()) {
            let mut err =
                self.error(start, format!("unknown field \"{word}\""));
            if let Some(closest) = closest_field(&name) {
                err = err.suggest(closest);
            }
            return Err(err);
        }

        let op = self.comparison();
        let value_at = self.pos;
        let (value, quoted) = if self.peek() == Some('"') {
            (self.quoted()?, true)
        } else {
            (self.take_while_word(&['"']).to_string(), false)
        };
        if value.is_empty() && !quoted {
            return Err(self
                .error(value_at, format!("expected a value after '{name}:'"))
                .suggest("add a value after the colon (e.g., tag:work)"));
        }

        if DATE_FIELDS.contains(&name.as_str()) {
            if !quoted && op == CompareOp::Equals {
                if let Some((from, to)) = value.split_once("..") {
                    if from.is_empty() || to.is_empty() {
                        let message = "expected a date on both sides of '..'";
                        return Err(self
                            .error(value_at, message)
                            .suggest("created:2024-01-01..2024-06-30"));
                    }
                    return Ok(Expr::range(name, from, to));
                }
            }
            return Ok(Expr::date(name, op, value));
        }
        if !quoted && op == CompareOp::Equals && has_wildcard(&value) {
            return Ok(Expr::wildcard(name, value));
        }
        Ok(Expr::field(name, op, value))
    }

    fn existence(&mut self, keyword: &str) -> Result<Expr, ParseError> {
        let at = self.pos;
        let field = self.take_while_word(&['"', ':']);
        if field.is_empty() {
            return Err(self
                .error(at, format!("expected a field name after '{keyword}:'"))
                .suggest(format!("{keyword}:status")));
        }
        Ok(Expr::exists(field.to_lowercase(), keyword == "missing"))
    }

    fn comparison(&mut self) -> CompareOp {
        let rest = self.rest();
        let (op, len) = if rest.starts_with(">=") {
            (CompareOp::Gte, 2)
        } else if rest.starts_with("<=") {
            (CompareOp::Lte, 2)
        } else if rest.starts_with('>') {
            (CompareOp::Gt, 1)
        } else if rest.starts_with('<') {
            (CompareOp::Lt, 1)
        } else {
            (CompareOp::Equals, 0)
        };
        self.pos += len;
        op
    }

    fn quoted(&mut self) -> Result<String, ParseError> {
        let open = self.pos;
        self.bump();
        let Some(len) = self.rest().find('"') else {
            return Err(self
                .error(open, "unterminated quoted string")
                .suggest("close the quoted string"));
        };
        let value = self.rest()[..len].to_string();
        self.pos += len + 1;
        Ok(value)
    }
}

fn has_wildcard(value: &str) -> bool {
    value.contains('*') && !value.chars().all(|c| c == '*')
}

fn bare_word(word: &str) -> Expr {
    if has_wildcard(word) {
        Expr::wildcard("", word)
    } else {
        Expr::term(word)
    }
}

fn closest_field(name: &str) -> Option<&'static str> {
    KNOWN_FIELDS
        .iter()
        .chain(["has", "missing"].iter())
        .map(|field| (edit_distance(name, field), *field))
        .filter(|(distance, _)| *distance <= 2)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, field)| field)
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut row = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            row[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(row[j] + 1);
        }
        prev = row;
    }
    prev[b.len()]
}

const HELP: &str = "\
Query Syntax
============

Basic search:
  meeting               Notes containing \"meeting\"
  \"project plan\"        Notes containing the exact phrase

Field filters:
  tag:work              Notes tagged \"work\"
  title:meeting         \"meeting\" in the title
  path:projects/*       Notes under projects/
  body:important        Search only the body text
  lead:summary          Search only the first paragraph
  status:todo           Frontmatter status is \"todo\"

Dates:
  created:2024-01-01    Created on that day
  created:>2024-01-01   Created after that day
  modified:<=yesterday  Modified up to yesterday
  created:2024-01-01..2024-06-30
                        Created within the range (inclusive)
  Relative dates: today, yesterday, this-week, this-month

Wildcards:
  java*  *script  *log*  Prefix, suffix and contains matches

Existence:
  has:status            Notes with a status
  missing:tags          Notes without tags

Negation:
  -archived             Exclude notes containing \"archived\"
  -tag:done             Exclude notes tagged \"done\"

Combining:
  tag:work status:todo  Both must match (implicit AND)
  work OR home          Either matches; AND binds tighter than OR

Examples:
  tag:work title:meeting
  created:>2024-01-01 -archived
  \"project plan\" tag:urgent
";
