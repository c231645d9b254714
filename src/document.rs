use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An indexed note.
///
/// `path` is the unique key: adding a document whose path is already
/// indexed replaces the previous entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Path relative to the notebook root, e.g. `projects/todo.md`.
    pub path: String,
    pub title: String,
    /// Full text with frontmatter stripped.
    pub body: String,
    /// First paragraph of the body, used for snippets.
    pub lead: String,
    /// Lower-cased tags.
    pub tags: BTreeSet<String>,
    /// Remaining frontmatter fields.
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub checksum: String,
}

impl Document {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_lead(mut self, lead: impl Into<String>) -> Self {
        self.lead = lead.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags
            .extend(tags.into_iter().map(|t| t.as_ref().trim().to_lowercase()));
        self
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = checksum.into();
        self
    }

    /// Flattened, trimmed values of a metadata key.
    ///
    /// Arrays contribute one value per scalar element; nulls and nested
    /// objects contribute nothing.
    pub fn metadata_values(&self, key: &str) -> Vec<String> {
        let Some(value) = self.metadata.get(key) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        flatten_value(value, &mut out);
        out
    }

    /// Raw string values of `field`, as the query language names it.
    pub fn values_of(&self, field: &DocField) -> Vec<String> {
        let text = |s: &str| {
            if s.is_empty() {
                Vec::new()
            } else {
                vec![s.to_string()]
            }
        };
        match field {
            DocField::Path => text(&self.path),
            DocField::Title => text(&self.title),
            DocField::Body => text(&self.body),
            DocField::Lead => text(&self.lead),
            DocField::Tags => self.tags.iter().cloned().collect(),
            DocField::Checksum => text(&self.checksum),
            DocField::Created => self
                .created
                .map(|d| vec![d.to_rfc3339()])
                .unwrap_or_default(),
            DocField::Modified => self
                .modified
                .map(|d| vec![d.to_rfc3339()])
                .unwrap_or_default(),
            DocField::Meta(key) => self.metadata_values(key),
        }
    }

    /// Names of the fields holding a non-empty value, in the form used by
    /// `has:` / `missing:` lookups.
    pub fn present_fields(&self) -> Vec<String> {
        let mut present: Vec<String> = DocField::CORE
            .iter()
            .filter(|f| !self.values_of(f).is_empty())
            .map(|f| f.presence_key())
            .collect();
        for key in self.metadata.keys() {
            if !self.metadata_values(key).is_empty() {
                present.push(format!("meta:{}", key.to_lowercase()));
            }
        }
        present
    }
}

fn flatten_value(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::Null | serde_json::Value::Object(_) => {}
        serde_json::Value::String(s) => {
            if !s.trim().is_empty() {
                out.push(s.trim().to_string());
            }
        }
        serde_json::Value::Bool(b) => out.push(b.to_string()),
        serde_json::Value::Number(n) => out.push(n.to_string()),
        serde_json::Value::Array(items) => {
            for item in items {
                flatten_value(item, out);
            }
        }
    }
}

/// A document field as addressed by the query language.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocField {
    Path,
    Title,
    Body,
    Lead,
    Tags,
    Created,
    Modified,
    Checksum,
    /// A frontmatter key, lower-cased.
    Meta(String),
}

impl DocField {
    pub const CORE: [DocField; 8] = [
        DocField::Path,
        DocField::Title,
        DocField::Body,
        DocField::Lead,
        DocField::Tags,
        DocField::Created,
        DocField::Modified,
        DocField::Checksum,
    ];

    /// Map a query field name (with aliases) onto a document field.
    ///
    /// Names that are not core fields address frontmatter metadata;
    /// `metadata.x`, `meta.x` and `data.x` prefixes are stripped first.
    pub fn resolve(name: &str) -> Self {
        let lower = name.trim().to_lowercase();
        match lower.as_str() {
            "path" | "p" => DocField::Path,
            "title" | "t" => DocField::Title,
            "body" | "content" | "b" => DocField::Body,
            "lead" => DocField::Lead,
            "tag" | "tags" => DocField::Tags,
            "created" | "date" => DocField::Created,
            "modified" | "updated" => DocField::Modified,
            "checksum" => DocField::Checksum,
            _ => {
                let key = ["metadata.", "meta.", "data."]
                    .iter()
                    .find_map(|prefix| lower.strip_prefix(prefix))
                    .unwrap_or(&lower);
                match key {
                    "tag" | "tags" => DocField::Tags,
                    _ => DocField::Meta(key.to_string()),
                }
            }
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, DocField::Created | DocField::Modified)
    }

    /// Analyzed full-text fields, as opposed to exact keyword fields.
    pub fn is_text(&self) -> bool {
        matches!(self, DocField::Title | DocField::Body | DocField::Lead)
    }

    pub fn presence_key(&self) -> String {
        match self {
            DocField::Path => "path".into(),
            DocField::Title => "title".into(),
            DocField::Body => "body".into(),
            DocField::Lead => "lead".into(),
            DocField::Tags => "tags".into(),
            DocField::Created => "created".into(),
            DocField::Modified => "modified".into(),
            DocField::Checksum => "checksum".into(),
            DocField::Meta(key) => format!("meta:{key}"),
        }
    }
}
