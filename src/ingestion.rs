//! Turning a notebook directory into [`Document`]s.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde_yaml::{Mapping, Value};

use crate::cancel::CancelToken;
use crate::dates;
use crate::document::Document;
use crate::error::Result;
use crate::index::DocumentSource;
use crate::text_util::{collapse_whitespace, first_paragraph};
use crate::walker::{self, NoteFile};

/// Frontmatter keys consumed by the document itself rather than stored
/// as metadata.
const RESERVED_KEYS: &[&str] =
    &["title", "tags", "tag", "created", "date", "modified", "updated"];

/// Every markdown note under a directory.
#[derive(Debug, Clone)]
pub struct NotebookSource {
    root: PathBuf,
}

impl NotebookSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DocumentSource for NotebookSource {
    fn load(&self, cancel: &CancelToken) -> Result<Vec<Document>> {
        let files = walker::discover_notes(&self.root, cancel)?;
        tracing::info!(
            root = %self.root.display(),
            files = files.len(),
            "reading notebook"
        );

        // Read in parallel; the walk order is kept.
        let documents: Vec<Document> = files
            .par_iter()
            .filter_map(|file| {
                if cancel.is_cancelled() {
                    return None;
                }
                read_note(file)
            })
            .collect();
        cancel.check()?;
        Ok(documents)
    }
}

fn read_note(file: &NoteFile) -> Option<Document> {
    match std::fs::read(&file.absolute_path) {
        Ok(raw) => {
            let content = String::from_utf8_lossy(&raw);
            let doc = parse_note(&file.key(), &content, file.modified)
                .with_checksum(blake3::hash(&raw).to_hex().to_string());
            Some(doc)
        }
        Err(err) => {
            tracing::warn!(
                path = %file.absolute_path.display(),
                error = %err,
                "skipping unreadable note"
            );
            None
        }
    }
}

/// Build a document from a note's text.
///
/// The title comes from the `title` frontmatter key, then the first `# `
/// heading, then the file stem. `modified` is used unless the
/// frontmatter carries a `modified` or `updated` date.
pub fn parse_note(
    path: &str,
    content: &str,
    modified: Option<DateTime<Utc>>,
) -> Document {
    let (frontmatter, body) = split_frontmatter(content);
    let frontmatter = match frontmatter.map(parse_frontmatter).transpose() {
        Ok(mapping) => mapping.unwrap_or_default(),
        Err(err) => {
            tracing::warn!(path, error = %err, "ignoring invalid frontmatter");
            Mapping::new()
        }
    };

    let now = Utc::now();
    let get = |key: &str| frontmatter.get(key).filter(|v| !v.is_null());
    let date = |keys: &[&str]| {
        keys.iter()
            .filter_map(|key| get(*key).and_then(scalar))
            .find_map(|value| dates::resolve(&value, now))
    };

    let title = get("title")
        .and_then(scalar)
        .filter(|t| !t.trim().is_empty())
        .or_else(|| first_heading(body))
        .unwrap_or_else(|| file_stem(path));

    let mut tags = BTreeSet::new();
    for key in ["tags", "tag"] {
        if let Some(value) = get(key) {
            collect_tags(value, &mut tags);
        }
    }

    let mut doc = Document::new(path)
        .with_title(title.trim())
        .with_body(body)
        .with_lead(collapse_whitespace(first_paragraph(body)))
        .with_tags(tags);
    if let Some(created) = date(&["created", "date"]) {
        doc = doc.with_created(created);
    }
    if let Some(modified) = date(&["modified", "updated"]).or(modified) {
        doc = doc.with_modified(modified);
    }

    for (key, value) in &frontmatter {
        let Some(key) = key.as_str().map(str::to_lowercase) else {
            continue;
        };
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        match serde_json::to_value(value) {
            Ok(json) => doc = doc.with_metadata(key, json),
            Err(err) => {
                tracing::debug!(path, key, error = %err, "skipping metadata");
            }
        }
    }
    doc
}

/// Split `---` delimited YAML frontmatter from the body.
fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, content);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            let body = &rest[offset + line.len()..];
            return (Some(&rest[..offset]), body);
        }
        offset += line.len();
    }
    (None, content)
}

fn parse_frontmatter(yaml: &str) -> Result<Mapping> {
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(yaml)? {
        Value::Mapping(mapping) => Ok(mapping),
        _ => Ok(Mapping::new()),
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Tags may be a list or a comma separated string.
fn collect_tags(value: &Value, tags: &mut BTreeSet<String>) {
    match value {
        Value::Sequence(items) => {
            for item in items {
                collect_tags(item, tags);
            }
        }
        other => {
            if let Some(text) = scalar(other) {
                tags.extend(
                    text.split(',')
                        .map(|t| t.trim().trim_start_matches('#'))
                        .filter(|t| !t.is_empty())
                        .map(str::to_string),
                );
            }
        }
    }
}

fn first_heading(body: &str) -> Option<String> {
    body.lines()
        .filter_map(|line| line.trim().strip_prefix("# "))
        .map(str::trim)
        .find(|heading| !heading.is_empty())
        .map(str::to_string)
}

fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string()
}
