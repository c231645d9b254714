use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};

use crate::cancel::CancelToken;
use crate::error::Result;

/// A note file found in a notebook.
#[derive(Debug, Clone)]
pub struct NoteFile {
    /// Path relative to the notebook root.
    pub relative_path: PathBuf,
    /// Fully resolved absolute path.
    pub absolute_path: PathBuf,
    /// Last modification time, when the filesystem reports one.
    pub modified: Option<DateTime<Utc>>,
}

impl NoteFile {
    /// The relative path with `/` separators, as stored in the index.
    pub fn key(&self) -> String {
        self.relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

const NOTE_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Recursively find the notes under `root`.
///
/// Skips hidden files and directories (names starting with `.`), follows
/// symlinks, and never enters the same directory twice so link cycles
/// terminate. Results are sorted by relative path.
pub fn discover_notes(
    root: &Path,
    cancel: &CancelToken,
) -> Result<Vec<NoteFile>> {
    let canonical_root = root.canonicalize()?;
    let mut walk = Walk {
        visited: HashSet::from([canonical_root.clone()]),
        results: Vec::new(),
        cancel,
    };
    walk.dir(&canonical_root, Path::new(""))?;
    let mut results = walk.results;
    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

struct Walk<'a> {
    visited: HashSet<PathBuf>,
    results: Vec<NoteFile>,
    cancel: &'a CancelToken,
}

impl Walk<'_> {
    fn dir(&mut self, current: &Path, relative: &Path) -> Result<()> {
        self.cancel.check()?;
        for entry in std::fs::read_dir(current)? {
            let entry = entry?;
            let file_name = entry.file_name();
            if file_name.to_string_lossy().starts_with('.') {
                continue;
            }
            let relative = relative.join(&file_name);

            let file_type = entry.file_type()?;
            let resolved = if file_type.is_symlink() {
                match entry.path().canonicalize() {
                    Ok(p) => p,
                    Err(_) => {
                        tracing::debug!(
                            path = %entry.path().display(),
                            "skipping broken symlink"
                        );
                        continue;
                    }
                }
            } else {
                entry.path()
            };

            if resolved.is_dir() {
                let canonical = resolved.canonicalize()?;
                if self.visited.insert(canonical.clone()) {
                    self.dir(&canonical, &relative)?;
                }
            } else if resolved.is_file() && is_note(&resolved) {
                self.results.push(NoteFile {
                    modified: modified_at(&resolved),
                    relative_path: relative,
                    absolute_path: resolved,
                });
            }
        }
        Ok(())
    }
}

fn is_note(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            NOTE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        })
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}
