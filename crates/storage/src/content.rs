//! Problem discovery from the content tree.
//!
//! Every directory holding a `problem.md` is one problem. Hints (`step*.md`),
//! the solution (`solution.md`) and an optional `lab/` directory sit next to it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use coach_core::ProblemCatalog;
use coach_core::model::{ProblemDocument, ProblemEntry, ProblemFiles, ProblemId};
use thiserror::Error;

pub const DEFINITION_FILE: &str = "problem.md";
pub const SOLUTION_FILE: &str = "solution.md";
pub const LAB_DIR: &str = "lab";
const HINT_PREFIX: &str = "step";
const HINT_SUFFIX: &str = ".md";

/// Failure to load one problem, or to read the content root itself.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    #[error("content root {path} cannot be read: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed problem definition {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: coach_core::Error,
    },
}

/// Result of a scan: every problem that loaded, plus what was skipped.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub entries: Vec<ProblemEntry>,
    pub skipped: Vec<DiscoveryError>,
}

impl DiscoveryReport {
    #[must_use]
    pub fn into_catalog(self) -> ProblemCatalog {
        ProblemCatalog::new(self.entries)
    }
}

/// Scan `root` recursively for problem definitions.
///
/// A broken problem is skipped with a warning and recorded in the report; the
/// scan itself only fails when the root cannot be listed.
///
/// # Errors
///
/// Returns `DiscoveryError::Root` if the content root cannot be read.
pub fn discover(root: &Path) -> Result<DiscoveryReport, DiscoveryError> {
    let top = sorted_entries(root).map_err(|source| DiscoveryError::Root {
        path: root.to_path_buf(),
        source,
    })?;

    let mut report = DiscoveryReport::default();
    visit(root, root, top, &mut report);

    tracing::debug!(
        root = %root.display(),
        problems = report.entries.len(),
        skipped = report.skipped.len(),
        "content discovery finished"
    );
    Ok(report)
}

fn visit(root: &Path, dir: &Path, children: Vec<fs::DirEntry>, report: &mut DiscoveryReport) {
    let is_problem = children
        .iter()
        .any(|child| child.file_name() == DEFINITION_FILE && is_file(child));

    if is_problem {
        match load_entry(root, dir, &children) {
            Ok(entry) => report.entries.push(entry),
            Err(err) => {
                tracing::warn!(error = %err, "skipping problem");
                report.skipped.push(err);
            }
        }
    }

    for child in children {
        let Ok(file_type) = child.file_type() else {
            continue;
        };
        if !file_type.is_dir() {
            continue;
        }
        let name = child.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || (is_problem && name == LAB_DIR) {
            continue;
        }

        let path = child.path();
        match sorted_entries(&path) {
            Ok(grandchildren) => visit(root, &path, grandchildren, report),
            Err(source) => {
                let err = DiscoveryError::Unreadable { path, source };
                tracing::warn!(error = %err, "skipping directory");
                report.skipped.push(err);
            }
        }
    }
}

fn load_entry(
    root: &Path,
    dir: &Path,
    children: &[fs::DirEntry],
) -> Result<ProblemEntry, DiscoveryError> {
    let definition = dir.join(DEFINITION_FILE);
    let source = fs::read_to_string(&definition).map_err(|source| DiscoveryError::Unreadable {
        path: definition.clone(),
        source,
    })?;
    let malformed = |source: coach_core::Error| DiscoveryError::Malformed {
        path: definition.clone(),
        source,
    };

    let document = ProblemDocument::parse(&source).map_err(|err| malformed(err.into()))?;
    let id = ProblemId::new(relative_id(root, dir)).map_err(|err| malformed(err.into()))?;
    let group = dir
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let hint_files = children
        .iter()
        .filter(|child| is_file(child) && is_hint_name(&child.file_name().to_string_lossy()))
        .map(fs::DirEntry::path)
        .collect();

    let lab = dir.join(LAB_DIR);
    let lab_dir = lab.is_dir().then_some(lab);

    Ok(ProblemEntry::new(
        id,
        group,
        document,
        ProblemFiles {
            directory: dir.to_path_buf(),
            hint_files,
            solution_file: dir.join(SOLUTION_FILE),
            lab_dir,
        },
    ))
}

/// Directory path relative to the root, `/`-separated; the root itself is `.`.
fn relative_id(root: &Path, dir: &Path) -> String {
    let relative = dir.strip_prefix(root).unwrap_or(dir);
    let parts: Vec<_> = relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

fn is_hint_name(name: &str) -> bool {
    name.starts_with(HINT_PREFIX) && name.ends_with(HINT_SUFFIX)
}

fn is_file(entry: &fs::DirEntry) -> bool {
    entry.file_type().is_ok_and(|ft| ft.is_file())
}

/// Directory listing sorted by file name, so discovery order is stable.
fn sorted_entries(dir: &Path) -> io::Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(fs::DirEntry::file_name);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_id_uses_forward_slashes() {
        let root = Path::new("/content");
        assert_eq!(
            relative_id(root, &root.join("arrays").join("two-sum")),
            "arrays/two-sum"
        );
        assert_eq!(relative_id(root, root), ".");
    }

    #[test]
    fn hint_names_match_step_pattern() {
        assert!(is_hint_name("step-01.md"));
        assert!(is_hint_name("step2.md"));
        assert!(!is_hint_name("solution.md"));
        assert!(!is_hint_name("step-01.txt"));
    }
}
