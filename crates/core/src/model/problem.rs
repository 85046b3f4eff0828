use std::path::{Path, PathBuf};

use crate::model::{Metadata, ProblemDocument, ProblemId};

/// Files that sit next to a problem definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemFiles {
    pub directory: PathBuf,
    /// Hint files in lexicographic order (`step-01.md`, `step-02.md`, ...).
    pub hint_files: Vec<PathBuf>,
    pub solution_file: PathBuf,
    pub lab_dir: Option<PathBuf>,
}

/// One practice problem discovered in the content tree. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemEntry {
    id: ProblemId,
    group: String,
    metadata: Metadata,
    body: String,
    files: ProblemFiles,
}

impl ProblemEntry {
    #[must_use]
    pub fn new(
        id: ProblemId,
        group: impl Into<String>,
        document: ProblemDocument,
        files: ProblemFiles,
    ) -> Self {
        Self {
            id,
            group: group.into(),
            metadata: document.metadata,
            body: document.body,
            files,
        }
    }

    #[must_use]
    pub fn id(&self) -> &ProblemId {
        &self.id
    }

    /// Name of the parent directory, used for categorization.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.files.directory
    }

    #[must_use]
    pub fn hint_files(&self) -> &[PathBuf] {
        &self.files.hint_files
    }

    #[must_use]
    pub fn solution_file(&self) -> &Path {
        &self.files.solution_file
    }

    #[must_use]
    pub fn lab_dir(&self) -> Option<&Path> {
        self.files.lab_dir.as_deref()
    }

    #[must_use]
    pub fn has_lab(&self) -> bool {
        self.files.lab_dir.is_some()
    }
}
