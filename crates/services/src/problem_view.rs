use std::fs;

use coach_core::model::ProblemEntry;

use crate::error::{LabArchiveError, ProblemFileError, ProgressServiceError};
use crate::lab_archive::{LabArchive, archive_dir, archive_file_name};
use crate::progress_service::ProgressService;

/// Appended to the display label of completed problems.
pub const COMPLETION_MARKER: &str = " ✅";

/// A catalog entry bound to live status from the Progress Store.
#[derive(Clone, Copy)]
pub struct ProblemView<'a> {
    entry: &'a ProblemEntry,
    progress: &'a ProgressService,
}

impl<'a> ProblemView<'a> {
    #[must_use]
    pub fn new(entry: &'a ProblemEntry, progress: &'a ProgressService) -> Self {
        Self { entry, progress }
    }

    #[must_use]
    pub fn entry(&self) -> &'a ProblemEntry {
        self.entry
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failures.
    pub async fn is_completed(&self) -> Result<bool, ProgressServiceError> {
        self.progress.is_completed(self.entry.id()).await
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failures.
    pub async fn is_current(&self) -> Result<bool, ProgressServiceError> {
        Ok(self.progress.current_problem().await?.as_ref() == Some(self.entry.id()))
    }

    /// The problem name, followed by a marker once completed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failures.
    pub async fn display_label(&self) -> Result<String, ProgressServiceError> {
        let marker = if self.is_completed().await? {
            COMPLETION_MARKER
        } else {
            ""
        };
        Ok(format!("{}{marker}", self.entry.name()))
    }

    /// Flip the completion mark and return the new state.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failures.
    pub async fn toggle_completion(&self) -> Result<bool, ProgressServiceError> {
        let id = self.entry.id();
        if self.is_completed().await? {
            self.progress.unmark_completed(id).await?;
            Ok(false)
        } else {
            self.progress.mark_completed(id).await?;
            Ok(true)
        }
    }

    /// Package the lab directory. Rebuilt on every call.
    ///
    /// # Errors
    ///
    /// Returns `LabArchiveError::NoLabAvailable` when the problem has no lab,
    /// or `LabArchiveError::Io` if the files cannot be read.
    pub fn build_lab_archive(&self) -> Result<LabArchive, LabArchiveError> {
        let lab_dir = self
            .entry
            .lab_dir()
            .ok_or_else(|| LabArchiveError::NoLabAvailable(self.entry.id().clone()))?;
        let bytes = archive_dir(lab_dir)?;
        Ok(LabArchive {
            file_name: archive_file_name(self.entry.name(), self.entry.id().slug()),
            bytes,
        })
    }

    #[must_use]
    pub fn hint_names(&self) -> Vec<String> {
        self.entry
            .hint_files()
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect()
    }

    /// Read hint `number` (1-based, in hint order).
    ///
    /// # Errors
    ///
    /// Returns `ProblemFileError` if the hint does not exist or cannot be read.
    pub fn read_hint(&self, number: usize) -> Result<String, ProblemFileError> {
        let path = number
            .checked_sub(1)
            .and_then(|index| self.entry.hint_files().get(index))
            .ok_or(ProblemFileError::NoSuchHint(number))?;
        fs::read_to_string(path).map_err(|source| ProblemFileError::Io {
            path: path.clone(),
            source,
        })
    }

    /// # Errors
    ///
    /// Returns `ProblemFileError::Io` if the solution file cannot be read.
    pub fn read_solution(&self) -> Result<String, ProblemFileError> {
        let path = self.entry.solution_file();
        fs::read_to_string(path).map_err(|source| ProblemFileError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
