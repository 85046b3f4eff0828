use std::sync::Arc;

use coach_core::model::{ChatTurn, ProblemEntry, ProblemId};
use coach_core::{CatalogPosition, ProblemCatalog};
use storage::repository::Storage;

use crate::coach::{ChatCompletion, CoachRegistry, CoachSettings};
use crate::error::StudyError;
use crate::lab_archive::LabArchive;
use crate::problem_view::ProblemView;
use crate::progress_service::ProgressService;

/// The problem to show, and where it sits in the grouped catalog.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedProblem<'a> {
    pub entry: &'a ProblemEntry,
    pub position: CatalogPosition,
    /// True when the stored current id was missing or unknown.
    pub fell_back: bool,
}

/// Everything one interactive session needs: catalog, progress, and coaching.
#[derive(Clone)]
pub struct StudyContext {
    catalog: Arc<ProblemCatalog>,
    progress: Arc<ProgressService>,
    coach: Arc<CoachRegistry>,
}

impl StudyContext {
    #[must_use]
    pub fn new(
        catalog: Arc<ProblemCatalog>,
        progress: Arc<ProgressService>,
        coach: Arc<CoachRegistry>,
    ) -> Self {
        Self {
            catalog,
            progress,
            coach,
        }
    }

    /// Assemble a context from storage and a coaching provider.
    #[must_use]
    pub fn from_storage(
        catalog: ProblemCatalog,
        storage: &Storage,
        provider: Arc<dyn ChatCompletion>,
        settings: CoachSettings,
    ) -> Self {
        let progress = Arc::new(ProgressService::new(Arc::clone(&storage.progress)));
        let coach = Arc::new(CoachRegistry::new(provider, settings));
        Self::new(Arc::new(catalog), progress, coach)
    }

    #[must_use]
    pub fn catalog(&self) -> &ProblemCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn coach(&self) -> Arc<CoachRegistry> {
        Arc::clone(&self.coach)
    }

    /// # Errors
    ///
    /// Returns `StudyError::UnknownProblemId` if the id is not in the catalog.
    pub fn problem(&self, id: &ProblemId) -> Result<&ProblemEntry, StudyError> {
        self.catalog
            .get(id)
            .ok_or_else(|| StudyError::UnknownProblemId(id.clone()))
    }

    /// # Errors
    ///
    /// Returns `StudyError::UnknownProblemId` if the id is not in the catalog.
    pub fn view(&self, id: &ProblemId) -> Result<ProblemView<'_>, StudyError> {
        Ok(ProblemView::new(self.problem(id)?, &self.progress))
    }

    /// The stored current problem, or the first problem when it is unset or unknown.
    ///
    /// Returns `None` only for an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns `StudyError` on storage failures.
    pub async fn resolve_current(&self) -> Result<Option<ResolvedProblem<'_>>, StudyError> {
        let stored = self.progress.current_problem().await?;

        if let Some(id) = &stored {
            if let (Some(entry), Some(position)) = (self.catalog.get(id), self.catalog.position(id))
            {
                return Ok(Some(ResolvedProblem {
                    entry,
                    position,
                    fell_back: false,
                }));
            }
            tracing::warn!(problem = %id, "stored current problem is not in the catalog");
        }

        Ok(self.catalog.first().and_then(|entry| {
            self.catalog
                .position(entry.id())
                .map(|position| ResolvedProblem {
                    entry,
                    position,
                    fell_back: true,
                })
        }))
    }

    /// Make `id` the current problem and record the visit.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::UnknownProblemId` for ids outside the catalog, or
    /// `StudyError` on storage failures.
    pub async fn select(&self, id: &ProblemId) -> Result<&ProblemEntry, StudyError> {
        let entry = self.problem(id)?;
        self.progress.set_current_problem(id).await?;
        self.progress.record_visit(id).await?;
        Ok(entry)
    }

    /// Recently visited problems, most recent first. Ids no longer in the catalog are dropped.
    ///
    /// # Errors
    ///
    /// Returns `StudyError` on storage failures.
    pub async fn recent_problems(&self) -> Result<Vec<&ProblemEntry>, StudyError> {
        let history = self.progress.history().await?;
        Ok(history
            .iter()
            .filter_map(|id| self.catalog.get(id))
            .collect())
    }

    /// # Errors
    ///
    /// Returns `StudyError` for unknown ids or storage failures.
    pub async fn toggle_completion(&self, id: &ProblemId) -> Result<bool, StudyError> {
        Ok(self.view(id)?.toggle_completion().await?)
    }

    /// # Errors
    ///
    /// Returns `StudyError` for unknown ids, problems without a lab, or I/O failures.
    pub fn lab_archive(&self, id: &ProblemId) -> Result<LabArchive, StudyError> {
        Ok(self.view(id)?.build_lab_archive()?)
    }

    /// # Errors
    ///
    /// Returns `StudyError::UnknownProblemId` if the id is not in the catalog.
    pub fn open_chat(&self, id: &ProblemId) -> Result<Vec<ChatTurn>, StudyError> {
        self.problem(id)?;
        Ok(self.coach.open(id))
    }

    /// Submit one coaching turn for `id`.
    ///
    /// # Errors
    ///
    /// Returns `StudyError` for unknown ids, blank input, or a turn already in flight.
    pub async fn ask(&self, id: &ProblemId, text: &str) -> Result<ChatTurn, StudyError> {
        let problem = self.problem(id)?;
        Ok(self.coach.submit_turn(problem, text).await?)
    }
}
