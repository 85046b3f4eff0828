use std::collections::BTreeSet;
use std::sync::Arc;

use coach_core::model::{HISTORY_LIMIT, ProblemId, RecentHistory};
use storage::repository::ProgressRepository;

use crate::error::ProgressServiceError;

/// The Progress Store: completion set, current problem, and recent history.
///
/// Writes go straight through to the repository and are durable when the
/// call returns.
#[derive(Clone)]
pub struct ProgressService {
    repo: Arc<dyn ProgressRepository>,
    history_limit: usize,
}

impl ProgressService {
    #[must_use]
    pub fn new(repo: Arc<dyn ProgressRepository>) -> Self {
        Self {
            repo,
            history_limit: HISTORY_LIMIT,
        }
    }

    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failures.
    pub async fn is_completed(&self, id: &ProblemId) -> Result<bool, ProgressServiceError> {
        Ok(self.repo.is_completed(id).await?)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failures.
    pub async fn completed_ids(&self) -> Result<BTreeSet<ProblemId>, ProgressServiceError> {
        Ok(self.repo.completed_ids().await?)
    }

    /// Mark a problem completed. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failures.
    pub async fn mark_completed(&self, id: &ProblemId) -> Result<(), ProgressServiceError> {
        self.repo.add_completed(id).await?;
        tracing::debug!(problem = %id, "marked completed");
        Ok(())
    }

    /// Clear a problem's completed mark. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failures.
    pub async fn unmark_completed(&self, id: &ProblemId) -> Result<(), ProgressServiceError> {
        self.repo.remove_completed(id).await?;
        tracing::debug!(problem = %id, "unmarked completed");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failures.
    pub async fn current_problem(&self) -> Result<Option<ProblemId>, ProgressServiceError> {
        Ok(self.repo.current_problem().await?)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failures.
    pub async fn set_current_problem(&self, id: &ProblemId) -> Result<(), ProgressServiceError> {
        self.repo.set_current_problem(id).await?;
        Ok(())
    }

    /// Recent visits, most recent first, never longer than the history limit.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failures.
    pub async fn history(&self) -> Result<Vec<ProblemId>, ProgressServiceError> {
        let stored = self.repo.history().await?;
        Ok(RecentHistory::from_persisted(stored, self.history_limit).into_ids())
    }

    /// Move `id` to the front of the history and persist it.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failures.
    pub async fn record_visit(&self, id: &ProblemId) -> Result<Vec<ProblemId>, ProgressServiceError> {
        let stored = self.repo.history().await?;
        let mut history = RecentHistory::from_persisted(stored, self.history_limit);
        history.record(id.clone());
        self.repo.save_history(history.ids()).await?;
        Ok(history.into_ids())
    }
}
