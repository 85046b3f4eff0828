use async_trait::async_trait;
use coach_core::model::ProblemId;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence contract for learner progress.
///
/// Three independent records: the completed set, the current-problem pointer,
/// and the recent-visit list. Every write is durable once the call returns.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch every completed problem id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read.
    async fn completed_ids(&self) -> Result<BTreeSet<ProblemId>, StorageError>;

    /// Check a single id against the completed set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read.
    async fn is_completed(&self, id: &ProblemId) -> Result<bool, StorageError> {
        Ok(self.completed_ids().await?.contains(id))
    }

    /// Add an id to the completed set. Adding a present id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    async fn add_completed(&self, id: &ProblemId) -> Result<(), StorageError>;

    /// Remove an id from the completed set. Removing a missing id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    async fn remove_completed(&self, id: &ProblemId) -> Result<(), StorageError>;

    /// Fetch the current-problem pointer, if one was ever set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read.
    async fn current_problem(&self) -> Result<Option<ProblemId>, StorageError>;

    /// Overwrite the current-problem pointer.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    async fn set_current_problem(&self, id: &ProblemId) -> Result<(), StorageError>;

    /// Fetch the recent-visit list, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read.
    async fn history(&self) -> Result<Vec<ProblemId>, StorageError>;

    /// Replace the recent-visit list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    async fn save_history(&self, ids: &[ProblemId]) -> Result<(), StorageError>;
}

/// Parse an id read back from a durable record, skipping blanks and invalid values.
pub(crate) fn parse_stored_id(raw: &str) -> Option<ProblemId> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match ProblemId::new(raw) {
        Ok(id) => Some(id),
        Err(err) => {
            tracing::warn!(error = %err, "ignoring invalid stored problem id");
            None
        }
    }
}

#[derive(Default)]
struct ProgressRecords {
    completed: BTreeSet<ProblemId>,
    current: Option<ProblemId>,
    history: Vec<ProblemId>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<ProgressRecords>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_records<T>(
        &self,
        f: impl FnOnce(&mut ProgressRecords) -> T,
    ) -> Result<T, StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(f(&mut guard))
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn completed_ids(&self) -> Result<BTreeSet<ProblemId>, StorageError> {
        self.with_records(|records| records.completed.clone())
    }

    async fn add_completed(&self, id: &ProblemId) -> Result<(), StorageError> {
        self.with_records(|records| {
            records.completed.insert(id.clone());
        })
    }

    async fn remove_completed(&self, id: &ProblemId) -> Result<(), StorageError> {
        self.with_records(|records| {
            records.completed.remove(id);
        })
    }

    async fn current_problem(&self) -> Result<Option<ProblemId>, StorageError> {
        self.with_records(|records| records.current.clone())
    }

    async fn set_current_problem(&self, id: &ProblemId) -> Result<(), StorageError> {
        self.with_records(|records| records.current = Some(id.clone()))
    }

    async fn history(&self) -> Result<Vec<ProblemId>, StorageError> {
        self.with_records(|records| records.history.clone())
    }

    async fn save_history(&self, ids: &[ProblemId]) -> Result<(), StorageError> {
        self.with_records(|records| records.history = ids.to_vec())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let progress: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
        Self { progress }
    }
}
