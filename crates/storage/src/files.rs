//! Progress records kept as plain, line-oriented text files.
//!
//! Layout inside the data directory:
//! - `completed.txt`: one completed problem id per line, sorted
//! - `current_problem.txt`: the current problem id as the whole file content
//! - `history.txt`: one id per line, most recent first

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use coach_core::model::ProblemId;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::repository::{ProgressRepository, Storage, StorageError, parse_stored_id};

pub const COMPLETED_FILE: &str = "completed.txt";
pub const CURRENT_PROBLEM_FILE: &str = "current_problem.txt";
pub const HISTORY_FILE: &str = "history.txt";

#[derive(Debug, Clone)]
pub struct FileProgressRepository {
    dir: PathBuf,
}

impl FileProgressRepository {
    /// Open (and create if needed) a data directory.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    async fn read_record(&self, name: &str) -> Result<String, StorageError> {
        match fs::read_to_string(self.dir.join(name)).await {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn read_lines(&self, name: &str) -> Result<Vec<ProblemId>, StorageError> {
        let content = self.read_record(name).await?;
        Ok(content.lines().filter_map(parse_stored_id).collect())
    }

    /// Replace a record by writing a sibling temp file and renaming it over the target.
    async fn write_record(&self, name: &str, content: String) -> Result<(), StorageError> {
        let target = self.dir.join(name);
        let staging = self.dir.join(format!(".{name}.tmp"));

        let mut file = fs::File::create(&staging).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&staging, &target).await?;
        tracing::debug!(record = name, "progress record written");
        Ok(())
    }

    async fn write_lines<'a>(
        &self,
        name: &str,
        ids: impl Iterator<Item = &'a ProblemId>,
    ) -> Result<(), StorageError> {
        let content = ids.map(ProblemId::as_str).collect::<Vec<_>>().join("\n");
        self.write_record(name, content).await
    }
}

#[async_trait]
impl ProgressRepository for FileProgressRepository {
    async fn completed_ids(&self) -> Result<BTreeSet<ProblemId>, StorageError> {
        Ok(self.read_lines(COMPLETED_FILE).await?.into_iter().collect())
    }

    async fn add_completed(&self, id: &ProblemId) -> Result<(), StorageError> {
        let mut completed = self.completed_ids().await?;
        if completed.insert(id.clone()) {
            self.write_lines(COMPLETED_FILE, completed.iter()).await?;
        }
        Ok(())
    }

    async fn remove_completed(&self, id: &ProblemId) -> Result<(), StorageError> {
        let mut completed = self.completed_ids().await?;
        if completed.remove(id) {
            self.write_lines(COMPLETED_FILE, completed.iter()).await?;
        }
        Ok(())
    }

    async fn current_problem(&self) -> Result<Option<ProblemId>, StorageError> {
        let content = self.read_record(CURRENT_PROBLEM_FILE).await?;
        Ok(parse_stored_id(&content))
    }

    async fn set_current_problem(&self, id: &ProblemId) -> Result<(), StorageError> {
        self.write_record(CURRENT_PROBLEM_FILE, id.to_string()).await
    }

    async fn history(&self) -> Result<Vec<ProblemId>, StorageError> {
        self.read_lines(HISTORY_FILE).await
    }

    async fn save_history(&self, ids: &[ProblemId]) -> Result<(), StorageError> {
        self.write_lines(HISTORY_FILE, ids.iter()).await
    }
}

impl Storage {
    /// Build a `Storage` backed by text files in `dir`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the directory cannot be created.
    pub async fn files(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let repo = FileProgressRepository::open(dir).await?;
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Ok(Self { progress })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> ProblemId {
        ProblemId::new(raw).unwrap()
    }

    #[tokio::test]
    async fn missing_records_read_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = FileProgressRepository::open(tmp.path().join("data"))
            .await
            .unwrap();
        assert!(repo.completed_ids().await.unwrap().is_empty());
        assert!(repo.current_problem().await.unwrap().is_none());
        assert!(repo.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_line_oriented_records() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = FileProgressRepository::open(tmp.path()).await.unwrap();

        repo.add_completed(&id("b/two")).await.unwrap();
        repo.add_completed(&id("a/one")).await.unwrap();
        repo.set_current_problem(&id("a/one")).await.unwrap();
        repo.save_history(&[id("a/one"), id("b/two")]).await.unwrap();

        let completed = std::fs::read_to_string(tmp.path().join(COMPLETED_FILE)).unwrap();
        assert_eq!(completed, "a/one\nb/two");
        let current = std::fs::read_to_string(tmp.path().join(CURRENT_PROBLEM_FILE)).unwrap();
        assert_eq!(current, "a/one");
        let history = std::fs::read_to_string(tmp.path().join(HISTORY_FILE)).unwrap();
        assert_eq!(history, "a/one\nb/two");
    }

    #[tokio::test]
    async fn reads_hand_edited_records() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(HISTORY_FILE), "x/one\n\n  x/two  \n").unwrap();
        std::fs::write(tmp.path().join(CURRENT_PROBLEM_FILE), "x/two\n").unwrap();

        let repo = FileProgressRepository::open(tmp.path()).await.unwrap();
        assert_eq!(repo.history().await.unwrap(), vec![id("x/one"), id("x/two")]);
        assert_eq!(repo.current_problem().await.unwrap(), Some(id("x/two")));
    }

    #[tokio::test]
    async fn failed_write_leaves_other_records_intact() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = FileProgressRepository::open(tmp.path()).await.unwrap();
        repo.add_completed(&id("a/one")).await.unwrap();
        repo.set_current_problem(&id("a/one")).await.unwrap();
        repo.save_history(&[id("a/one")]).await.unwrap();

        // A directory where the staging file should go makes the history write fail.
        std::fs::create_dir(tmp.path().join(format!(".{HISTORY_FILE}.tmp"))).unwrap();
        let err = repo.save_history(&[id("b/two"), id("a/one")]).await;
        assert!(matches!(err, Err(StorageError::Io(_))));

        assert_eq!(repo.history().await.unwrap(), vec![id("a/one")]);
        assert_eq!(repo.current_problem().await.unwrap(), Some(id("a/one")));
        assert!(repo.is_completed(&id("a/one")).await.unwrap());
        let completed = std::fs::read_to_string(tmp.path().join(COMPLETED_FILE)).unwrap();
        assert_eq!(completed, "a/one");
        let current = std::fs::read_to_string(tmp.path().join(CURRENT_PROBLEM_FILE)).unwrap();
        assert_eq!(current, "a/one");
    }

    #[tokio::test]
    async fn reopened_store_sees_previous_writes() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let repo = FileProgressRepository::open(tmp.path()).await.unwrap();
            repo.add_completed(&id("a/one")).await.unwrap();
        }
        let repo = FileProgressRepository::open(tmp.path()).await.unwrap();
        assert!(repo.is_completed(&id("a/one")).await.unwrap());
    }
}
