use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use coach_core::model::ProblemId;
use sqlx::Row;

use crate::repository::{ProgressRepository, StorageError, parse_stored_id};

use super::SqliteRepository;

fn connection_error(err: sqlx::Error) -> StorageError {
    StorageError::Connection(err.to_string())
}

fn read_id(row: &sqlx::sqlite::SqliteRow) -> Result<Option<ProblemId>, StorageError> {
    let raw: String = row
        .try_get("problem_id")
        .map_err(|err| StorageError::Serialization(err.to_string()))?;
    Ok(parse_stored_id(&raw))
}

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn completed_ids(&self) -> Result<BTreeSet<ProblemId>, StorageError> {
        let rows = sqlx::query("SELECT problem_id FROM completed_problems")
            .fetch_all(&self.pool)
            .await
            .map_err(connection_error)?;

        let mut ids = BTreeSet::new();
        for row in &rows {
            if let Some(id) = read_id(row)? {
                ids.insert(id);
            }
        }
        Ok(ids)
    }

    async fn is_completed(&self, id: &ProblemId) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM completed_problems WHERE problem_id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(connection_error)?;
        Ok(row.is_some())
    }

    async fn add_completed(&self, id: &ProblemId) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO completed_problems (problem_id, completed_at)
            VALUES (?1, ?2)
            ON CONFLICT(problem_id) DO NOTHING
            ",
        )
        .bind(id.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(connection_error)?;
        Ok(())
    }

    async fn remove_completed(&self, id: &ProblemId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM completed_problems WHERE problem_id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(connection_error)?;
        Ok(())
    }

    async fn current_problem(&self) -> Result<Option<ProblemId>, StorageError> {
        let row = sqlx::query("SELECT problem_id FROM current_problem WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(connection_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        read_id(&row)
    }

    async fn set_current_problem(&self, id: &ProblemId) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO current_problem (id, problem_id, updated_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                problem_id = excluded.problem_id,
                updated_at = excluded.updated_at
            ",
        )
        .bind(id.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(connection_error)?;
        Ok(())
    }

    async fn history(&self) -> Result<Vec<ProblemId>, StorageError> {
        let rows = sqlx::query("SELECT problem_id FROM recent_history ORDER BY position ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(connection_error)?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(id) = read_id(row)? {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn save_history(&self, ids: &[ProblemId]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(connection_error)?;

        sqlx::query("DELETE FROM recent_history")
            .execute(&mut *tx)
            .await
            .map_err(connection_error)?;

        for (position, id) in ids.iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|err| StorageError::Serialization(err.to_string()))?;
            sqlx::query("INSERT INTO recent_history (position, problem_id) VALUES (?1, ?2)")
                .bind(position)
                .bind(id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(connection_error)?;
        }

        tx.commit().await.map_err(connection_error)?;
        Ok(())
    }
}
