//! Shared error types for the services crate.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use coach_core::model::ProblemId;
use thiserror::Error;

use storage::repository::StorageError;

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while packaging a lab directory.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LabArchiveError {
    #[error("problem {0} has no lab")]
    NoLabAvailable(ProblemId),
    #[error("failed to build lab archive: {0}")]
    Io(#[from] io::Error),
}

/// Errors emitted while reading hint or solution files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProblemFileError {
    #[error("problem has no hint number {0}")]
    NoSuchHint(usize),
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors emitted by coaching sessions and providers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoachError {
    #[error("coaching credential is not configured")]
    MissingCredential,
    #[error("coaching request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("coaching provider did not answer within {0:?}")]
    Timeout(Duration),
    #[error("coaching provider returned an empty response")]
    EmptyResponse,
    #[error("coaching provider failed: {0}")]
    Provider(String),
    #[error("message is empty")]
    EmptyMessage,
    #[error("a coaching turn is already in progress for {0}")]
    TurnInFlight(ProblemId),
}

/// Errors emitted by `StudyContext`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StudyError {
    #[error("unknown problem id: {0}")]
    UnknownProblemId(ProblemId),
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
    #[error(transparent)]
    Lab(#[from] LabArchiveError),
    #[error(transparent)]
    File(#[from] ProblemFileError),
    #[error(transparent)]
    Coach(#[from] CoachError),
}
