#![forbid(unsafe_code)]

pub mod coach;
pub mod error;
pub mod lab_archive;
pub mod problem_view;
pub mod progress_service;
pub mod study_context;

pub use coach::{
    ChatCompletion, CoachConfig, CoachRegistry, CoachSettings, CompletionRequest,
    OpenAiCompatibleClient, SessionState,
};
pub use error::{
    CoachError, LabArchiveError, ProblemFileError, ProgressServiceError, StudyError,
};
pub use lab_archive::LabArchive;
pub use problem_view::ProblemView;
pub use progress_service::ProgressService;
pub use study_context::{ResolvedProblem, StudyContext};
