//! On-demand coaching conversations scoped to one problem each.

mod prompt;
mod provider;
mod registry;

pub use prompt::{BODY_CHAR_LIMIT, build_messages, build_system_prompt, truncate_body};
pub use provider::{
    ChatCompletion, CoachConfig, CoachSettings, CompletionRequest, OpenAiCompatibleClient,
};
pub use registry::{CoachRegistry, SessionState, failure_message};
