mod chat;
mod document;
mod history;
mod ids;
mod problem;

pub use chat::{ChatRole, ChatTurn, Transcript};
pub use document::{DocumentError, Metadata, MetadataValue, ProblemDocument};
pub use history::{HISTORY_LIMIT, RecentHistory};
pub use ids::{ParseIdError, ProblemId};
pub use problem::{ProblemEntry, ProblemFiles};
