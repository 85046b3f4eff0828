use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a Problem.
///
/// The value is the problem directory's path relative to the content root,
/// always with `/` separators. Ids are persisted one per line, so they can
/// never contain line breaks.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProblemId(String);

impl ProblemId {
    /// Creates a new `ProblemId`.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the value is blank, contains a line break,
    /// or starts with a path separator.
    pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ParseIdError::new(id, "id is blank"));
        }
        if id.contains(['\n', '\r']) {
            return Err(ParseIdError::new(id, "id contains a line break"));
        }
        if id.starts_with('/') || id.starts_with('\\') {
            return Err(ParseIdError::new(id, "id must be relative"));
        }
        Ok(Self(id))
    }

    /// Returns the underlying string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment of the id (the problem directory name).
    #[must_use]
    pub fn slug(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Debug for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProblemId({})", self.0)
    }
}

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProblemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ProblemId> for String {
    fn from(id: ProblemId) -> Self {
        id.0
    }
}

impl TryFrom<String> for ProblemId {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

// ─── FromStr Implementation ────────────────────────────────────────────────────

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    raw: String,
    reason: &'static str,
}

impl ParseIdError {
    fn new(raw: String, reason: &'static str) -> Self {
        Self { raw, reason }
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse ProblemId from {:?}: {}", self.raw, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for ProblemId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
