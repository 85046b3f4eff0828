use std::fmt;

use serde_yaml::Value;
use thiserror::Error;

const DELIMITER: &str = "---";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DocumentError {
    #[error("missing front-matter header")]
    MissingHeader,

    #[error("front-matter header is not terminated")]
    UnterminatedHeader,

    #[error("invalid front-matter: {0}")]
    InvalidYaml(String),

    #[error("front-matter must be a mapping of keys to values")]
    NotAMapping,

    #[error("metadata key must be a string")]
    NonStringKey,

    #[error("metadata value for `{key}` must be a scalar or a list of scalars")]
    UnsupportedValue { key: String },

    #[error("metadata is missing required key `{0}`")]
    MissingKey(&'static str),
}

/// A metadata value: either a single scalar rendered as text, or a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Text(String),
    List(Vec<String>),
}

impl MetadataValue {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::List(_) => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::Text(_) => None,
            Self::List(items) => Some(items),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

/// Problem metadata in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, MetadataValue)>,
}

impl Metadata {
    pub const NAME: &'static str = "name";
    pub const CATEGORY: &'static str = "category";
    pub const DIFFICULTY: &'static str = "difficulty";
    pub const TIME: &'static str = "time";
    pub const CONCEPTS: &'static str = "concepts";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: MetadataValue) {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.insert(key, value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Scalar value for `key`, if present and not a list.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetadataValue::as_text)
    }

    /// The `name` entry. Always present on parsed documents.
    #[must_use]
    pub fn name(&self) -> &str {
        self.text(Self::NAME).unwrap_or_default()
    }

    /// `concepts` as a list; a scalar value is treated as a single concept.
    #[must_use]
    pub fn concepts(&self) -> Vec<String> {
        match self.get(Self::CONCEPTS) {
            Some(MetadataValue::List(items)) => items.clone(),
            Some(MetadataValue::Text(text)) => vec![text.clone()],
            None => Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Display rows for every key except `name`, with title-cased keys.
    #[must_use]
    pub fn display_rows(&self) -> Vec<(String, String)> {
        self.iter()
            .filter(|(key, _)| *key != Self::NAME)
            .map(|(key, value)| (title_case(key), value.to_string()))
            .collect()
    }

    fn from_yaml(value: Value) -> Result<Self, DocumentError> {
        let mapping = match value {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(mapping) => mapping,
            _ => return Err(DocumentError::NotAMapping),
        };

        let mut metadata = Self::default();
        for (key, value) in mapping {
            let Value::String(key) = key else {
                return Err(DocumentError::NonStringKey);
            };
            let value = match value {
                Value::Null => continue,
                Value::Sequence(items) => {
                    let items = items
                        .into_iter()
                        .map(scalar_to_string)
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(|| DocumentError::UnsupportedValue { key: key.clone() })?;
                    MetadataValue::List(items)
                }
                other => MetadataValue::Text(
                    scalar_to_string(other)
                        .ok_or_else(|| DocumentError::UnsupportedValue { key: key.clone() })?,
                ),
            };
            metadata.insert(key, value);
        }
        Ok(metadata)
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn title_case(key: &str) -> String {
    key.split(['_', '-', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A parsed problem definition: metadata header plus free-text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemDocument {
    pub metadata: Metadata,
    pub body: String,
}

impl ProblemDocument {
    /// Parse a `---` delimited YAML header followed by the body text.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError` if the header is missing or malformed, or if
    /// the metadata has no `name`.
    pub fn parse(source: &str) -> Result<Self, DocumentError> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let mut lines = source.lines();

        if lines.next().map(str::trim_end) != Some(DELIMITER) {
            return Err(DocumentError::MissingHeader);
        }

        let mut header = Vec::new();
        let mut terminated = false;
        for line in lines.by_ref() {
            if line.trim_end() == DELIMITER {
                terminated = true;
                break;
            }
            header.push(line);
        }
        if !terminated {
            return Err(DocumentError::UnterminatedHeader);
        }

        let value: Value = serde_yaml::from_str(&header.join("\n"))
            .map_err(|err| DocumentError::InvalidYaml(err.to_string()))?;
        let metadata = Metadata::from_yaml(value)?;
        if metadata.text(Metadata::NAME).is_none_or(|name| name.trim().is_empty()) {
            return Err(DocumentError::MissingKey(Metadata::NAME));
        }

        let body = lines.collect::<Vec<_>>().join("\n");
        let body = body.trim_start_matches(['\n', '\r']).trim_end().to_string();

        Ok(Self { metadata, body })
    }
}
