//! Predefined answers keyed by normalized query text.

use std::collections::HashMap;
use std::path::Path;

use crate::config::ConfigError;

/// Reply used when a query has no predefined answer.
pub const DEFAULT_ANSWER: &str = "Sorry, I don’t have an answer for that.";

/// Immutable query -> answer table, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct AnswerTable {
    entries: HashMap<String, String>,
}

/// Normalize a query for lookup. Exact match only; no trimming or fuzzing.
pub fn normalize(query: &str) -> String {
    query.to_lowercase()
}

impl AnswerTable {
    /// Build a table from raw pairs, normalizing every key.
    ///
    /// Keys that collide after normalization keep the last value.
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut map = HashMap::new();
        for (query, answer) in entries {
            let key = normalize(&query);
            if map.insert(key, answer).is_some() {
                tracing::warn!(query = %query, "Duplicate predefined query after lowercasing");
            }
        }
        Self { entries: map }
    }

    /// Load the table from a JSON object of string -> string.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse_str(&content).map_err(|e| ConfigError::Answers {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Parse the table from JSON text.
    pub fn parse_str(content: &str) -> Result<Self, serde_json::Error> {
        // Map iterates in sorted key order, so collisions resolve the same
        // way on every load.
        let pairs: serde_json::Map<String, serde_json::Value> = serde_json::from_str(content)?;
        let mut entries = Vec::with_capacity(pairs.len());
        for (query, value) in pairs {
            let answer: String = serde_json::from_value(value)?;
            entries.push((query, answer));
        }
        Ok(Self::new(entries))
    }

    /// Look up a raw query. Returns the normalized query and its answer,
    /// or [`DEFAULT_ANSWER`] when there is none.
    pub fn lookup(&self, query: &str) -> (String, &str) {
        let key = normalize(query);
        let answer = self
            .entries
            .get(&key)
            .map(String::as_str)
            .unwrap_or(DEFAULT_ANSWER);
        (key, answer)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
