//! `index_name.<i>` properties naming the non-default shards.

use crate::config::INDEX_NAME_PREFIX;
use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Shard names by shard index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexNameProperties {
    names: BTreeMap<usize, String>,
}

impl IndexNameProperties {
    /// Create an empty set of names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the shard at `index`.
    pub fn with_name(mut self, index: usize, name: impl Into<String>) -> Self {
        self.names.insert(index, name.into());
        self
    }

    /// Collect names from `(key, value)` pairs using the default prefix.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self::from_pairs_with_prefix(INDEX_NAME_PREFIX, pairs)
    }

    /// Collect names from `(key, value)` pairs whose key is `prefix<i>`.
    ///
    /// Pairs with other keys are ignored.
    pub fn from_pairs_with_prefix<I, K, V>(prefix: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut props = Self::new();
        for (key, value) in pairs {
            let key = key.as_ref().trim();
            let Some(index) = parse_index(prefix, key) else {
                continue;
            };
            let value: String = value.into();
            let value = value.trim();
            if value.is_empty() {
                tracing::warn!(key, "Ignoring empty shard name");
                continue;
            }
            props.names.insert(index, value.to_string());
        }
        props
    }

    /// Parse properties text.
    ///
    /// The key ends at the first `=`, `:` or whitespace, so `key=value`,
    /// `key: value` and `key value` all parse. Blank lines and lines
    /// starting with `#` or `!` are skipped. A key with no value is an error.
    pub fn parse(prefix: &str, text: &str) -> Result<Self> {
        let mut pairs = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some(pos) = line.find(|c: char| c == '=' || c == ':' || c.is_whitespace()) else {
                return Err(Error::Config(format!(
                    "line {}: expected key=value, got {:?}",
                    line_no + 1,
                    line
                )));
            };
            let (key, rest) = line.split_at(pos);
            let rest = rest.trim_start();
            let value = rest
                .strip_prefix(|c: char| c == '=' || c == ':')
                .unwrap_or(rest)
                .trim_start();
            pairs.push((key, value));
        }
        Ok(Self::from_pairs_with_prefix(prefix, pairs))
    }

    /// Name of the shard at `index`.
    pub fn name_for(&self, index: usize) -> Option<&str> {
        self.names.get(&index).map(String::as_str)
    }

    /// Iterate over `(index, name)` in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().map(|(i, n)| (*i, n.as_str()))
    }

    /// Number of named shards.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no shard is named.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn parse_index(prefix: &str, key: &str) -> Option<usize> {
    let digits = key.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
