//! SASL extensions carried in the client's initial response.

use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::{CodecError, CodecResult};

/// Key of the mandatory `auth` field; never usable as an extension name.
pub(crate) const AUTH_KEY: &str = "auth";

/// Validated set of extension name/value pairs.
///
/// Names match `[A-Za-z]+` and are case-sensitive; values match
/// `[\x21-\x7E \t\r\n]+`. Iteration is in name order, which is also the
/// order extensions are written to the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaslExtensions {
    entries: BTreeMap<String, String>,
}

impl SaslExtensions {
    /// Create an empty extension set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an extension, replacing any previous value for the same name.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidExtension`] if the name or value does not
    /// fit the extension grammar, or the name is the reserved `auth` key.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> CodecResult<Option<String>> {
        let name = name.into();
        let value = value.into();
        validate_name(&name)?;
        validate_value(&name, &value)?;
        Ok(self.entries.insert(name, value))
    }

    /// Look up an extension value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Whether an extension with this name is present
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate over `(name, value)` pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of extensions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Consume the set, returning the underlying map
    pub fn into_map(self) -> BTreeMap<String, String> {
        self.entries
    }

    /// Remove one extension, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(name)
    }

    /// Remove every extension
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl TryFrom<BTreeMap<String, String>> for SaslExtensions {
    type Error = CodecError;

    fn try_from(map: BTreeMap<String, String>) -> CodecResult<Self> {
        for (name, value) in &map {
            validate_name(name)?;
            validate_value(name, value)?;
        }
        Ok(Self { entries: map })
    }
}

impl<'a> IntoIterator for &'a SaslExtensions {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

pub(crate) fn validate_name(name: &str) -> CodecResult<()> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(CodecError::InvalidExtension {
            name: name.to_string(),
            reason: "name must be one or more ASCII letters".to_string(),
        });
    }
    if name == AUTH_KEY {
        return Err(CodecError::InvalidExtension {
            name: name.to_string(),
            reason: "name is reserved for the bearer token".to_string(),
        });
    }
    Ok(())
}

pub(crate) fn validate_value(name: &str, value: &str) -> CodecResult<()> {
    let valid = !value.is_empty()
        && value
            .bytes()
            .all(|b| matches!(b, 0x21..=0x7E | b' ' | b'\t' | b'\r' | b'\n'));
    if valid {
        Ok(())
    } else {
        Err(CodecError::InvalidExtension {
            name: name.to_string(),
            reason: "value must be non-empty printable ASCII".to_string(),
        })
    }
}
