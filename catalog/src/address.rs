//! Addresses in the four-level hashtag hierarchy
//!
//! An address is a scope plus an ordered tuple of at most four hashtags
//! (levels PMGL1..PMGL4). The empty tuple is the scope's root.
//!
//! The text form is `scope` followed by `/tag` per level, e.g.
//! `mc23_13p6TeV/JetPhoton/Dijet`. It is what the cache stores, so it must
//! stay stable.

use crate::errors::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of hashtag levels in the hierarchy.
pub const MAX_DEPTH: usize = 4;

const SEPARATOR: char = '/';

/// Immutable scope + tag tuple identifying a node in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawAddress", into = "RawAddress")]
pub struct AddressKey {
    scope: String,
    hash_tags: Vec<String>,
}

/// Serialized shape; routed through `TryFrom` so deserialization enforces the
/// same invariants as `AddressKey::new`.
#[derive(Serialize, Deserialize)]
struct RawAddress {
    scope: String,
    #[serde(default)]
    hash_tags: Vec<String>,
}

impl AddressKey {
    /// Build an address, rejecting more than [`MAX_DEPTH`] tags and
    /// components that would break the text encoding.
    pub fn new<I, S>(scope: impl Into<String>, hash_tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scope = scope.into();
        let hash_tags: Vec<String> = hash_tags.into_iter().map(Into::into).collect();

        validate_component("scope", &scope)?;
        if hash_tags.len() > MAX_DEPTH {
            return Err(CatalogError::config(format!(
                "address {scope} has {} hashtags, at most {MAX_DEPTH} allowed",
                hash_tags.len()
            )));
        }
        for tag in &hash_tags {
            validate_component("hashtag", tag)?;
        }

        Ok(Self { scope, hash_tags })
    }

    /// The root address of a scope (no tags).
    pub fn root(scope: impl Into<String>) -> Result<Self> {
        Self::new(scope, Vec::<String>::new())
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn hash_tags(&self) -> &[String] {
        &self.hash_tags
    }

    /// Number of tags, i.e. the level of this node (0 = root).
    pub fn depth(&self) -> usize {
        self.hash_tags.len()
    }

    pub fn is_full_depth(&self) -> bool {
        self.depth() >= MAX_DEPTH
    }

    /// The address one level down.
    pub fn child(&self, tag: impl Into<String>) -> Result<Self> {
        let mut hash_tags = self.hash_tags.clone();
        hash_tags.push(tag.into());
        Self::new(self.scope.clone(), hash_tags)
    }

}

/// Scope short code: the text before the first `_`.
pub fn scope_short(scope: &str) -> &str {
    scope.split('_').next().unwrap_or(scope)
}

fn validate_component(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(CatalogError::config(format!("{what} must not be empty")));
    }
    if value.contains(SEPARATOR) {
        return Err(CatalogError::config(format!(
            "{what} {value:?} must not contain '{SEPARATOR}'"
        )));
    }
    Ok(())
}

impl fmt::Display for AddressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.scope)?;
        for tag in &self.hash_tags {
            write!(f, "{SEPARATOR}{tag}")?;
        }
        Ok(())
    }
}

impl FromStr for AddressKey {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(SEPARATOR);
        let scope = parts.next().unwrap_or_default();
        Self::new(scope, parts)
    }
}

impl TryFrom<RawAddress> for AddressKey {
    type Error = CatalogError;

    fn try_from(raw: RawAddress) -> Result<Self> {
        Self::new(raw.scope, raw.hash_tags)
    }
}

impl From<AddressKey> for RawAddress {
    fn from(key: AddressKey) -> Self {
        Self {
            scope: key.scope,
            hash_tags: key.hash_tags,
        }
    }
}
