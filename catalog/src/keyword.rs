//! Keyword filtering over hashtag addresses

use crate::address::AddressKey;

/// Position of the category level in the tag tuple (PMGL3).
pub const CATEGORY_LEVEL: usize = 2;

/// Category tag of baseline (nominal) samples.
pub const BASELINE_CATEGORY: &str = "Baseline";

/// Case-insensitive AND-of-substrings matcher.
///
/// An address matches when every keyword is contained in at least one of its
/// tags. No keywords matches everything.
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
}

impl KeywordMatcher {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn matches(&self, address: &AddressKey) -> bool {
        let tags: Vec<String> = address
            .hash_tags()
            .iter()
            .map(String::as_str)
            .map(str::to_lowercase)
            .collect();
        self.keywords
            .iter()
            .all(|keyword| tags.iter().any(|tag| tag.contains(keyword.as_str())))
    }

    /// Keep matching addresses, preserving input order.
    pub fn filter(&self, addresses: &[AddressKey]) -> Vec<AddressKey> {
        addresses
            .iter()
            .filter(|address| self.matches(address))
            .cloned()
            .collect()
    }
}

/// Shorthand for `KeywordMatcher::new(keywords).filter(addresses)`.
pub fn filter<S: AsRef<str>>(addresses: &[AddressKey], keywords: &[S]) -> Vec<AddressKey> {
    KeywordMatcher::new(keywords).filter(addresses)
}

pub fn is_baseline(address: &AddressKey) -> bool {
    address
        .hash_tags()
        .get(CATEGORY_LEVEL)
        .is_some_and(|tag| tag == BASELINE_CATEGORY)
}

/// Keep only baseline addresses, preserving input order.
pub fn baseline_only(addresses: Vec<AddressKey>) -> Vec<AddressKey> {
    addresses.into_iter().filter(is_baseline).collect()
}
