//! Dataset ancestry, metadata and hashtag lookups
//!
//! Provenance comes back nearest first with the generation-step dataset
//! last. Metadata and hashtag answers are JSON documents that the transport
//! may split across lines, so they are re-joined before parsing.

use crate::address::MAX_DEPTH;
use crate::catalog::CatalogQueries;
use crate::errors::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Scope name of the PMG hashtag hierarchy in AMI.
pub const PMG_GLOBAL_SCOPE: &str = "PMG_GLOBAL_SCOPE";

/// Prefix of the per-level hashtag scopes (`PMGL1`..`PMGL4`).
const LEVEL_SCOPE_PREFIX: &str = "PMGL";

/// Field name to value, as reported by AMI (`"Physics Short Name"`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetMetadata(BTreeMap<String, String>);

impl DatasetMetadata {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for DatasetMetadata {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// PMG hashtags attached to a dataset, one list per level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetHashtags {
    pub levels: [Vec<String>; MAX_DEPTH],
}

impl DatasetHashtags {
    /// Tags of level 1..=4.
    pub fn level(&self, level: usize) -> &[String] {
        level
            .checked_sub(1)
            .and_then(|index| self.levels.get(index))
            .map_or(&[][..], Vec::as_slice)
    }
}

#[derive(Debug, Deserialize)]
struct HashtagRow {
    #[serde(rename = "scopeName")]
    scope_name: String,
    scope: String,
    name: String,
}

fn join_document(lines: &[String], what: &str) -> Result<String> {
    let document = lines.join("\n");
    if document.trim().is_empty() {
        return Err(CatalogError::parse(format!("empty {what} response")));
    }
    Ok(document)
}

/// Parse an AMI dataset info response.
///
/// Accepts a JSON object or a one-element array holding an object. Non-string
/// values are kept in their JSON text form.
pub fn parse_metadata(lines: &[String]) -> Result<DatasetMetadata> {
    let document = join_document(lines, "metadata")?;
    let value: Value = serde_json::from_str(&document)
        .map_err(|e| CatalogError::parse_with_source("metadata is not valid JSON", e))?;

    let record = match value {
        Value::Object(record) => record,
        Value::Array(mut records) if records.len() == 1 => match records.pop() {
            Some(Value::Object(record)) => record,
            _ => return Err(CatalogError::parse("metadata array does not hold an object")),
        },
        Value::Array(records) => {
            return Err(CatalogError::parse(format!(
                "metadata array holds {} records, expected one",
                records.len()
            )));
        }
        other => {
            return Err(CatalogError::parse(format!(
                "metadata is not an object: {other}"
            )));
        }
    };

    Ok(record
        .into_iter()
        .map(|(field, value)| {
            let value = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            (field, value)
        })
        .collect())
}

/// Parse `DatasetWBListHashtags` rows into per-level hashtags.
///
/// Rows outside the PMG global scope, or for an unknown level, are ignored.
pub fn parse_hashtag_rows(lines: &[String]) -> Result<DatasetHashtags> {
    let document = join_document(lines, "hashtag")?;
    let rows: Vec<HashtagRow> = serde_json::from_str(&document)
        .map_err(|e| CatalogError::parse_with_source("hashtag rows are not valid JSON", e))?;

    let mut hashtags = DatasetHashtags::default();
    for row in rows {
        if row.scope_name != PMG_GLOBAL_SCOPE {
            continue;
        }
        let level = row
            .scope
            .strip_prefix(LEVEL_SCOPE_PREFIX)
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| (1..=MAX_DEPTH).contains(n));
        match level {
            Some(level) => hashtags.levels[level - 1].push(row.name),
            None => {
                tracing::debug!(scope = %row.scope, "hashtag row outside PMGL levels ignored");
            }
        }
    }
    Ok(hashtags)
}

/// Walks a dataset's processing ancestry.
#[derive(Clone, Copy)]
pub struct ProvenanceWalker<'a> {
    queries: CatalogQueries<'a>,
}

impl<'a> ProvenanceWalker<'a> {
    pub fn new(queries: CatalogQueries<'a>) -> Self {
        Self { queries }
    }

    /// Ancestry of `dataset` in catalog order: nearest first, origin last.
    pub fn provenance(&self, scope: &str, dataset: &str) -> Result<Vec<String>> {
        self.queries.provenance(scope, dataset)
    }

    /// The generation-step origin, or `dataset` itself without ancestry.
    pub fn origin(&self, scope: &str, dataset: &str) -> Result<String> {
        Ok(self
            .provenance(scope, dataset)?
            .pop()
            .unwrap_or_else(|| dataset.to_string()))
    }
}

/// Fetches metadata, optionally for the top of the provenance chain.
pub struct MetadataResolver<'a> {
    queries: CatalogQueries<'a>,
    walker: ProvenanceWalker<'a>,
}

impl<'a> MetadataResolver<'a> {
    pub fn new(queries: CatalogQueries<'a>) -> Self {
        Self {
            queries,
            walker: ProvenanceWalker::new(queries),
        }
    }

    pub fn metadata(
        &self,
        scope: &str,
        dataset: &str,
        use_top_of_provenance: bool,
    ) -> Result<DatasetMetadata> {
        let target = if use_top_of_provenance {
            self.walker.origin(scope, dataset)?
        } else {
            dataset.to_string()
        };
        tracing::debug!(scope, dataset, target = %target, "fetching metadata");
        self.queries.metadata(scope, &target)
    }
}
