//! Memoized catalog queries
//!
//! Builds the command line for each kind of question we ask the catalog and
//! routes every call through the [`MemoizedResolver`]. Parsing happens inside
//! the memoized computation, so malformed output fails the call and is never
//! cached.

use crate::address::AddressKey;
use crate::cache::{CacheKey, MemoizedResolver};
use crate::config::TransportConfig;
use crate::datasets::{DatasetIdentifier, parse_dataset_rows};
use crate::errors::{CatalogError, Result};
use crate::provenance::{DatasetHashtags, DatasetMetadata, parse_hashtag_rows, parse_metadata};
use crate::transport::{CatalogClient, CatalogRequest};

/// Command lines understood by the catalog clients.
#[derive(Debug, Clone)]
pub struct CatalogCommands {
    centralpage: String,
    rucio: String,
    ami: String,
}

fn quote(arg: &str) -> Result<String> {
    shlex::try_quote(arg)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| CatalogError::config_with_source(format!("cannot quote {arg:?}"), e))
}

impl CatalogCommands {
    pub fn new(cfg: &TransportConfig) -> Self {
        Self {
            centralpage: cfg.centralpage_program.clone(),
            rucio: cfg.rucio_program.clone(),
            ami: cfg.ami_program.clone(),
        }
    }

    fn centralpage(&self, address: &AddressKey, extra: &[&str]) -> Result<CatalogRequest> {
        let mut parts = vec![
            self.centralpage.clone(),
            format!("--scope={}", quote(address.scope())?),
        ];
        parts.extend(extra.iter().map(|flag| (*flag).to_string()));
        for tag in address.hash_tags() {
            parts.push(quote(tag)?);
        }
        Ok(CatalogRequest::new(parts.join(" ")))
    }

    /// `centralpage --scope=<scope> [L1 ..]`: one child hashtag per line
    pub fn hashtag_children(&self, address: &AddressKey) -> Result<CatalogRequest> {
        self.centralpage(address, &[])
    }

    /// `centralpage --scope=<scope> --datasets L1 ..`: one dataset row per line
    pub fn address_datasets(&self, address: &AddressKey) -> Result<CatalogRequest> {
        self.centralpage(address, &["--datasets"])
    }

    /// Containers whose name matches `pattern` (`*` wildcard)
    pub fn list_containers(&self, scope: &str, pattern: &str) -> Result<CatalogRequest> {
        Ok(CatalogRequest::new(format!(
            "{} list-dids --filter type=container --short {}",
            self.rucio,
            quote(&format!("{scope}:{pattern}"))?
        )))
    }

    /// Members of a container
    pub fn list_content(&self, scope: &str, name: &str) -> Result<CatalogRequest> {
        Ok(CatalogRequest::new(format!(
            "{} list-content --short {}",
            self.rucio,
            quote(&format!("{scope}:{name}"))?
        )))
    }

    /// Ancestry of a dataset, nearest first
    pub fn provenance(&self, dataset: &str) -> Result<CatalogRequest> {
        Ok(CatalogRequest::new(format!(
            "{} show dataset prov {}",
            self.ami,
            quote(dataset)?
        )))
    }

    /// Metadata record of a dataset as JSON
    pub fn metadata(&self, dataset: &str) -> Result<CatalogRequest> {
        Ok(CatalogRequest::new(format!(
            "{} show dataset info {} --format=json",
            self.ami,
            quote(dataset)?
        )))
    }

    /// Hashtags attached to a dataset as JSON rows
    pub fn dataset_hashtags(&self, dataset: &str) -> Result<CatalogRequest> {
        Ok(CatalogRequest::new(format!(
            "{} command DatasetWBListHashtags -ldn={} --format=json",
            self.ami,
            quote(dataset)?
        )))
    }
}

impl Default for CatalogCommands {
    fn default() -> Self {
        Self::new(&TransportConfig::default())
    }
}

/// Non-blank, trimmed lines.
fn content_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Drop a leading `scope:` from a data identifier.
pub fn strip_scope_prefix(did: &str) -> &str {
    did.split_once(':').map_or(did, |(_, name)| name)
}

/// Every catalog question the resolvers ask, memoized.
#[derive(Clone, Copy)]
pub struct CatalogQueries<'a> {
    client: &'a dyn CatalogClient,
    resolver: &'a MemoizedResolver,
    commands: &'a CatalogCommands,
}

impl<'a> CatalogQueries<'a> {
    pub fn new(
        client: &'a dyn CatalogClient,
        resolver: &'a MemoizedResolver,
        commands: &'a CatalogCommands,
    ) -> Self {
        Self {
            client,
            resolver,
            commands,
        }
    }

    pub fn resolver(&self) -> &'a MemoizedResolver {
        self.resolver
    }

    /// Child hashtags of an address, in catalog order
    pub fn hash_tags(&self, address: &AddressKey) -> Result<Vec<String>> {
        let key = CacheKey::HashtagChildren(address.clone());
        self.resolver.resolve(&key, || {
            let request = self.commands.hashtag_children(address)?;
            Ok(content_lines(self.client.execute(&request)?))
        })
    }

    /// Dataset rows attached to an address
    pub fn address_datasets(&self, address: &AddressKey) -> Result<Vec<DatasetIdentifier>> {
        let key = CacheKey::AddressDatasets(address.clone());
        self.resolver.resolve(&key, || {
            let request = self.commands.address_datasets(address)?;
            parse_dataset_rows(&self.client.execute(&request)?)
        })
    }

    /// Container names (without scope prefix) matching `pattern`
    pub fn list_containers(&self, scope: &str, pattern: &str) -> Result<Vec<String>> {
        let key = CacheKey::ContainerSearch {
            scope: scope.to_string(),
            pattern: pattern.to_string(),
        };
        self.resolver.resolve(&key, || {
            let request = self.commands.list_containers(scope, pattern)?;
            Ok(content_lines(self.client.execute(&request)?)
                .iter()
                .map(|did| strip_scope_prefix(did).to_string())
                .collect())
        })
    }

    /// Number of files/sub-datasets in a container
    pub fn content_count(&self, scope: &str, name: &str) -> Result<usize> {
        let key = CacheKey::ContainerContent {
            scope: scope.to_string(),
            name: name.to_string(),
        };
        self.resolver.resolve(&key, || {
            let request = self.commands.list_content(scope, name)?;
            Ok(content_lines(self.client.execute(&request)?).len())
        })
    }

    /// Ancestry of a dataset as returned by the catalog (origin last)
    pub fn provenance(&self, scope: &str, dataset: &str) -> Result<Vec<String>> {
        let key = CacheKey::Provenance {
            scope: scope.to_string(),
            dataset: dataset.to_string(),
        };
        self.resolver.resolve(&key, || {
            let request = self.commands.provenance(dataset)?;
            Ok(content_lines(self.client.execute(&request)?)
                .iter()
                .map(|did| strip_scope_prefix(did).to_string())
                .collect())
        })
    }

    /// Metadata record of a dataset
    pub fn metadata(&self, scope: &str, dataset: &str) -> Result<DatasetMetadata> {
        let key = CacheKey::Metadata {
            scope: scope.to_string(),
            dataset: dataset.to_string(),
        };
        self.resolver.resolve(&key, || {
            let request = self.commands.metadata(dataset)?;
            parse_metadata(&self.client.execute(&request)?)
        })
    }

    /// Hashtags attached to a dataset, per level
    pub fn dataset_hashtags(&self, dataset: &str) -> Result<DatasetHashtags> {
        let key = CacheKey::DatasetHashtags {
            dataset: dataset.to_string(),
        };
        self.resolver.resolve(&key, || {
            let request = self.commands.dataset_hashtags(dataset)?;
            parse_hashtag_rows(&self.client.execute(&request)?)
        })
    }
}
