//! Address resolution engine for the PMG central page MC sample catalog
//!
//! Locates dataset groupings in the four-level PMG hashtag hierarchy and
//! resolves them into concrete datasets and their physics metadata:
//! - bounded-depth exploration of the hashtag tree
//! - keyword filtering of addresses
//! - simulation x reconstruction tag combinations per campaign
//! - downstream (AOD/DAOD) dataset search with numeric "latest" selection
//! - provenance walk and metadata lookup
//!
//! Every catalog query is memoized in a persistent SQLite cache. The catalog
//! itself is reached through a [`CatalogClient`]; the default one runs the
//! `centralpage`, `rucio` and `ami` command-line clients through a shell.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod address;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod datasets;
pub mod errors;
pub mod explorer;
pub mod keyword;
pub mod provenance;
pub mod scopes;
pub mod tag_combinations;
pub mod transport;
pub mod xsec_db;

pub use address::{AddressKey, MAX_DEPTH};
pub use cache::{CacheKey, CacheStore, MemoizedResolver, NamespaceStats};
pub use catalog::{CatalogCommands, CatalogQueries};
pub use config::{CatalogConfig, TransportConfig, XsecConfig};
pub use datasets::{
    DatasetIdentifier, DatasetResolver, DerivedGroup, LatestDerived, TargetTier,
    generation_dataset_name, select_latest, sort_latest_first,
};
pub use errors::{CatalogError, ErrorCategory, Result};
pub use explorer::HashtagTreeExplorer;
pub use keyword::KeywordMatcher;
pub use provenance::{DatasetHashtags, DatasetMetadata, MetadataResolver, ProvenanceWalker};
pub use scopes::{CampaignTagTable, ScopeDescriptor, ScopeRegistry};
pub use tag_combinations::{TagCombination, TagCombinations};
pub use transport::{CatalogClient, CatalogRequest, ShellCatalogClient};
pub use xsec_db::{XsecDatabase, XsecEntry};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Main entry point: every resolver operation over one client and one cache.
///
/// Scope and tier arguments are validated before any catalog call is made.
pub struct CentralPage {
    registry: ScopeRegistry,
    commands: CatalogCommands,
    xsec: XsecConfig,
    client: Arc<dyn CatalogClient>,
    resolver: Arc<MemoizedResolver>,
    xsec_databases: Mutex<HashMap<String, Arc<XsecDatabase>>>,
}

impl CentralPage {
    /// Wire a facade from explicit parts (tests inject a scripted client and
    /// an in-memory cache).
    pub fn new(
        cfg: &CatalogConfig,
        client: Arc<dyn CatalogClient>,
        resolver: Arc<MemoizedResolver>,
    ) -> Result<Self> {
        Ok(Self {
            registry: cfg.registry()?,
            commands: CatalogCommands::new(&cfg.transport),
            xsec: cfg.xsec.clone(),
            client,
            resolver,
            xsec_databases: Mutex::new(HashMap::new()),
        })
    }

    /// Production wiring: shell transport and the on-disk cache.
    pub fn open(cfg: &CatalogConfig) -> Result<Self> {
        let client = Arc::new(ShellCatalogClient::new(&cfg.transport)?);
        let resolver = Arc::new(MemoizedResolver::open(cfg)?);

        tracing::info!(
            version = VERSION,
            cache = %cfg.resolved_cache_db_path().display(),
            scopes = cfg.scopes.len(),
            "central page resolver initialized"
        );

        Self::new(cfg, client, resolver)
    }

    fn queries(&self) -> CatalogQueries<'_> {
        CatalogQueries::new(self.client.as_ref(), &self.resolver, &self.commands)
    }

    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    pub fn allowed_scopes(&self) -> &[ScopeDescriptor] {
        self.registry.scopes()
    }

    /// Child hashtags of an address.
    pub fn hash_tags(&self, address: &AddressKey) -> Result<Vec<String>> {
        self.registry.require_scope(address.scope())?;
        self.queries().hash_tags(address)
    }

    /// Every address of a scope, within the depth bound.
    pub fn all_addresses(&self, scope: &str) -> Result<Vec<AddressKey>> {
        self.registry.require_scope(scope)?;
        HashtagTreeExplorer::new(self.queries()).explore(scope)
    }

    /// Addresses whose tags contain every keyword; optionally only
    /// `Baseline` samples.
    pub fn addresses_for_keywords<S: AsRef<str>>(
        &self,
        scope: &str,
        keywords: &[S],
        baseline_only: bool,
    ) -> Result<Vec<AddressKey>> {
        let addresses = self.all_addresses(scope)?;
        let mut matched = keyword::filter(&addresses, keywords);
        if baseline_only {
            matched = keyword::baseline_only(matched);
        }
        tracing::debug!(
            scope,
            keywords = keywords.len(),
            baseline_only,
            matched = matched.len(),
            "keyword search"
        );
        Ok(matched)
    }

    /// Datasets attached to an address, with their PMG physics metadata.
    pub fn datasets_for_address(&self, address: &AddressKey) -> Result<Vec<DatasetIdentifier>> {
        self.registry.require_scope(address.scope())?;
        self.queries().address_datasets(address)
    }

    pub fn tag_combinations(&self, scope: &str) -> Result<TagCombinations> {
        tag_combinations::combinations(self.registry.table_for_scope(scope)?)
    }

    /// Non-empty `tier` datasets derived from `dataset`, per tag combination.
    ///
    /// `dataset` may be any step of the chain; non-EVNT names are mapped to
    /// their generation-step name first.
    pub fn derived_datasets(
        &self,
        scope: &str,
        dataset: &str,
        tier: &str,
    ) -> Result<Vec<DerivedGroup>> {
        let tier: TargetTier = tier.parse()?;
        let table = self.registry.table_for_scope(scope)?;
        let combinations = tag_combinations::combinations(table)?;

        let dataset = catalog::strip_scope_prefix(dataset.trim());
        let generation_dataset = if dataset.contains(datasets::GENERATION_MARKER) {
            dataset.to_string()
        } else {
            generation_dataset_name(dataset, table)?
        };

        DatasetResolver::new(self.queries()).resolve(
            &generation_dataset,
            table,
            &combinations,
            &tier,
        )
    }

    /// The numerically latest derived dataset per tag combination.
    pub fn latest_derived(
        &self,
        scope: &str,
        dataset: &str,
        tier: &str,
    ) -> Result<Vec<LatestDerived>> {
        datasets::latest_per_group(&self.derived_datasets(scope, dataset, tier)?)
    }

    /// Ancestry of a dataset, origin last.
    pub fn provenance(&self, scope: &str, dataset: &str) -> Result<Vec<String>> {
        self.registry.require_scope(scope)?;
        ProvenanceWalker::new(self.queries()).provenance(scope, dataset)
    }

    pub fn metadata(
        &self,
        scope: &str,
        dataset: &str,
        use_top_of_provenance: bool,
    ) -> Result<DatasetMetadata> {
        self.registry.require_scope(scope)?;
        MetadataResolver::new(self.queries()).metadata(scope, dataset, use_top_of_provenance)
    }

    /// PMG hashtags attached to a dataset (reverse lookup).
    pub fn hashtags_for_dataset(&self, dataset: &str) -> Result<DatasetHashtags> {
        self.queries().dataset_hashtags(dataset)
    }

    /// PMG cross-section entry of a dataset; `None` when not tabulated.
    pub fn cross_section(&self, scope: &str, dataset: &str) -> Result<Option<XsecEntry>> {
        let table = self.registry.table_for_scope(scope)?;
        let db = self.xsec_database(table)?;
        Ok(db.lookup(dataset)?.cloned())
    }

    fn xsec_database(&self, table: &CampaignTagTable) -> Result<Arc<XsecDatabase>> {
        let filename = xsec_db::database_filename(table);
        let mut loaded = self
            .xsec_databases
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(db) = loaded.get(&filename) {
            return Ok(Arc::clone(db));
        }
        let db = Arc::new(XsecDatabase::load(&self.xsec, table)?);
        loaded.insert(filename, Arc::clone(&db));
        Ok(db)
    }

    pub fn cache_stats(&self) -> Result<Vec<NamespaceStats>> {
        self.resolver.stats()
    }

    /// Drop every cached answer, or only one namespace.
    pub fn clear_cache(&self, namespace: Option<&str>) -> Result<usize> {
        if let Some(namespace) = namespace
            && !CacheKey::NAMESPACES.contains(&namespace)
        {
            return Err(CatalogError::config(format!(
                "unknown cache namespace {namespace:?}; must be one of: {}",
                CacheKey::NAMESPACES.join(", ")
            )));
        }
        self.resolver.clear(namespace)
    }
}
