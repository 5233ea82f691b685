//! Catalog configuration loading
//!
//! Loads configuration from `~/.config/atlas-catalog/config.toml` (or
//! `ATLAS_CATALOG_CONFIG` env). Every field has a default, so a missing file
//! is not an error. The cache location can be overridden independently with
//! `ATLAS_MCP_CACHE_DIR`.

use crate::errors::{CatalogError, Result};
use crate::scopes::{
    CampaignTagTable, ScopeDescriptor, ScopeRegistry, default_campaign_tables, default_scopes,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration for the catalog resolver
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    /// Directory holding the persistent cache database
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// How catalog commands are executed
    #[serde(default)]
    pub transport: TransportConfig,

    /// Where the PMG cross-section database lives
    #[serde(default)]
    pub xsec: XsecConfig,

    /// Supported scopes (replaces the built-in list when present)
    #[serde(default = "default_scopes")]
    pub scopes: Vec<ScopeDescriptor>,

    /// AMI tag tables (replaces the built-in tables when present)
    #[serde(default = "default_campaign_tables")]
    pub campaign_tables: Vec<CampaignTagTable>,
}

fn default_cache_dir() -> String {
    dirs::cache_dir()
        .map(|d| d.join("atlas-mcp").to_string_lossy().into_owned())
        .unwrap_or_else(|| ".atlas-mcp-cache".to_string())
}

/// Transport configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    /// argv prefix that runs a command string (the string is appended last)
    #[serde(default = "default_shell")]
    pub shell: Vec<String>,

    /// Command run before every catalog command, joined with `&&`
    #[serde(default)]
    pub preamble: Option<String>,

    /// Central page hashtag browser
    #[serde(default = "default_centralpage_program")]
    pub centralpage_program: String,

    /// Rucio client
    #[serde(default = "default_rucio_program")]
    pub rucio_program: String,

    /// pyAMI client
    #[serde(default = "default_ami_program")]
    pub ami_program: String,
}

fn default_shell() -> Vec<String> {
    vec!["bash".to_string(), "-lc".to_string()]
}
fn default_centralpage_program() -> String {
    "centralpage".to_string()
}
fn default_rucio_program() -> String {
    "rucio".to_string()
}
fn default_ami_program() -> String {
    "ami".to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            preamble: None,
            centralpage_program: default_centralpage_program(),
            rucio_program: default_rucio_program(),
            ami_program: default_ami_program(),
        }
    }
}

/// Cross-section database location
#[derive(Debug, Deserialize, Clone)]
pub struct XsecConfig {
    /// Group data areas, tried in order
    #[serde(default = "default_xsec_base_dirs")]
    pub base_dirs: Vec<String>,

    /// Sub-directory holding the `PMGxsecDB_*.txt` files
    #[serde(default = "default_xsec_subdir")]
    pub subdir: String,
}

fn default_xsec_base_dirs() -> Vec<String> {
    vec![
        "/eos/atlas/atlascerngroupdisk/asg-calib".to_string(),
        "/cvmfs/atlas.cern.ch/repo/sw/database/GroupData".to_string(),
    ]
}

fn default_xsec_subdir() -> String {
    "dev/PMGTools".to_string()
}

impl Default for XsecConfig {
    fn default() -> Self {
        Self {
            base_dirs: default_xsec_base_dirs(),
            subdir: default_xsec_subdir(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            transport: TransportConfig::default(),
            xsec: XsecConfig::default(),
            scopes: default_scopes(),
            campaign_tables: default_campaign_tables(),
        }
    }
}

impl CatalogConfig {
    /// Environment variable for config path override
    pub const ENV_CONFIG_PATH: &'static str = "ATLAS_CATALOG_CONFIG";

    /// Environment variable for cache directory override
    pub const ENV_CACHE_DIR: &'static str = "ATLAS_MCP_CACHE_DIR";

    /// Default config filename
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "config.toml";

    /// Cache database filename inside the cache directory
    pub const CACHE_DB_FILENAME: &'static str = "catalog-cache.db";

    /// Load configuration from file
    ///
    /// Resolution order:
    /// 1. `ATLAS_CATALOG_CONFIG` environment variable
    /// 2. `~/.config/atlas-catalog/config.toml`
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let path = Self::resolve_config_path();

        if !path.exists() {
            tracing::debug!(
                path = %path.display(),
                "catalog config not found, using defaults"
            );
            return Ok(Self::default());
        }

        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::config_with_source(
                format!("failed to read config at {}", path.display()),
                e,
            )
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: CatalogConfig = toml::from_str(contents)
            .map_err(|e| CatalogError::config_with_source("failed to parse config", e))?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Resolve the configuration file path
    fn resolve_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .map(|d| d.join("atlas-catalog").join(Self::DEFAULT_CONFIG_FILENAME))
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }

    fn validate(&self) -> Result<()> {
        if self.transport.shell.is_empty() {
            return Err(CatalogError::config("transport.shell must not be empty"));
        }
        if self.xsec.base_dirs.is_empty() {
            tracing::warn!("xsec.base_dirs is empty; cross-section lookups will fail");
        }
        self.registry().map(|_| ())
    }

    /// Scopes and tag tables, validated.
    pub fn registry(&self) -> Result<ScopeRegistry> {
        ScopeRegistry::new(self.scopes.clone(), self.campaign_tables.clone())
    }

    /// Resolved cache directory: `ATLAS_MCP_CACHE_DIR` wins over the file.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var(Self::ENV_CACHE_DIR)
            && !dir.is_empty()
        {
            return expand_home(&dir);
        }
        expand_home(&self.cache_dir)
    }

    /// Full path of the cache database.
    pub fn resolved_cache_db_path(&self) -> PathBuf {
        self.resolved_cache_dir().join(Self::CACHE_DB_FILENAME)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}
