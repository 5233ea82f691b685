//! `atlas-catalog` command line
//!
//! Thin front-end over [`atlas_catalog::CentralPage`]: every subcommand maps
//! to one resolver operation and prints either plain text or `--json`.
//!
//! ## Exit codes
//! - 0: success (including empty results)
//! - 1: configuration error (unknown scope, unsupported tier, bad config)
//! - 2: any other failure (catalog command, unexpected output, cache)

mod cache_cmd;
mod catalog_cmd;

use anyhow::Context;
use atlas_catalog::{CatalogConfig, CatalogError, CentralPage, ErrorCategory};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub use cache_cmd::{CacheSubcommand, ClearArgs};
pub use catalog_cmd::{
    AddressesArgs, DatasetArgs, DatasetsArgs, DerivedArgs, MetadataArgs, ScopeArgs, SearchArgs,
    TagsArgs,
};

/// Exit code for configuration errors
pub const EXIT_CONFIG: i32 = 1;
/// Exit code for every other failure
pub const EXIT_FAILURE: i32 = 2;

/// Browse the PMG central page catalog and resolve MC datasets
#[derive(Debug, Parser)]
#[command(name = "atlas-catalog", version)]
pub struct Cli {
    /// Config file (default: $ATLAS_CATALOG_CONFIG or ~/.config/atlas-catalog/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output as JSON for automation
    #[arg(long, global = true)]
    pub json: bool,

    /// Debug logging on stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the supported scopes
    Scopes,
    /// Child hashtags of an address
    Tags(TagsArgs),
    /// Every address of a scope
    Addresses(AddressesArgs),
    /// Addresses whose hashtags contain every keyword
    Search(SearchArgs),
    /// Datasets attached to an address (`scope/L1/L2/L3/L4`)
    Datasets(DatasetsArgs),
    /// Simulation x reconstruction tag combinations of a scope
    Combos(ScopeArgs),
    /// Downstream AOD/DAOD datasets of a dataset, per tag combination
    Derived(DerivedArgs),
    /// Processing ancestry of a dataset, origin last
    Provenance(DatasetArgs),
    /// AMI metadata of a dataset
    Metadata(MetadataArgs),
    /// PMG hashtags attached to a dataset
    Hashtags {
        /// Dataset name
        dataset: String,
    },
    /// PMG cross-section entry of a dataset
    Xsec(DatasetArgs),
    /// Inspect or clear the persistent cache
    Cache {
        #[command(subcommand)]
        command: CacheSubcommand,
    },
}

/// Install the stderr log subscriber.
pub fn init_logging(verbose: bool) {
    let default_level = "warn";
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_level))
            .unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<CatalogConfig> {
    let cfg = match path {
        Some(path) => CatalogConfig::load_from_path(path)?,
        None => CatalogConfig::load()?,
    };
    Ok(cfg)
}

fn execute(cli: Cli) -> anyhow::Result<()> {
    let cfg = load_config(cli.config.as_ref())?;
    let page = CentralPage::open(&cfg).context("failed to open catalog resolver")?;
    let json = cli.json;

    match cli.command {
        Command::Scopes => catalog_cmd::run_scopes(&page, json),
        Command::Tags(args) => catalog_cmd::run_tags(&page, args, json),
        Command::Addresses(args) => catalog_cmd::run_addresses(&page, args, json),
        Command::Search(args) => catalog_cmd::run_search(&page, args, json),
        Command::Datasets(args) => catalog_cmd::run_datasets(&page, args, json),
        Command::Combos(args) => catalog_cmd::run_combos(&page, args, json),
        Command::Derived(args) => catalog_cmd::run_derived(&page, args, json),
        Command::Provenance(args) => catalog_cmd::run_provenance(&page, args, json),
        Command::Metadata(args) => catalog_cmd::run_metadata(&page, args, json),
        Command::Hashtags { dataset } => catalog_cmd::run_hashtags(&page, &dataset, json),
        Command::Xsec(args) => catalog_cmd::run_xsec(&page, args, json),
        Command::Cache { command } => cache_cmd::run(&page, command, json),
    }
}

/// Exit code for a failed command.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<CatalogError>().map(CatalogError::category) {
        Some(ErrorCategory::ConfigError) => EXIT_CONFIG,
        _ => EXIT_FAILURE,
    }
}

/// Run a parsed command line and return the process exit code.
pub fn run(cli: Cli) -> i32 {
    match execute(cli) {
        Ok(()) => 0,
        Err(err) => {
            let code = exit_code(&err);
            tracing::debug!(exit_code = code, "command failed");
            eprintln!("Error: {err:#}");
            code
        }
    }
}
