//! Cache maintenance commands
//!
//! - `atlas-catalog cache stats` - entries and hits per namespace
//! - `atlas-catalog cache clear [--namespace NS]` - drop cached answers

use anyhow::Result;
use atlas_catalog::{CentralPage, NamespaceStats};
use clap::{Parser, Subcommand};
use serde_json::json;

#[derive(Debug, Subcommand)]
pub enum CacheSubcommand {
    /// Entries and hit counts per namespace
    Stats,
    /// Drop cached answers so the next call re-queries the catalog
    Clear(ClearArgs),
}

#[derive(Debug, Parser)]
pub struct ClearArgs {
    /// Only this namespace (e.g. hashtag_children)
    #[arg(long, value_name = "NAMESPACE")]
    pub namespace: Option<String>,
}

pub fn run(page: &CentralPage, command: CacheSubcommand, json: bool) -> Result<()> {
    match command {
        CacheSubcommand::Stats => {
            let stats = page.cache_stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_human_stats(&stats);
            }
        }
        CacheSubcommand::Clear(args) => {
            let removed = page.clear_cache(args.namespace.as_deref())?;
            if json {
                let report = json!({ "removed": removed, "namespace": args.namespace });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Removed {removed} cached entries");
            }
        }
    }
    Ok(())
}

fn print_human_stats(stats: &[NamespaceStats]) {
    if stats.is_empty() {
        println!("Cache is empty");
        return;
    }
    println!("{:<20} {:>8} {:>8}", "NAMESPACE", "ENTRIES", "HITS");
    for s in stats {
        println!("{:<20} {:>8} {:>8}", s.namespace, s.entries, s.hits);
    }
}
