//! Catalog lookup commands
//!
//! - `atlas-catalog scopes`
//! - `atlas-catalog tags <scope> [TAG..]`
//! - `atlas-catalog addresses <scope>`
//! - `atlas-catalog search <scope> <KEYWORD..> [--baseline-only]`
//! - `atlas-catalog datasets <scope/L1/L2/L3/L4>`
//! - `atlas-catalog combos <scope>`
//! - `atlas-catalog derived <scope> <dataset> --tier <AOD|DAOD_X> [--latest]`
//! - `atlas-catalog provenance|metadata|xsec <scope> <dataset>`
//! - `atlas-catalog hashtags <dataset>`

use anyhow::Result;
use atlas_catalog::{
    AddressKey, CentralPage, DatasetHashtags, DatasetIdentifier, DatasetMetadata, DerivedGroup,
    LatestDerived, MAX_DEPTH, TagCombinations, XsecEntry,
};
use clap::Parser;
use serde::Serialize;

#[derive(Debug, Parser)]
pub struct ScopeArgs {
    /// Data scope, e.g. mc20_13TeV
    pub scope: String,
}

#[derive(Debug, Parser)]
pub struct TagsArgs {
    /// Data scope, e.g. mc20_13TeV
    pub scope: String,
    /// Parent hashtags, outermost first
    pub tags: Vec<String>,
}

#[derive(Debug, Parser)]
pub struct AddressesArgs {
    /// Data scope, e.g. mc20_13TeV
    pub scope: String,
}

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Data scope, e.g. mc20_13TeV
    pub scope: String,
    /// Every keyword must appear among the address hashtags
    #[arg(required = true)]
    pub keywords: Vec<String>,
    /// Keep only Baseline samples
    #[arg(long)]
    pub baseline_only: bool,
}

#[derive(Debug, Parser)]
pub struct DatasetsArgs {
    /// Address as `scope/L1/L2/L3/L4`
    pub address: String,
}

#[derive(Debug, Parser)]
pub struct DerivedArgs {
    /// Data scope, e.g. mc20_13TeV
    pub scope: String,
    /// Dataset name at any step of the processing chain
    pub dataset: String,
    /// Target tier: AOD or DAOD_<FORMAT>
    #[arg(long, value_name = "TIER")]
    pub tier: String,
    /// Only the latest dataset per tag combination
    #[arg(long)]
    pub latest: bool,
}

#[derive(Debug, Parser)]
pub struct DatasetArgs {
    /// Data scope, e.g. mc20_13TeV
    pub scope: String,
    /// Dataset name
    pub dataset: String,
}

#[derive(Debug, Parser)]
pub struct MetadataArgs {
    /// Data scope, e.g. mc20_13TeV
    pub scope: String,
    /// Dataset name
    pub dataset: String,
    /// Read the metadata of the origin of the provenance chain
    #[arg(long)]
    pub top: bool,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

fn emit<T: Serialize + ?Sized>(
    value: &T,
    json: bool,
    render: impl FnOnce(&T) -> Vec<String>,
) -> Result<()> {
    if json {
        print_json(value)
    } else {
        print_lines(&render(value));
        Ok(())
    }
}

fn address_lines(addresses: &[AddressKey]) -> Vec<String> {
    addresses.iter().map(ToString::to_string).collect()
}

pub fn run_scopes(page: &CentralPage, json: bool) -> Result<()> {
    emit(page.allowed_scopes(), json, |scopes| {
        scopes
            .iter()
            .map(|s| format!("{:<16} {}", s.scope, s.description))
            .collect()
    })
}

pub fn run_tags(page: &CentralPage, args: TagsArgs, json: bool) -> Result<()> {
    let address = AddressKey::new(args.scope, args.tags)?;
    let tags = page.hash_tags(&address)?;
    emit(tags.as_slice(), json, <[String]>::to_vec)
}

pub fn run_addresses(page: &CentralPage, args: AddressesArgs, json: bool) -> Result<()> {
    let addresses = page.all_addresses(&args.scope)?;
    emit(addresses.as_slice(), json, address_lines)
}

pub fn run_search(page: &CentralPage, args: SearchArgs, json: bool) -> Result<()> {
    let addresses =
        page.addresses_for_keywords(&args.scope, args.keywords.as_slice(), args.baseline_only)?;
    emit(addresses.as_slice(), json, address_lines)
}

pub fn run_datasets(page: &CentralPage, args: DatasetsArgs, json: bool) -> Result<()> {
    let address: AddressKey = args.address.trim().parse()?;
    let datasets = page.datasets_for_address(&address)?;
    emit(datasets.as_slice(), json, dataset_lines)
}

fn dataset_lines(datasets: &[DatasetIdentifier]) -> Vec<String> {
    datasets
        .iter()
        .map(|d| {
            format!(
                "{}  xsec={} eff={} k={} {} {} {}",
                d.did,
                d.cross_section,
                d.gen_filter_eff,
                d.k_factor,
                d.data_tier,
                d.sim_type,
                d.period
            )
        })
        .collect()
}

pub fn run_combos(page: &CentralPage, args: ScopeArgs, json: bool) -> Result<()> {
    let combinations = page.tag_combinations(&args.scope)?;
    emit(&combinations, json, combination_lines)
}

fn combination_lines(combinations: &TagCombinations) -> Vec<String> {
    combinations
        .iter()
        .map(|c| format!("{}: {}", c.label, c.variants.join(", ")))
        .collect()
}

pub fn run_derived(page: &CentralPage, args: DerivedArgs, json: bool) -> Result<()> {
    if args.latest {
        let latest = page.latest_derived(&args.scope, &args.dataset, &args.tier)?;
        emit(latest.as_slice(), json, latest_lines)
    } else {
        let groups = page.derived_datasets(&args.scope, &args.dataset, &args.tier)?;
        emit(groups.as_slice(), json, derived_lines)
    }
}

fn derived_lines(groups: &[DerivedGroup]) -> Vec<String> {
    let mut lines = Vec::new();
    for group in groups {
        lines.push(format!("{}:", group.label));
        lines.extend(group.datasets.iter().map(|d| format!("  {d}")));
    }
    lines
}

fn latest_lines(latest: &[LatestDerived]) -> Vec<String> {
    latest
        .iter()
        .map(|l| format!("{}: {}", l.label, l.dataset.as_deref().unwrap_or("-")))
        .collect()
}

pub fn run_provenance(page: &CentralPage, args: DatasetArgs, json: bool) -> Result<()> {
    let chain = page.provenance(&args.scope, &args.dataset)?;
    emit(chain.as_slice(), json, <[String]>::to_vec)
}

pub fn run_metadata(page: &CentralPage, args: MetadataArgs, json: bool) -> Result<()> {
    let metadata = page.metadata(&args.scope, &args.dataset, args.top)?;
    emit(&metadata, json, metadata_lines)
}

fn metadata_lines(metadata: &DatasetMetadata) -> Vec<String> {
    let width = metadata.fields().keys().map(String::len).max().unwrap_or(0);
    metadata
        .fields()
        .iter()
        .map(|(key, value)| format!("{key:<width$}  {value}"))
        .collect()
}

pub fn run_hashtags(page: &CentralPage, dataset: &str, json: bool) -> Result<()> {
    let hashtags = page.hashtags_for_dataset(dataset)?;
    emit(&hashtags, json, hashtag_lines)
}

fn hashtag_lines(hashtags: &DatasetHashtags) -> Vec<String> {
    (1..=MAX_DEPTH)
        .map(|level| format!("PMGL{level}: {}", hashtags.level(level).join(", ")))
        .collect()
}

pub fn run_xsec(page: &CentralPage, args: DatasetArgs, json: bool) -> Result<()> {
    let entry = page.cross_section(&args.scope, &args.dataset)?;
    emit(&entry, json, |e| xsec_lines(e.as_ref()))
}

fn xsec_lines(entry: Option<&XsecEntry>) -> Vec<String> {
    let Some(e) = entry else {
        return vec!["no cross-section entry".to_string()];
    };
    vec![
        format!("dataset_number  {}", e.dataset_number),
        format!("physics_short   {}", e.physics_short),
        format!("cross_section   {} pb", e.cross_section),
        format!("gen_filter_eff  {}", e.gen_filter_eff),
        format!("k_factor        {}", e.k_factor),
        format!("rel_uncert      +{} -{}", e.rel_uncert_up, e.rel_uncert_down),
        format!("generator       {}", e.generator_name),
        format!("etag            {}", e.etag),
    ]
}
