//! Dataset identifiers and downstream dataset resolution
//!
//! - `DatasetIdentifier` rows parsed from the central page dataset listing
//! - `DatasetResolver` searches derivation/reconstruction containers for a
//!   generation-step dataset, one search per tag-combination variant
//! - "latest" selection compares the trailing version tag numerically

use crate::catalog::CatalogQueries;
use crate::errors::{CatalogError, Result};
use crate::scopes::CampaignTagTable;
use crate::tag_combinations::TagCombinations;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::str::FromStr;

/// Marker of generation-step (EVNT) dataset names.
pub const GENERATION_MARKER: &str = ".evgen.EVNT.";

/// Columns of one central page dataset row.
pub const DATASET_ROW_COLUMNS: usize = 7;

/// Fewest dot-separated fields in a dataset name we can map between steps.
const MIN_NAME_FIELDS: usize = 6;

/// One dataset with its PMG physics metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetIdentifier {
    pub did: String,
    pub cross_section: f64,
    pub gen_filter_eff: f64,
    pub k_factor: f64,
    pub data_tier: String,
    pub sim_type: String,
    pub period: String,
}

impl FromStr for DatasetIdentifier {
    type Err = CatalogError;

    /// `did crossSection genFiltEff kFactor dataTier simType period`
    fn from_str(row: &str) -> Result<Self> {
        let columns: Vec<&str> = row.split_whitespace().collect();
        let [did, xsec, eff, kfactor, tier, sim, period] = columns.as_slice() else {
            return Err(CatalogError::parse(format!(
                "dataset row has {} columns, expected {DATASET_ROW_COLUMNS}: {row:?}",
                columns.len()
            )));
        };

        Ok(Self {
            did: (*did).to_string(),
            cross_section: parse_float("crossSection", xsec, row)?,
            gen_filter_eff: parse_float("genFiltEff", eff, row)?,
            k_factor: parse_float("kFactor", kfactor, row)?,
            data_tier: (*tier).to_string(),
            sim_type: (*sim).to_string(),
            period: (*period).to_string(),
        })
    }
}

fn parse_float(column: &str, value: &str, row: &str) -> Result<f64> {
    value.parse::<f64>().map_err(|e| {
        CatalogError::parse_with_source(format!("bad {column} {value:?} in row {row:?}"), e)
    })
}

/// Parse dataset rows, skipping blank lines.
///
/// Any row with the wrong column count or a non-numeric physics column fails
/// the whole listing. A repeated `did` keeps its first row.
pub fn parse_dataset_rows(lines: &[String]) -> Result<Vec<DatasetIdentifier>> {
    let mut seen = HashSet::new();
    let mut datasets = Vec::new();
    for line in lines.iter().map(String::as_str).map(str::trim).filter(|l| !l.is_empty()) {
        let dataset: DatasetIdentifier = line.parse()?;
        if seen.insert(dataset.did.clone()) {
            datasets.push(dataset);
        } else {
            tracing::debug!(did = %dataset.did, "duplicate dataset row dropped");
        }
    }
    Ok(datasets)
}

/// Target data format of a derived-dataset search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetTier {
    /// Reconstruction output (`recon.AOD`)
    Aod,
    /// A derivation format such as `DAOD_PHYS` (`deriv.DAOD_*`)
    Derivation(String),
}

impl TargetTier {
    /// Processing step in the dataset name.
    pub fn step(&self) -> &str {
        match self {
            Self::Aod => "recon",
            Self::Derivation(_) => "deriv",
        }
    }

    pub fn format(&self) -> &str {
        match self {
            Self::Aod => "AOD",
            Self::Derivation(format) => format,
        }
    }

    /// `.recon.AOD.` / `.deriv.DAOD_PHYS.`
    pub fn marker(&self) -> String {
        format!(".{}.{}.", self.step(), self.format())
    }
}

impl FromStr for TargetTier {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "AOD" => Ok(Self::Aod),
            v if v.len() > "DAOD_".len()
                && v.starts_with("DAOD_")
                && v.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
            {
                Ok(Self::Derivation(v.to_string()))
            }
            other => Err(CatalogError::config(format!(
                "unsupported data tier {other:?}; expected AOD or DAOD_<format>"
            ))),
        }
    }
}

/// Non-empty downstream datasets found for one tag-combination label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedGroup {
    pub label: String,
    pub datasets: Vec<String>,
}

/// Latest dataset of one tag-combination label, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestDerived {
    pub label: String,
    pub dataset: Option<String>,
}

pub struct DatasetResolver<'a> {
    queries: CatalogQueries<'a>,
}

impl<'a> DatasetResolver<'a> {
    pub fn new(queries: CatalogQueries<'a>) -> Self {
        Self { queries }
    }

    /// Downstream datasets of `generation_dataset`, grouped per label.
    ///
    /// Every variant of every label is one container search, and every
    /// candidate container one content query; both are memoized. Containers
    /// with no content are dropped. Labels with no surviving container are
    /// still reported, with an empty list.
    pub fn resolve(
        &self,
        generation_dataset: &str,
        table: &CampaignTagTable,
        combinations: &TagCombinations,
        tier: &TargetTier,
    ) -> Result<Vec<DerivedGroup>> {
        let base = downstream_base_name(generation_dataset, table, tier)?;
        let container_scope = name_scope(&base)?;

        let mut groups = Vec::with_capacity(combinations.len());
        for combination in combinations {
            let mut seen = HashSet::new();
            let mut datasets = Vec::new();
            for variant in &combination.variants {
                let pattern = format!("{base}{variant}*");
                for name in self.queries.list_containers(container_scope, &pattern)? {
                    if seen.contains(&name) {
                        continue;
                    }
                    if self.queries.content_count(container_scope, &name)? > 0 {
                        seen.insert(name.clone());
                        datasets.push(name);
                    } else {
                        tracing::debug!(container = %name, "empty container skipped");
                    }
                }
            }
            groups.push(DerivedGroup {
                label: combination.label.clone(),
                datasets,
            });
        }

        tracing::info!(
            dataset = %generation_dataset,
            tier = tier.format(),
            found = groups.iter().map(|g| g.datasets.len()).sum::<usize>(),
            "derived datasets resolved"
        );
        Ok(groups)
    }
}

/// Turn `mc15_13TeV.<dsid>.<name>.evgen.EVNT.<etag>` into the prefix of its
/// downstream names, e.g. `mc20_13TeV.<dsid>.<name>.deriv.DAOD_PHYS.<etag>`.
fn downstream_base_name(
    generation_dataset: &str,
    table: &CampaignTagTable,
    tier: &TargetTier,
) -> Result<String> {
    if !generation_dataset.contains(GENERATION_MARKER) {
        return Err(CatalogError::config(format!(
            "{generation_dataset:?} is not a generation-step (EVNT) dataset name"
        )));
    }

    let evgen_prefix = format!("{}_", table.evgen_short);
    let Some(rest) = generation_dataset.strip_prefix(&evgen_prefix) else {
        return Err(CatalogError::config(format!(
            "{generation_dataset:?} does not start with {evgen_prefix:?} for {} samples",
            table.scope_short
        )));
    };

    Ok(format!("{}_{rest}", table.reco_short).replacen(GENERATION_MARKER, &tier.marker(), 1))
}

/// Scope part of a dataset name (everything before the first `.`).
pub fn name_scope(dataset: &str) -> Result<&str> {
    dataset
        .split_once('.')
        .map(|(scope, _)| scope)
        .filter(|scope| !scope.is_empty())
        .ok_or_else(|| CatalogError::config(format!("{dataset:?} has no scope field")))
}

/// Map any downstream dataset name to its generation-step (EVNT) name.
///
/// `mc20_13TeV.700320.Sh_2211_Zee.deriv.DAOD_PHYS.e8351_s3681_r13167_p5855`
/// becomes `mc15_13TeV.700320.Sh_2211_Zee.evgen.EVNT.e8351`. EVNT names pass
/// through with their tags trimmed to the evgen tag.
pub fn generation_dataset_name(dataset: &str, table: &CampaignTagTable) -> Result<String> {
    let dataset = crate::catalog::strip_scope_prefix(dataset.trim());
    let mut fields: Vec<String> = dataset.split('.').map(str::to_string).collect();
    if fields.len() < MIN_NAME_FIELDS {
        return Err(CatalogError::config(format!(
            "{dataset:?} is not a dataset name (expected at least {MIN_NAME_FIELDS} dot-separated fields)"
        )));
    }

    let format = fields[4].clone();
    let step_prefix = if format.contains("AOD") {
        Some(&table.reco_short)
    } else if format.contains("HITS") {
        Some(&table.sim_short)
    } else {
        None
    };
    if let Some(prefix) = step_prefix
        && let Some(rest) = fields[0].strip_prefix(&format!("{prefix}_"))
    {
        fields[0] = format!("{}_{rest}", table.evgen_short);
    }

    fields[3] = "evgen".to_string();
    fields[4] = "EVNT".to_string();
    let evgen_tag = fields[5].split('_').next().unwrap_or_default().to_string();
    fields[5] = evgen_tag;
    Ok(fields.join("."))
}

/// Numeric value of a dataset's trailing version tag (`..._p6942` -> 6942).
pub fn version_number(dataset: &str) -> Result<u64> {
    let tag = dataset.rsplit('_').next().unwrap_or(dataset);
    let digits = tag.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    digits.parse::<u64>().map_err(|e| {
        CatalogError::parse_with_source(
            format!("dataset {dataset:?} has no numeric trailing tag ({tag:?})"),
            e,
        )
    })
}

/// Sort newest first by trailing version number. Ties keep input order.
pub fn sort_latest_first(datasets: &[String]) -> Result<Vec<String>> {
    let mut keyed = datasets
        .iter()
        .map(|name| Ok((version_number(name)?, name.clone())))
        .collect::<Result<Vec<_>>>()?;
    keyed.sort_by_key(|(version, _)| Reverse(*version));
    Ok(keyed.into_iter().map(|(_, name)| name).collect())
}

/// The dataset with the highest trailing version number.
pub fn select_latest(datasets: &[String]) -> Result<Option<String>> {
    Ok(sort_latest_first(datasets)?.into_iter().next())
}

/// Reduce each group to its latest dataset.
pub fn latest_per_group(groups: &[DerivedGroup]) -> Result<Vec<LatestDerived>> {
    groups
        .iter()
        .map(|group| {
            Ok(LatestDerived {
                label: group.label.clone(),
                dataset: select_latest(&group.datasets)?,
            })
        })
        .collect()
}
