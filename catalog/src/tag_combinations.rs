//! Simulation x reconstruction tag combinations
//!
//! Expands a [`CampaignTagTable`] into the labelled name-suffix variants
//! (`_<simTag>_<recoTag>`) used to search for downstream datasets. Order is
//! observable: simulation tag outermost, then campaign, then reco tag.

use crate::errors::{CatalogError, Result};
use crate::scopes::{CampaignTagTable, FULL_SIM_KEY};
use serde::{Deserialize, Serialize};

/// One label (`"<campaign> - <simType>"`) and its ordered suffix variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCombination {
    pub label: String,
    pub variants: Vec<String>,
}

/// Ordered, label-unique collection of [`TagCombination`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagCombinations(Vec<TagCombination>);

impl TagCombinations {
    /// Variants of one label.
    pub fn get(&self, label: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|combo| combo.label == label)
            .map(|combo| combo.variants.as_slice())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|combo| combo.label.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TagCombination> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a variant under `label`, creating the label on first use.
    fn push(&mut self, label: String, variant: String) {
        match self.0.iter_mut().find(|combo| combo.label == label) {
            Some(combo) => combo.variants.push(variant),
            None => self.0.push(TagCombination {
                label,
                variants: vec![variant],
            }),
        }
    }
}

impl<'a> IntoIterator for &'a TagCombinations {
    type Item = &'a TagCombination;
    type IntoIter = std::slice::Iter<'a, TagCombination>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Build every labelled variant for a table.
///
/// Full simulation labels (`"<campaign> - FS"`) come first, then the single
/// fast simulation family (`"<campaign> - AF3"`). A table without a fast
/// simulation family is rejected.
pub fn combinations(table: &CampaignTagTable) -> Result<TagCombinations> {
    let full_sim = table.full_simulation_tags()?;
    let fast_sim = table.fast_simulation_family()?;

    let mut combos = TagCombinations::default();
    for (family_key, sim_tags) in [
        (FULL_SIM_KEY, full_sim),
        (fast_sim.key.as_str(), fast_sim.tags.as_slice()),
    ] {
        for sim_tag in sim_tags {
            for campaign in &table.campaigns {
                let label = format!("{} - {family_key}", campaign.name);
                for reco_tag in &campaign.reco_tags {
                    combos.push(label.clone(), format!("_{sim_tag}_{reco_tag}"));
                }
            }
        }
    }

    if combos.is_empty() {
        return Err(CatalogError::config(format!(
            "campaign table {} yields no tag combinations",
            table.scope_short
        )));
    }

    tracing::debug!(
        scope_short = %table.scope_short,
        labels = combos.len(),
        "built tag combinations"
    );
    Ok(combos)
}
