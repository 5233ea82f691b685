//! Supported scopes and per-campaign tag tables
//!
//! Static configuration: which scopes the central page catalog serves, and
//! for each scope family the AMI tag vocabulary (simulation tags, fast
//! simulation tags, reconstruction tags per campaign) needed to build
//! downstream dataset names. The built-in tables can be replaced from the
//! config file; order is significant everywhere.

use crate::address::scope_short;
use crate::errors::{CatalogError, Result};
use serde::{Deserialize, Serialize};

/// Key of the full simulation tag family.
pub const FULL_SIM_KEY: &str = "FS";

/// Marker identifying the fast simulation tag family (`AF2`, `AF3`, ...).
pub const FAST_SIM_MARKER: &str = "AF";

/// A scope served by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDescriptor {
    /// Data scope name, e.g. `mc20_13TeV`
    pub scope: String,
    /// Description of the scope
    pub description: String,
}

impl ScopeDescriptor {
    fn new(scope: &str, description: &str) -> Self {
        Self {
            scope: scope.to_string(),
            description: description.to_string(),
        }
    }
}

/// A named simulation tag family (`FS`, `AF2`, `AF3`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimFamily {
    pub key: String,
    pub tags: Vec<String>,
}

/// A reconstruction campaign and its reco tags, newest preference first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub name: String,
    pub reco_tags: Vec<String>,
}

/// AMI tag vocabulary of one scope family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignTagTable {
    /// Scope short code this table serves (`mc20`)
    pub scope_short: String,
    /// Prefix of generation-step dataset names
    pub evgen_short: String,
    /// Prefix of simulation-step dataset names
    pub sim_short: String,
    /// Prefix of reconstruction/derivation dataset names
    pub reco_short: String,
    /// Simulation tag families in configuration order
    pub sim_families: Vec<SimFamily>,
    /// Campaigns in configuration order
    pub campaigns: Vec<Campaign>,
}

impl CampaignTagTable {
    /// Tags of the full simulation family.
    pub fn full_simulation_tags(&self) -> Result<&[String]> {
        self.sim_families
            .iter()
            .find(|family| family.key == FULL_SIM_KEY)
            .map(|family| family.tags.as_slice())
            .ok_or_else(|| {
                CatalogError::config(format!(
                    "campaign table {} has no {FULL_SIM_KEY} simulation family",
                    self.scope_short
                ))
            })
    }

    /// The single fast simulation family (key containing `AF`).
    pub fn fast_simulation_family(&self) -> Result<&SimFamily> {
        let mut fast = self
            .sim_families
            .iter()
            .filter(|family| family.key.contains(FAST_SIM_MARKER));
        match (fast.next(), fast.next()) {
            (Some(family), None) => Ok(family),
            (None, _) => Err(CatalogError::config(format!(
                "campaign table {} has no fast simulation ({FAST_SIM_MARKER}*) family",
                self.scope_short
            ))),
            (Some(_), Some(_)) => Err(CatalogError::config(format!(
                "campaign table {} has more than one fast simulation ({FAST_SIM_MARKER}*) family",
                self.scope_short
            ))),
        }
    }

    /// Check the invariants every table must satisfy.
    pub fn validate(&self) -> Result<()> {
        for (what, value) in [
            ("scope_short", &self.scope_short),
            ("evgen_short", &self.evgen_short),
            ("sim_short", &self.sim_short),
            ("reco_short", &self.reco_short),
        ] {
            if value.is_empty() {
                return Err(CatalogError::config(format!(
                    "campaign table {:?}: {what} must not be empty",
                    self.scope_short
                )));
            }
        }
        self.full_simulation_tags()?;
        self.fast_simulation_family()?;
        if self.campaigns.is_empty() {
            return Err(CatalogError::config(format!(
                "campaign table {} defines no reconstruction campaigns",
                self.scope_short
            )));
        }
        Ok(())
    }
}

/// Scopes and tag tables the resolver works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRegistry {
    scopes: Vec<ScopeDescriptor>,
    tables: Vec<CampaignTagTable>,
}

impl ScopeRegistry {
    /// Build a registry, validating every table and that every scope has one.
    pub fn new(scopes: Vec<ScopeDescriptor>, tables: Vec<CampaignTagTable>) -> Result<Self> {
        for table in &tables {
            table.validate()?;
        }
        for descriptor in &scopes {
            let short = scope_short(&descriptor.scope);
            if !tables.iter().any(|t| t.scope_short == short) {
                return Err(CatalogError::config(format!(
                    "scope {} has no campaign table for {short}",
                    descriptor.scope
                )));
            }
        }
        Ok(Self { scopes, tables })
    }

    pub fn scopes(&self) -> &[ScopeDescriptor] {
        &self.scopes
    }

    /// Fail fast unless `scope` is one of the supported scopes.
    pub fn require_scope(&self, scope: &str) -> Result<&ScopeDescriptor> {
        self.scopes
            .iter()
            .find(|d| d.scope == scope)
            .ok_or_else(|| {
                let allowed: Vec<&str> = self.scopes.iter().map(|d| d.scope.as_str()).collect();
                CatalogError::config(format!(
                    "scope {scope:?} is not supported; must be one of: {}",
                    allowed.join(", ")
                ))
            })
    }

    /// Tag table for a supported scope.
    pub fn table_for_scope(&self, scope: &str) -> Result<&CampaignTagTable> {
        self.require_scope(scope)?;
        self.table_for_short(scope_short(scope))
    }

    /// Tag table by short code (`mc20`).
    pub fn table_for_short(&self, short: &str) -> Result<&CampaignTagTable> {
        self.tables
            .iter()
            .find(|t| t.scope_short == short)
            .ok_or_else(|| CatalogError::config(format!("no campaign table for {short:?}")))
    }
}

impl Default for ScopeRegistry {
    fn default() -> Self {
        Self {
            scopes: default_scopes(),
            tables: default_campaign_tables(),
        }
    }
}

/// Scopes served by the central page catalog.
pub fn default_scopes() -> Vec<ScopeDescriptor> {
    vec![
        ScopeDescriptor::new(
            "mc16_13TeV",
            "MonteCarlo for Run 2 Data, based on Release 21 of the software. Very old. \
             Stay away if possible.",
        ),
        ScopeDescriptor::new(
            "mc20_13TeV",
            "MonteCarlo for Run 2 Detector Data, based on Release 22 of the software \
             (Release 25 is usable).",
        ),
        ScopeDescriptor::new(
            "mc23_13p6TeV",
            "MonteCarlo for Run 3 Detector Data, based on Release 25 of the software.",
        ),
    ]
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

fn family(key: &str, tags: &[&str]) -> SimFamily {
    SimFamily {
        key: key.to_string(),
        tags: strings(tags),
    }
}

fn campaign(name: &str, reco_tags: &[&str]) -> Campaign {
    Campaign {
        name: name.to_string(),
        reco_tags: strings(reco_tags),
    }
}

/// AMI tag combinations for the MC campaigns, full and fast simulation.
pub fn default_campaign_tables() -> Vec<CampaignTagTable> {
    vec![
        CampaignTagTable {
            scope_short: "mc16".to_string(),
            evgen_short: "mc15".to_string(),
            sim_short: "mc16".to_string(),
            reco_short: "mc16".to_string(),
            sim_families: vec![family("FS", &["s3126"]), family("AF2", &["a875"])],
            campaigns: vec![
                campaign("mc16a", &["r9364"]),
                campaign("mc16d", &["r10201"]),
                campaign("mc16e", &["r10724"]),
            ],
        },
        CampaignTagTable {
            scope_short: "mc20".to_string(),
            evgen_short: "mc15".to_string(),
            sim_short: "mc16".to_string(),
            reco_short: "mc20".to_string(),
            sim_families: vec![
                family("FS", &["s3681", "s4231", "s3797"]),
                family("AF2", &["a907"]),
            ],
            campaigns: vec![
                campaign("mc20a", &["r13167", "r14859"]),
                campaign("mc20d", &["r13144", "r14860"]),
                campaign("mc20e", &["r13145", "r14861"]),
            ],
        },
        CampaignTagTable {
            scope_short: "mc23".to_string(),
            evgen_short: "mc23".to_string(),
            sim_short: "mc23".to_string(),
            reco_short: "mc23".to_string(),
            sim_families: vec![
                family("FS", &["s4162", "s4159", "s4369"]),
                family("AF3", &["a910", "a911", "a934"]),
            ],
            campaigns: vec![
                campaign("mc23a", &["r15540", "r14622"]),
                campaign("mc23d", &["r15530", "r15224"]),
                campaign("mc23e", &["r16083"]),
            ],
        },
    ]
}
