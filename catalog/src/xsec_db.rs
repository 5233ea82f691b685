//! PMG cross-section database
//!
//! Whitespace-separated text file published by PMG in the group data area,
//! one row per (DSID, evgen tag):
//!
//! ```text
//! dataset_number physics_short crossSection genFiltEff kFactor relUncertUP relUncertDOWN generator_name etag
//! ```

use crate::config::XsecConfig;
use crate::errors::{CatalogError, Result};
use crate::scopes::CampaignTagTable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const XSEC_COLUMNS: usize = 9;

/// Scope families that share the Run 2 database file.
const RUN2_FAMILIES: [&str; 2] = ["mc16", "mc20"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XsecEntry {
    pub dataset_number: u32,
    pub physics_short: String,
    /// Cross section in pb
    pub cross_section: f64,
    pub gen_filter_eff: f64,
    pub k_factor: f64,
    pub rel_uncert_up: f64,
    pub rel_uncert_down: f64,
    pub generator_name: String,
    pub etag: String,
}

#[derive(Debug, Clone, Default)]
pub struct XsecDatabase {
    source: Option<PathBuf>,
    entries: HashMap<(u32, String), XsecEntry>,
}

/// Database file name for a scope family.
pub fn database_filename(table: &CampaignTagTable) -> String {
    if RUN2_FAMILIES.contains(&table.scope_short.as_str()) {
        "PMGxsecDB_mc16.txt".to_string()
    } else {
        format!("PMGxsecDB_{}.txt", table.sim_short)
    }
}

impl XsecDatabase {
    /// Load the database for `table` from the first base directory that has
    /// a readable copy.
    pub fn load(cfg: &XsecConfig, table: &CampaignTagTable) -> Result<Self> {
        let filename = database_filename(table);
        let candidates: Vec<PathBuf> = cfg
            .base_dirs
            .iter()
            .map(|base| Path::new(base).join(&cfg.subdir).join(&filename))
            .collect();

        for path in &candidates {
            match std::fs::read_to_string(path) {
                Ok(contents) => {
                    let mut db = Self::parse(&contents)?;
                    tracing::debug!(path = %path.display(), entries = db.len(), "loaded xsec database");
                    db.source = Some(path.clone());
                    return Ok(db);
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "xsec database not readable");
                }
            }
        }

        let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
        Err(CatalogError::config(format!(
            "cross-section database {filename} not found; tried: {}",
            tried.join(", ")
        )))
    }

    /// Parse database text. Header and `#` comment lines are skipped; the
    /// first row for a (DSID, etag) pair wins.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut entries = HashMap::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("dataset_number") {
                continue;
            }
            let entry = parse_row(line).map_err(|e| {
                CatalogError::parse(format!("xsec database line {}: {e}", index + 1))
            })?;
            entries
                .entry((entry.dataset_number, entry.etag.clone()))
                .or_insert(entry);
        }
        Ok(Self {
            source: None,
            entries,
        })
    }

    /// File the database was read from, if it came from disk.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, dataset_number: u32, etag: &str) -> Option<&XsecEntry> {
        self.entries.get(&(dataset_number, etag.to_string()))
    }

    /// Entry for a dataset name (`<scope>.<dsid>.<name>.<step>.<format>.<tags>`),
    /// keyed by its DSID and evgen tag.
    pub fn lookup(&self, dataset: &str) -> Result<Option<&XsecEntry>> {
        let dataset = crate::catalog::strip_scope_prefix(dataset.trim());
        let fields: Vec<&str> = dataset.split('.').collect();
        if fields.len() < 3 {
            return Err(CatalogError::config(format!(
                "{dataset:?} is not a dataset name"
            )));
        }
        let dsid = fields[1];
        let tags = fields[fields.len() - 1];
        let dataset_number: u32 = dsid.parse().map_err(|e| {
            CatalogError::config_with_source(format!("{dataset:?} has no numeric DSID"), e)
        })?;
        let etag = tags.split('_').next().unwrap_or(tags);
        Ok(self.get(dataset_number, etag))
    }
}

fn parse_row(line: &str) -> std::result::Result<XsecEntry, String> {
    let columns: Vec<&str> = line.split_whitespace().collect();
    let [dsid, short, xsec, eff, kfactor, up, down, generator, etag] = columns.as_slice() else {
        return Err(format!(
            "{} columns, expected {XSEC_COLUMNS}",
            columns.len()
        ));
    };
    let number = |name: &str, value: &str| {
        value
            .parse::<f64>()
            .map_err(|e| format!("bad {name} {value:?}: {e}"))
    };
    Ok(XsecEntry {
        dataset_number: dsid
            .parse()
            .map_err(|e| format!("bad dataset_number {dsid:?}: {e}"))?,
        physics_short: (*short).to_string(),
        cross_section: number("crossSection", *xsec)?,
        gen_filter_eff: number("genFiltEff", *eff)?,
        k_factor: number("kFactor", *kfactor)?,
        rel_uncert_up: number("relUncertUP", *up)?,
        rel_uncert_down: number("relUncertDOWN", *down)?,
        generator_name: (*generator).to_string(),
        etag: (*etag).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scopes::ScopeRegistry;
    use pretty_assertions::assert_eq;

    const DB: &str = "\
dataset_number/I:physics_short/C:crossSection/D:genFiltEff/D:kFactor/D:relUncertUP/D:relUncertDOWN/D:generator_name/C:etag/C
# Top
410470 PhPy8EG_A14_ttbar_hdamp258p75_nonallhad 729.77 0.5438 1.1398 0.056 0.061 Powheg+Pythia8(v.8.230)+EvtGen(v.1.6.0) e6337
410470 PhPy8EG_A14_ttbar_hdamp258p75_nonallhad 730.10 0.5440 1.1390 0.056 0.061 Powheg+Pythia8 e6337
410470 PhPy8EG_A14_ttbar_hdamp258p75_nonallhad 731.00 0.5440 1.1390 0.056 0.061 Powheg+Pythia8 e9999

700320 Sh_2211_Zee_maxHTpTV2_BFilter 2221.2 0.0253 0.9751 0.0 0.0 Sherpa(v.2.2.11) e8351
";

    #[test]
    fn test_parse_and_lookup() {
        let db = XsecDatabase::parse(DB).expect("parse");
        assert_eq!(db.len(), 3);

        let entry = db
            .lookup("mc20_13TeV.410470.PhPy8EG_A14_ttbar_hdamp258p75_nonallhad.deriv.DAOD_PHYS.e6337_s3681_r13144_p5855")
            .expect("lookup")
            .expect("entry");
        assert_eq!(entry.cross_section, 729.77);
        assert_eq!(entry.k_factor, 1.1398);

        let entry = db
            .lookup("mc15_13TeV:mc15_13TeV.700320.Sh_2211_Zee_maxHTpTV2_BFilter.evgen.EVNT.e8351")
            .expect("lookup")
            .expect("entry");
        assert_eq!(entry.gen_filter_eff, 0.0253);
    }

    #[test]
    fn test_lookup_miss_is_none() {
        let db = XsecDatabase::parse(DB).expect("parse");
        assert_eq!(
            db.lookup("mc20_13TeV.410470.x.deriv.DAOD_PHYS.e1234_s3681").expect("lookup"),
            None
        );
        assert!(db.lookup("not-a-dataset").is_err());
        assert!(db.lookup("mc20_13TeV.abc.x.deriv.DAOD_PHYS.e1").is_err());
    }

    #[test]
    fn test_wrong_column_count_is_parse_error() {
        let err = XsecDatabase::parse("410470 ttbar 729.77 0.5438 1.1398 e6337\n").expect_err("short row");
        assert_eq!(err.category(), crate::ErrorCategory::ParseError);
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_database_filename() {
        let registry = ScopeRegistry::default();
        let name = |scope| database_filename(registry.table_for_scope(scope).expect("table"));
        assert_eq!(name("mc16_13TeV"), "PMGxsecDB_mc16.txt");
        assert_eq!(name("mc20_13TeV"), "PMGxsecDB_mc16.txt");
        assert_eq!(name("mc23_13p6TeV"), "PMGxsecDB_mc23.txt");
    }

    #[test]
    fn test_load_uses_first_readable_base_dir() {
        let missing = tempfile::tempdir().expect("tempdir");
        let present = tempfile::tempdir().expect("tempdir");
        let dir = present.path().join("dev/PMGTools");
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join("PMGxsecDB_mc23.txt"), DB).expect("write");

        let cfg = XsecConfig {
            base_dirs: vec![
                missing.path().display().to_string(),
                present.path().display().to_string(),
            ],
            subdir: "dev/PMGTools".to_string(),
        };
        let registry = ScopeRegistry::default();
        let table = registry.table_for_scope("mc23_13p6TeV").expect("table");
        let db = XsecDatabase::load(&cfg, table).expect("load");
        assert_eq!(db.len(), 3);
        assert_eq!(db.source(), Some(dir.join("PMGxsecDB_mc23.txt").as_path()));

        let err = XsecDatabase::load(
            &XsecConfig {
                base_dirs: vec![missing.path().display().to_string()],
                subdir: "dev/PMGTools".to_string(),
            },
            table,
        )
        .expect_err("missing");
        assert_eq!(err.category(), crate::ErrorCategory::ConfigError);
    }
}
