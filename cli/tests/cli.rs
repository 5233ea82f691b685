//! atlas-catalog CLI integration tests
//!
//! Exit codes:
//! - 0: success
//! - 1: configuration error
//! - 2: any other failure

use std::path::Path;

use anyhow::Result;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::Value as JsonValue;
use tempfile::TempDir;

/// atlas-catalog with an isolated cache directory and no user config
fn catalog_command(home: &Path) -> Result<assert_cmd::Command> {
    let mut cmd = assert_cmd::Command::cargo_bin("atlas-catalog")?;
    cmd.env("ATLAS_CATALOG_CONFIG", home.join("missing-config.toml"));
    cmd.env("ATLAS_MCP_CACHE_DIR", home.join("cache"));
    cmd.env_remove("RUST_LOG");
    Ok(cmd)
}

/// Config whose central page "client" is a shell snippet
fn write_config(home: &Path, centralpage_program: &str) -> Result<std::path::PathBuf> {
    let path = home.join("config.toml");
    let contents = format!(
        "[transport]\nshell = [\"sh\", \"-c\"]\ncentralpage_program = {}\n",
        toml_string(centralpage_program)
    );
    std::fs::write(&path, contents)?;
    Ok(path)
}

fn toml_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn stdout_json(output: &std::process::Output) -> Result<JsonValue> {
    Ok(serde_json::from_slice(&output.stdout)?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Offline commands
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn scopes_json_lists_builtin_scopes() -> Result<()> {
    let home = TempDir::new()?;
    let output = catalog_command(home.path())?
        .args(["scopes", "--json"])
        .output()?;
    assert!(output.status.success());

    let json = stdout_json(&output)?;
    let scopes: Vec<&str> = json
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|s| s["scope"].as_str())
        .collect();
    assert_eq!(scopes, vec!["mc16_13TeV", "mc20_13TeV", "mc23_13p6TeV"]);
    Ok(())
}

#[test]
fn combos_lists_campaign_labels() -> Result<()> {
    let home = TempDir::new()?;
    let output = catalog_command(home.path())?
        .args(["combos", "mc23_13p6TeV", "--json"])
        .output()?;
    assert!(output.status.success());

    let json = stdout_json(&output)?;
    let labels: Vec<&str> = json
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|c| c["label"].as_str())
        .collect();
    assert!(labels.contains(&"mc23a - FS"), "labels: {labels:?}");
    Ok(())
}

#[test]
fn unknown_scope_is_config_error() -> Result<()> {
    let home = TempDir::new()?;
    catalog_command(home.path())?
        .args(["addresses", "mc99_13TeV"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("mc99_13TeV"));
    Ok(())
}

#[test]
fn unsupported_tier_is_config_error() -> Result<()> {
    let home = TempDir::new()?;
    catalog_command(home.path())?
        .args([
            "derived",
            "mc23_13p6TeV",
            "mc23_13p6TeV.601229.PhPy8EG_A14_ttbar_hdamp258p75_SingleLep.evgen.EVNT.e8514",
            "--tier",
            "ESD",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unsupported data tier"));
    Ok(())
}

#[test]
fn missing_search_keywords_is_usage_error() -> Result<()> {
    let home = TempDir::new()?;
    catalog_command(home.path())?
        .args(["search", "mc20_13TeV"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn cache_stats_on_fresh_cache_is_empty() -> Result<()> {
    let home = TempDir::new()?;
    let output = catalog_command(home.path())?
        .args(["cache", "stats", "--json"])
        .output()?;
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)?, serde_json::json!([]));
    Ok(())
}

#[test]
fn cache_clear_rejects_unknown_namespace() -> Result<()> {
    let home = TempDir::new()?;
    catalog_command(home.path())?
        .args(["cache", "clear", "--namespace", "bogus"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown cache namespace"));
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted catalog
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn tags_are_served_from_cache_after_first_call() -> Result<()> {
    let home = TempDir::new()?;
    let config = write_config(home.path(), "echo Top; echo Higgs; true")?;

    catalog_command(home.path())?
        .arg("--config")
        .arg(&config)
        .args(["tags", "mc20_13TeV"])
        .assert()
        .success()
        .stdout("Top\nHiggs\n");

    // The catalog now fails, but the answer is already cached.
    let failing = write_config(home.path(), "exit 3; true")?;
    catalog_command(home.path())?
        .arg("--config")
        .arg(&failing)
        .args(["tags", "mc20_13TeV", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Higgs\""));

    let output = catalog_command(home.path())?
        .args(["cache", "stats", "--json"])
        .output()?;
    let stats = stdout_json(&output)?;
    assert_eq!(stats[0]["namespace"], "hashtag_children");
    assert_eq!(stats[0]["entries"], 1);
    assert_eq!(stats[0]["hits"], 1);
    Ok(())
}

#[test]
fn tags_containing_spaces_are_accepted() -> Result<()> {
    let home = TempDir::new()?;
    let config = write_config(home.path(), "echo 'b Jets'; true")?;

    catalog_command(home.path())?
        .arg("--config")
        .arg(&config)
        .args(["tags", "mc20_13TeV", "Heavy Flavour"])
        .assert()
        .success()
        .stdout("b Jets\n");
    Ok(())
}

#[test]
fn catalog_failure_exits_with_failure_code() -> Result<()> {
    let home = TempDir::new()?;
    let config = write_config(home.path(), "echo 'no valid proxy' >&2; exit 3; true")?;

    catalog_command(home.path())?
        .arg("--config")
        .arg(&config)
        .args(["tags", "mc20_13TeV", "Top"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no valid proxy"));

    // Failures are never cached.
    let output = catalog_command(home.path())?
        .args(["cache", "stats", "--json"])
        .output()?;
    assert_eq!(stdout_json(&output)?, serde_json::json!([]));
    Ok(())
}

#[test]
fn clear_drops_cached_answers() -> Result<()> {
    let home = TempDir::new()?;
    let config = write_config(home.path(), "echo Top; true")?;

    catalog_command(home.path())?
        .arg("--config")
        .arg(&config)
        .args(["tags", "mc23_13p6TeV"])
        .assert()
        .success();

    let output = catalog_command(home.path())?
        .args(["cache", "clear", "--namespace", "hashtag_children", "--json"])
        .output()?;
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)?["removed"], 1);

    let output = catalog_command(home.path())?
        .args(["cache", "stats", "--json"])
        .output()?;
    assert_eq!(stdout_json(&output)?, serde_json::json!([]));
    Ok(())
}
