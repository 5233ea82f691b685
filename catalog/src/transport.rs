//! Catalog transport
//!
//! The catalog is reached by running command-line clients (`centralpage`,
//! `rucio`, `ami`) somewhere that has credentials for them. Everything above
//! this module sees one contract: a textual command goes in, a list of output
//! lines comes out, or the call fails.
//!
//! - `CatalogClient` trait defined here
//! - `ShellCatalogClient` runs the command through a configurable shell
//! - tests script their own clients

use crate::config::TransportConfig;
use crate::errors::{CatalogError, Result};
use std::collections::BTreeMap;
use std::process::Command;

/// One catalog invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogRequest {
    /// Sub-command plus space-delimited arguments
    pub command: String,
    /// Small text payloads staged as files in the working directory
    pub files: BTreeMap<String, String>,
}

impl CatalogRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            files: BTreeMap::new(),
        }
    }

    /// Stage a payload file next to the command
    pub fn with_file(mut self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.insert(name.into(), contents.into());
        self
    }
}

/// Synchronous request/response access to the external catalog.
///
/// Implementations must not retry: failures propagate as
/// [`CatalogError::Transport`] so the cache never stores them.
pub trait CatalogClient: Send + Sync {
    /// Run a command and return its stdout as lines.
    fn execute(&self, request: &CatalogRequest) -> Result<Vec<String>>;
}

impl<T: CatalogClient + ?Sized> CatalogClient for &T {
    fn execute(&self, request: &CatalogRequest) -> Result<Vec<String>> {
        (**self).execute(request)
    }
}

impl<T: CatalogClient + ?Sized> CatalogClient for std::sync::Arc<T> {
    fn execute(&self, request: &CatalogRequest) -> Result<Vec<String>> {
        (**self).execute(request)
    }
}

/// Runs catalog commands as `<shell...> "<preamble> && <command>"`.
#[derive(Debug, Clone)]
pub struct ShellCatalogClient {
    shell: Vec<String>,
    preamble: Option<String>,
}

impl ShellCatalogClient {
    pub fn new(cfg: &TransportConfig) -> Result<Self> {
        if cfg.shell.is_empty() {
            return Err(CatalogError::config("transport.shell must not be empty"));
        }
        Ok(Self {
            shell: cfg.shell.clone(),
            preamble: cfg.preamble.clone().filter(|p| !p.trim().is_empty()),
        })
    }

    fn script(&self, command: &str) -> String {
        match &self.preamble {
            Some(preamble) => format!("{preamble} && {command}"),
            None => command.to_string(),
        }
    }
}

impl CatalogClient for ShellCatalogClient {
    fn execute(&self, request: &CatalogRequest) -> Result<Vec<String>> {
        let workdir = tempfile::Builder::new()
            .prefix("atlas-catalog-")
            .tempdir()
            .map_err(|e| CatalogError::transport_with_source("failed to create work dir", e))?;

        for (name, contents) in &request.files {
            if name.contains('/') || name.contains('\\') || name == ".." {
                return Err(CatalogError::config(format!(
                    "payload file name {name:?} must be a plain file name"
                )));
            }
            std::fs::write(workdir.path().join(name), contents).map_err(|e| {
                CatalogError::transport_with_source(format!("failed to stage {name}"), e)
            })?;
        }

        let (program, args) = self
            .shell
            .split_first()
            .ok_or_else(|| CatalogError::config("transport.shell must not be empty"))?;

        tracing::debug!(command = %request.command, files = request.files.len(), "running catalog command");

        let output = Command::new(program)
            .args(args)
            .arg(self.script(&request.command))
            .current_dir(workdir.path())
            .output()
            .map_err(|e| {
                CatalogError::transport_with_source(format!("failed to execute {program}"), e)
            })?;

        if !output.status.success() {
            return Err(CatalogError::transport(
                format!("`{}` exited with {}", request.command, output.status),
                String::from_utf8_lossy(&output.stderr),
            ));
        }

        Ok(split_lines(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Split raw stdout into lines, dropping `\r` line endings.
pub fn split_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}
