//! JSON input loading.
//!
//! Every command consumes the same two files: a [`LedgerSnapshot`] and a
//! [`ReportDefinition`]. Closings add a routing configuration on top.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};

use finrep_closing::ClosingConfig;
use finrep_engine::ReportDefinition;
use finrep_ledger::{LedgerSnapshot, MemoryLedger};

/// Load a ledger snapshot and index it into a [`MemoryLedger`].
pub fn ledger(path: &Path) -> Result<MemoryLedger> {
    let snapshot: LedgerSnapshot =
        read_json(path).with_context(|| format!("failed to load ledger {}", path.display()))?;
    Ok(MemoryLedger::from_snapshot(snapshot))
}

/// Load a report definition.
pub fn definition(path: &Path) -> Result<ReportDefinition> {
    read_json(path).with_context(|| format!("failed to load report {}", path.display()))
}

/// Load a closing routing configuration.
pub fn closing_config(path: &Path) -> Result<ClosingConfig> {
    read_json(path).with_context(|| format!("failed to load closing config {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("invalid JSON in {}", path.display()))
}
