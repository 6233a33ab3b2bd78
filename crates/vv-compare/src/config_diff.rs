//! Structural diff of two model configuration files.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, warn};
use vv_parser::{ConfigTable, parse_config_file};

use crate::result::{ConfigDiff, ConfigDiffEntry};

/// Diff two configuration files over the union of their sections and keys.
///
/// A file that is missing, or that fails to parse, contributes an empty
/// table, so every entry from the other side shows up as one-sided.
pub fn diff_configurations(model: &Path, bench: &Path) -> ConfigDiff {
    diff_tables(&load_table(model), &load_table(bench))
}

fn load_table(path: &Path) -> ConfigTable {
    if !path.is_file() {
        debug!("Configuration {} not found", path.display());
        return ConfigTable::new();
    }
    match parse_config_file(path) {
        Ok(table) => table,
        Err(e) => {
            warn!("Could not parse configuration {}: {}", path.display(), e);
            ConfigTable::new()
        }
    }
}

/// Diff two parsed tables.
pub fn diff_tables(model: &ConfigTable, bench: &ConfigTable) -> ConfigDiff {
    let sections: BTreeSet<&String> = model.keys().chain(bench.keys()).collect();

    let mut diff = ConfigDiff::new();
    for section in sections {
        let model_vars = model.get(section);
        let bench_vars = bench.get(section);
        let names: BTreeSet<&String> = model_vars
            .into_iter()
            .flat_map(|vars| vars.keys())
            .chain(bench_vars.into_iter().flat_map(|vars| vars.keys()))
            .collect();

        let entries = diff.entry(section.clone()).or_default();
        for name in names {
            let entry = ConfigDiffEntry::new(
                model_vars.and_then(|vars| vars.get(name)).map(String::as_str),
                bench_vars.and_then(|vars| vars.get(name)).map(String::as_str),
            );
            entries.insert(name.clone(), entry);
        }
    }
    diff
}
