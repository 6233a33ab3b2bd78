//! Report persistence.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Serializer;
use serde_json::ser::PrettyFormatter;
use thiserror::Error;
use tracing::info;

use crate::result::ReportTree;
use crate::summary::{GroupSummaries, SummaryIndex};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Serialize `value` as JSON indented by four spaces, newline terminated.
pub fn to_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, ReportError> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, to_json_bytes(value)?)?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Write one suite's report as `{suite_name: tree}`.
pub fn write_report(path: &Path, suite_name: &str, tree: &ReportTree) -> Result<(), ReportError> {
    let document = BTreeMap::from([(suite_name, tree)]);
    write_json(path, &document)
}

/// Write the summary index for a set of suite runs.
pub fn write_summary_index(
    path: &Path,
    suites: BTreeMap<String, GroupSummaries>,
) -> Result<SummaryIndex, ReportError> {
    let index = SummaryIndex::new(suites);
    write_json(path, &index)?;
    Ok(index)
}
