//! Pass/fail counters folded from case results.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::result::CaseResult;

/// Counters for one case group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSummary {
    /// `(files with an exact variable, output files compared)`
    #[serde(rename = "Bit for Bit")]
    pub bit_for_bit: (u64, u64),
    /// `(files without a mismatch, configuration files compared)`
    #[serde(rename = "Configurations")]
    pub configurations: (u64, u64),
    #[serde(rename = "Std. Out Files")]
    pub std_out_files: u64,
}

impl CaseSummary {
    /// Add another summary's counters to this one.
    pub fn merge(&mut self, other: &CaseSummary) {
        self.bit_for_bit.0 += other.bit_for_bit.0;
        self.bit_for_bit.1 += other.bit_for_bit.1;
        self.configurations.0 += other.configurations.0;
        self.configurations.1 += other.configurations.1;
        self.std_out_files += other.std_out_files;
    }
}

/// Summaries of one suite keyed by case group.
pub type GroupSummaries = BTreeMap<String, CaseSummary>;

/// Fold one case result into a running summary.
///
/// An output file counts as bit for bit when at least one of its variables
/// matched exactly. A configuration file counts as matching only when none
/// of its entries differ.
pub fn summarize(result: &CaseResult, summary: &mut CaseSummary) {
    let files = result.output_data.len() as u64;
    let exact = result
        .output_data
        .values()
        .filter(|vars| vars.values().any(|stats| stats.is_exact()))
        .count() as u64;
    summary.bit_for_bit.0 += exact;
    summary.bit_for_bit.1 += files;

    let configs = result.configurations.len() as u64;
    let mismatched = result
        .configurations
        .values()
        .filter(|sections| {
            sections
                .values()
                .any(|vars| vars.values().any(|entry| !entry.equal))
        })
        .count() as u64;
    summary.configurations.0 += configs - mismatched;
    summary.configurations.1 += configs;

    summary.std_out_files += result.output_log.len() as u64;
}

/// Human-readable block for each group of a suite.
pub fn format_summary(suite: &str, groups: &GroupSummaries) -> String {
    let mut out = String::new();
    for (group, data) in groups {
        let _ = writeln!(out, "    {} {}", suite, group);
        let _ = writeln!(out, "    --------------------");
        let _ = writeln!(
            out,
            "     Bit for bit matches   : {} of {}",
            data.bit_for_bit.0, data.bit_for_bit.1
        );
        let _ = writeln!(
            out,
            "     Configuration matches : {} of {}",
            data.configurations.0, data.configurations.1
        );
        let _ = writeln!(out, "     Std. Out files parsed : {}", data.std_out_files);
        let _ = writeln!(out);
    }
    out
}

/// Print the per-group summary to stdout.
pub fn print_summary(suite: &str, groups: &GroupSummaries) {
    print!("{}", format_summary(suite, groups));
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetadata {
    #[serde(rename = "Format")]
    pub format: &'static str,
    #[serde(rename = "Type")]
    pub kind: &'static str,
    #[serde(rename = "Headers")]
    pub headers: [&'static str; 3],
}

impl Default for SummaryMetadata {
    fn default() -> Self {
        Self {
            format: "Summary",
            kind: "Verification",
            headers: ["Bit for Bit", "Configurations", "Std. Out Files"],
        }
    }
}

/// Index of every suite's group summaries for one harness run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryIndex {
    #[serde(rename = "Metadata")]
    pub metadata: SummaryMetadata,
    /// RFC 3339 UTC time the index was built.
    #[serde(rename = "Generated")]
    pub generated: String,
    #[serde(rename = "Data")]
    pub suites: BTreeMap<String, GroupSummaries>,
}

impl SummaryIndex {
    pub fn new(suites: BTreeMap<String, GroupSummaries>) -> Self {
        Self {
            metadata: SummaryMetadata::default(),
            generated: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            suites,
        }
    }
}
