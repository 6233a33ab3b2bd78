//! Typed result tree for one case and for a whole suite.

use std::collections::BTreeMap;

use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};
use vv_parser::{LogRecord, NOT_AVAILABLE};

/// Placeholder for a configuration value present on only one side.
pub const MISSING: &str = "NA";

/// Difference statistics for one variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericStats {
    #[serde(rename = "Max Error")]
    pub max_error: f64,
    #[serde(rename = "RMS Error")]
    pub rms_error: f64,
    /// Reference returned by the plot sink.
    #[serde(rename = "Plot", serialize_with = "plot_or_not_available")]
    pub plot: Option<String>,
}

impl NumericStats {
    pub fn exact() -> Self {
        Self {
            max_error: 0.0,
            rms_error: 0.0,
            plot: None,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.max_error == 0.0
    }
}

fn plot_or_not_available<S: Serializer>(
    plot: &Option<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(plot.as_deref().unwrap_or(NOT_AVAILABLE))
}

/// One `(section, variable)` comparison. Serialized as
/// `[equal, model_value, bench_value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDiffEntry {
    pub equal: bool,
    pub model: String,
    pub bench: String,
}

impl ConfigDiffEntry {
    /// Compare two optional values. Equal only if both are present and
    /// identical; an absent side is recorded as `"NA"`.
    pub fn new(model: Option<&str>, bench: Option<&str>) -> Self {
        let equal = matches!((model, bench), (Some(m), Some(b)) if m == b);
        Self {
            equal,
            model: model.unwrap_or(MISSING).to_string(),
            bench: bench.unwrap_or(MISSING).to_string(),
        }
    }
}

impl Serialize for ConfigDiffEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(&self.equal)?;
        tuple.serialize_element(&self.model)?;
        tuple.serialize_element(&self.bench)?;
        tuple.end()
    }
}

/// `variable -> stats` for one output file.
pub type VariableStats = BTreeMap<String, NumericStats>;

/// `section -> variable -> entry` for one configuration file.
pub type ConfigDiff = BTreeMap<String, BTreeMap<String, ConfigDiffEntry>>;

static NO_STATS: VariableStats = BTreeMap::new();
static NO_DIFF: ConfigDiff = BTreeMap::new();

/// Everything found for one case, keyed by file name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaseResult {
    #[serde(rename = "Output data")]
    pub output_data: BTreeMap<String, VariableStats>,
    #[serde(rename = "Configurations")]
    pub configurations: BTreeMap<String, ConfigDiff>,
    #[serde(rename = "Output Log")]
    pub output_log: BTreeMap<String, LogRecord>,
}

impl CaseResult {
    /// Statistics for an output file; empty if the file was not compared.
    pub fn stats(&self, file: &str) -> &VariableStats {
        self.output_data.get(file).unwrap_or(&NO_STATS)
    }

    pub fn stats_mut(&mut self, file: &str) -> &mut VariableStats {
        self.output_data.entry(file.to_string()).or_default()
    }

    /// Diff for a configuration file; empty if the file was not compared.
    pub fn config_diff(&self, file: &str) -> &ConfigDiff {
        self.configurations.get(file).unwrap_or(&NO_DIFF)
    }

    pub fn config_diff_mut(&mut self, file: &str) -> &mut ConfigDiff {
        self.configurations.entry(file.to_string()).or_default()
    }

    pub fn log(&self, file: &str) -> Option<&LogRecord> {
        self.output_log.get(file)
    }

    pub fn is_empty(&self) -> bool {
        self.output_data.is_empty() && self.configurations.is_empty() && self.output_log.is_empty()
    }
}

/// Case results nested by case-key segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportTree {
    Case(CaseResult),
    Group(BTreeMap<String, ReportTree>),
}

impl Default for ReportTree {
    fn default() -> Self {
        ReportTree::Group(BTreeMap::new())
    }
}

impl ReportTree {
    /// Place `result` at the path given by `segments`. An empty path makes
    /// this node the case itself.
    pub fn insert(&mut self, segments: &[String], result: CaseResult) {
        let Some((first, rest)) = segments.split_first() else {
            *self = ReportTree::Case(result);
            return;
        };
        if matches!(self, ReportTree::Case(_)) {
            *self = ReportTree::default();
        }
        if let ReportTree::Group(children) = self {
            children
                .entry(first.clone())
                .or_default()
                .insert(rest, result);
        }
    }

    pub fn get(&self, segments: &[String]) -> Option<&CaseResult> {
        match (self, segments.split_first()) {
            (ReportTree::Case(result), None) => Some(result),
            (ReportTree::Group(children), Some((first, rest))) => children.get(first)?.get(rest),
            _ => None,
        }
    }

    /// Number of cases in the tree.
    pub fn case_count(&self) -> usize {
        match self {
            ReportTree::Case(_) => 1,
            ReportTree::Group(children) => children.values().map(ReportTree::case_count).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seg(path: &str) -> Vec<String> {
        path.split('/').map(str::to_string).collect()
    }

    #[test]
    fn test_diff_entry_equality() {
        assert!(ConfigDiffEntry::new(Some("1"), Some("1")).equal);
        assert!(!ConfigDiffEntry::new(Some("1"), Some("2")).equal);

        let one_sided = ConfigDiffEntry::new(None, Some("2"));
        assert!(!one_sided.equal);
        assert_eq!(one_sided.model, "NA");
        assert_eq!(one_sided.bench, "2");
    }

    #[test]
    fn test_diff_entry_serializes_as_triple() {
        let entry = ConfigDiffEntry::new(Some("0.5"), None);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!([false, "0.5", "NA"])
        );
    }

    #[test]
    fn test_stats_serialization() {
        let stats = NumericStats {
            max_error: 2.0,
            rms_error: 1.5,
            plot: Some("Verification/dome/thk.png".into()),
        };
        assert_eq!(
            serde_json::to_value(&stats).unwrap(),
            json!({"Max Error": 2.0, "RMS Error": 1.5, "Plot": "Verification/dome/thk.png"})
        );
        assert_eq!(
            serde_json::to_value(NumericStats::exact()).unwrap(),
            json!({"Max Error": 0.0, "RMS Error": 0.0, "Plot": "N/A"})
        );
    }

    #[test]
    fn test_missing_keys_read_as_empty() {
        let mut result = CaseResult::default();
        assert!(result.stats("dome.nc").is_empty());
        assert!(result.config_diff("dome.config").is_empty());
        assert!(result.log("dome.out").is_none());
        assert!(result.is_empty());

        result
            .stats_mut("dome.nc")
            .insert("thk".into(), NumericStats::exact());
        assert_eq!(result.stats("dome.nc").len(), 1);
        // Reading never inserts.
        let _ = result.config_diff("other.config");
        assert!(result.configurations.is_empty());
    }

    #[test]
    fn test_case_result_keys() {
        let value = serde_json::to_value(CaseResult::default()).unwrap();
        assert_eq!(
            value,
            json!({"Output data": {}, "Configurations": {}, "Output Log": {}})
        );
    }

    #[test]
    fn test_report_tree_nesting() {
        let mut tree = ReportTree::default();
        let mut a = CaseResult::default();
        a.stats_mut("a.nc");
        tree.insert(&seg("s1/r2"), a.clone());
        tree.insert(&seg("s1/r4"), CaseResult::default());
        tree.insert(&seg("s2"), CaseResult::default());

        assert_eq!(tree.case_count(), 3);
        assert_eq!(tree.get(&seg("s1/r2")), Some(&a));
        assert!(tree.get(&seg("s1")).is_none());
        assert!(tree.get(&seg("s3")).is_none());

        let value = serde_json::to_value(&tree).unwrap();
        assert!(value["s1"]["r4"]["Output data"].is_object());
        assert!(value["s2"]["Output Log"].is_object());
    }

    #[test]
    fn test_report_tree_root_case() {
        let mut tree = ReportTree::default();
        tree.insert(&[], CaseResult::default());
        assert_eq!(tree.case_count(), 1);
        assert!(tree.get(&[]).is_some());
    }
}
