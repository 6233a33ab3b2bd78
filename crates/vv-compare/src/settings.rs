//! Harness configuration: suite definitions, directory roots, run options.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Directory under the output root holding reports and plots.
pub const VERIFICATION_DIR: &str = "Verification";

/// File name of the cross-suite summary index.
pub const SUMMARY_INDEX: &str = "verification_summary.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid suite file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Suite `{suite}`: {reason}")]
    Invalid { suite: String, reason: String },
}

/// One verification suite as defined in the suite file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Filled from the suite's key when loaded from a suite file.
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Path fragment joined onto the model and benchmark roots.
    pub data_dir: String,
    pub config_ext: String,
    pub logfile_ext: String,
    pub output_ext: String,
    /// Variables compared bit for bit, in report order.
    #[serde(default)]
    pub bit_for_bit_vars: Vec<String>,
    /// Extra fields carried into every scraped log record.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub log_fields: BTreeMap<String, Value>,
}

impl SuiteConfig {
    /// Check that the suite can be run.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |reason: &str| SettingsError::Invalid {
            suite: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if self.data_dir.trim().is_empty() {
            return Err(invalid("data_dir is empty"));
        }
        for (field, ext) in [
            ("config_ext", &self.config_ext),
            ("logfile_ext", &self.logfile_ext),
            ("output_ext", &self.output_ext),
        ] {
            if ext.is_empty() {
                return Err(invalid(&format!("{} is empty", field)));
            }
        }
        if self.bit_for_bit_vars.is_empty() {
            warn!(
                "Suite `{}` lists no bit-for-bit variables; output files will have no statistics",
                self.name
            );
        }
        Ok(())
    }
}

/// Load and validate every suite in a JSON object keyed by suite name.
pub fn load_suite_configs(
    path: impl AsRef<Path>,
) -> Result<BTreeMap<String, SuiteConfig>, SettingsError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let mut suites: BTreeMap<String, SuiteConfig> = serde_json::from_str(&text)?;
    for (name, suite) in suites.iter_mut() {
        suite.name = name.clone();
        suite.validate()?;
    }
    debug!("Loaded {} suites from {}", suites.len(), path.display());
    Ok(suites)
}

/// Root directories the harness reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessPaths {
    pub model_root: PathBuf,
    pub bench_root: PathBuf,
    pub output_root: PathBuf,
}

impl HarnessPaths {
    pub fn new(
        model_root: impl Into<PathBuf>,
        bench_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            model_root: model_root.into(),
            bench_root: bench_root.into(),
            output_root: output_root.into(),
        }
    }

    /// `<model_root>/<data_dir>/<case_name>`
    pub fn model_suite_dir(&self, config: &SuiteConfig, case_name: &str) -> PathBuf {
        self.model_root.join(&config.data_dir).join(case_name)
    }

    /// `<bench_root>/<data_dir>/<case_name>`
    pub fn bench_suite_dir(&self, config: &SuiteConfig, case_name: &str) -> PathBuf {
        self.bench_root.join(&config.data_dir).join(case_name)
    }

    pub fn verification_dir(&self) -> PathBuf {
        self.output_root.join(VERIFICATION_DIR)
    }

    /// Where the report for one suite run is written.
    pub fn report_path(&self, case_name: &str) -> PathBuf {
        self.verification_dir().join(format!("{}.json", case_name))
    }

    pub fn summary_index_path(&self) -> PathBuf {
        self.output_root.join(SUMMARY_INDEX)
    }
}

/// Per-run switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Render difference plots for mismatching variables.
    pub plot: bool,
    /// Worker threads used to analyze cases.
    pub jobs: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            plot: true,
            jobs: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite_json() -> &'static str {
        r#"{
            "dome": {
                "description": "Dome verification tests",
                "data_dir": "higher-order/dome",
                "config_ext": ".config",
                "logfile_ext": ".out",
                "output_ext": ".nc",
                "bit_for_bit_vars": ["thk", "velnorm"],
                "log_fields": {"Solver": null}
            },
            "ismip-hom": {
                "data_dir": "higher-order/ismip-hom",
                "config_ext": ".config",
                "logfile_ext": ".out",
                "output_ext": ".nc"
            }
        }"#
    }

    #[test]
    fn test_load_sets_names_from_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suites.json");
        fs::write(&path, suite_json()).unwrap();

        let suites = load_suite_configs(&path).unwrap();
        assert_eq!(suites.len(), 2);
        let dome = &suites["dome"];
        assert_eq!(dome.name, "dome");
        assert_eq!(dome.description.as_deref(), Some("Dome verification tests"));
        assert_eq!(dome.bit_for_bit_vars, vec!["thk", "velnorm"]);
        assert_eq!(dome.log_fields["Solver"], Value::Null);

        let ismip = &suites["ismip-hom"];
        assert!(ismip.bit_for_bit_vars.is_empty());
        assert!(ismip.description.is_none());
    }

    #[test]
    fn test_empty_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suites.json");
        fs::write(
            &path,
            r#"{"dome": {"data_dir": "d", "config_ext": "", "logfile_ext": ".out", "output_ext": ".nc"}}"#,
        )
        .unwrap();

        match load_suite_configs(&path) {
            Err(SettingsError::Invalid { suite, reason }) => {
                assert_eq!(suite, "dome");
                assert!(reason.contains("config_ext"));
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_field_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suites.json");
        fs::write(&path, r#"{"dome": {"data_dir": "d"}}"#).unwrap();
        assert!(matches!(load_suite_configs(&path), Err(SettingsError::Json(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_suite_configs(dir.path().join("absent.json")),
            Err(SettingsError::Io(_))
        ));
    }

    #[test]
    fn test_paths() {
        let paths = HarnessPaths::new("/model", "/bench", "/out");
        let config: SuiteConfig = serde_json::from_str(
            r#"{"data_dir": "higher-order/dome", "config_ext": ".config", "logfile_ext": ".out", "output_ext": ".nc"}"#,
        )
        .unwrap();

        assert_eq!(
            paths.model_suite_dir(&config, "dome"),
            PathBuf::from("/model/higher-order/dome/dome")
        );
        assert_eq!(
            paths.bench_suite_dir(&config, "dome"),
            PathBuf::from("/bench/higher-order/dome/dome")
        );
        assert_eq!(
            paths.report_path("dome"),
            PathBuf::from("/out/Verification/dome.json")
        );
        assert_eq!(
            paths.summary_index_path(),
            PathBuf::from("/out/verification_summary.json")
        );
    }
}
