//! Analysis of one model/benchmark case directory pair.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use vv_parser::LogScraper;

use crate::config_diff::diff_configurations;
use crate::numeric::NumericComparator;
use crate::plot::PlotSink;
use crate::result::CaseResult;
use crate::settings::SuiteConfig;

/// Path of a leaf case directory relative to its suite root.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaseKey(Vec<String>);

impl CaseKey {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Key for a directory path relative to the suite root.
    pub fn from_relative(path: &Path) -> Self {
        Self(
            path.components()
                .filter_map(|c| match c {
                    Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// True for the suite root itself.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// First segment, used to group case summaries.
    pub fn group(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn to_path(&self) -> PathBuf {
        self.0.iter().collect()
    }
}

impl fmt::Display for CaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// Runs the configuration, output and log checks for single cases.
pub struct CaseAnalyzer<'a> {
    case_name: &'a str,
    config: &'a SuiteConfig,
    scraper: &'a LogScraper,
    plot: Option<&'a dyn PlotSink>,
}

impl<'a> CaseAnalyzer<'a> {
    pub fn new(case_name: &'a str, config: &'a SuiteConfig, scraper: &'a LogScraper) -> Self {
        Self {
            case_name,
            config,
            scraper,
            plot: None,
        }
    }

    pub fn with_plot(mut self, sink: &'a dyn PlotSink) -> Self {
        self.plot = Some(sink);
        self
    }

    /// Compare the files common to both directories and scrape every
    /// model-side log. Without a benchmark directory only the logs are
    /// reported.
    pub fn analyze(&self, key: &CaseKey, model_dir: &Path, bench_dir: Option<&Path>) -> CaseResult {
        let mut result = CaseResult::default();
        let cfg = self.config;

        let model_outputs = files_with_suffix(model_dir, &cfg.output_ext);
        let model_configs = files_with_suffix(model_dir, &cfg.config_ext);
        let model_logs = files_with_suffix(model_dir, &cfg.logfile_ext);

        if let Some(bench_dir) = bench_dir {
            let bench_outputs = files_with_suffix(bench_dir, &cfg.output_ext);
            let bench_configs = files_with_suffix(bench_dir, &cfg.config_ext);

            let mut comparator = NumericComparator::new(&cfg.bit_for_bit_vars, self.case_name, key);
            if let Some(sink) = self.plot {
                comparator = comparator.with_plot(sink);
            }
            for file in model_outputs.intersection(&bench_outputs) {
                let stats = comparator.compare(&model_dir.join(file), &bench_dir.join(file));
                result.output_data.insert(file.clone(), stats);
            }
            for file in model_configs.intersection(&bench_configs) {
                let diff = diff_configurations(&model_dir.join(file), &bench_dir.join(file));
                result.configurations.insert(file.clone(), diff);
            }
        } else {
            debug!("Case {} has no benchmark directory", key);
        }

        for file in &model_logs {
            let record = self.scraper.scrape(model_dir.join(file));
            result.output_log.insert(file.clone(), record);
        }
        result
    }
}

/// Names of regular, non-hidden files directly inside `dir` that end in
/// `suffix`.
fn files_with_suffix(dir: &Path, suffix: &str) -> BTreeSet<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {}: {}", dir.display(), e);
            return BTreeSet::new();
        }
    };
    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.') && name.ends_with(suffix))
        .collect()
}
