//! Suite runs: leaf discovery, case scheduling and report assembly.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use tracing::{debug, error, info, warn};
use vv_parser::LogScraper;
use walkdir::WalkDir;

use crate::case::{CaseAnalyzer, CaseKey};
use crate::plot::PngPlotter;
use crate::report::write_report;
use crate::result::{CaseResult, ReportTree};
use crate::settings::{HarnessPaths, RunOptions, SuiteConfig};
use crate::summary::{GroupSummaries, print_summary, summarize};

/// Keys of every directory under `root` that has no subdirectories.
///
/// A missing root has no leaves. A root without subdirectories is its own
/// single leaf with the empty key.
pub fn leaf_dirs(root: &Path) -> Vec<CaseKey> {
    if !root.is_dir() {
        return Vec::new();
    }
    let mut leaves: Vec<CaseKey> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir() && !has_subdir(entry.path()))
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(CaseKey::from_relative)
        })
        .collect();
    leaves.sort();
    leaves
}

fn has_subdir(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|entries| entries.filter_map(Result::ok).any(|e| e.path().is_dir()))
        .unwrap_or(false)
}

/// One case scheduled for analysis.
struct Pairing {
    key: CaseKey,
    model_dir: PathBuf,
    bench_dir: Option<PathBuf>,
}

/// Outcome of one suite run.
#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub name: String,
    /// Counters per case group, in group order.
    pub groups: GroupSummaries,
    pub results: ReportTree,
    /// Where the report was written; `None` if writing failed.
    pub report_path: Option<PathBuf>,
}

/// Runs verification suites against fixed harness paths.
#[derive(Debug, Clone)]
pub struct SuiteRunner {
    paths: HarnessPaths,
    options: RunOptions,
}

impl SuiteRunner {
    pub fn new(paths: HarnessPaths, options: RunOptions) -> Self {
        Self { paths, options }
    }

    pub fn paths(&self) -> &HarnessPaths {
        &self.paths
    }

    /// Analyze every model case of a suite, write the suite report and
    /// print the group summaries.
    ///
    /// Model cases are paired with the benchmark case at the same key when
    /// one exists. A failure to write the report is logged and the
    /// summaries are still returned.
    pub fn run_suite(&self, case_name: &str, config: &SuiteConfig) -> SuiteReport {
        let model_root = self.paths.model_suite_dir(config, case_name);
        let bench_root = self.paths.bench_suite_dir(config, case_name);
        if !model_root.is_dir() {
            warn!("Model directory {} not found", model_root.display());
        }

        let bench_keys: BTreeSet<CaseKey> = leaf_dirs(&bench_root).into_iter().collect();
        let cases: Vec<Pairing> = leaf_dirs(&model_root)
            .into_iter()
            .map(|key| {
                let model_dir = model_root.join(key.to_path());
                let bench_dir = bench_keys
                    .contains(&key)
                    .then(|| bench_root.join(key.to_path()));
                Pairing {
                    key,
                    model_dir,
                    bench_dir,
                }
            })
            .collect();
        info!("Suite `{}`: {} cases", case_name, cases.len());

        let scraper = LogScraper::with_fields(config.log_fields.clone());
        let plotter = PngPlotter::new(&self.paths.output_root);
        let mut analyzer = CaseAnalyzer::new(case_name, config, &scraper);
        if self.options.plot {
            analyzer = analyzer.with_plot(&plotter);
        }

        let mut results = self.analyze_all(&analyzer, &cases);
        results.sort_by(|a, b| a.0.cmp(&b.0));

        let mut groups = GroupSummaries::new();
        let mut tree = ReportTree::default();
        for (key, result) in results {
            let group = key.group().unwrap_or(case_name).to_string();
            summarize(&result, groups.entry(group).or_default());
            tree.insert(key.segments(), result);
        }

        let path = self.paths.report_path(case_name);
        let report_path = match write_report(&path, case_name, &tree) {
            Ok(()) => Some(path),
            Err(e) => {
                error!("Could not write report {}: {}", path.display(), e);
                None
            }
        };
        print_summary(case_name, &groups);

        SuiteReport {
            name: case_name.to_string(),
            groups,
            results: tree,
            report_path,
        }
    }

    /// Analyze cases on up to `jobs` threads. Results arrive in completion
    /// order.
    fn analyze_all(
        &self,
        analyzer: &CaseAnalyzer<'_>,
        cases: &[Pairing],
    ) -> Vec<(CaseKey, CaseResult)> {
        let analyze = |case: &Pairing| {
            debug!("Analyzing case {}", case.key);
            let result = analyzer.analyze(&case.key, &case.model_dir, case.bench_dir.as_deref());
            (case.key.clone(), result)
        };

        let workers = self.options.jobs.min(cases.len());
        if workers <= 1 {
            return cases.iter().map(analyze).collect();
        }

        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel();
        thread::scope(|s| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                let analyze = &analyze;
                s.spawn(move || {
                    loop {
                        let idx = next.fetch_add(1, Ordering::Relaxed);
                        let Some(case) = cases.get(idx) else {
                            break;
                        };
                        if tx.send(analyze(case)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);
            rx.iter().collect()
        })
    }
}

/// A runnable verification test.
pub trait VerificationTest {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn run(&self, runner: &SuiteRunner) -> SuiteReport;
}

/// A suite defined in the suite file.
#[derive(Debug, Clone)]
pub struct ConfiguredSuite {
    config: SuiteConfig,
}

impl ConfiguredSuite {
    pub fn new(config: SuiteConfig) -> Self {
        Self { config }
    }

    /// One test per suite definition, in name order.
    pub fn from_configs(configs: BTreeMap<String, SuiteConfig>) -> Vec<Self> {
        configs.into_values().map(Self::new).collect()
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }
}

impl VerificationTest for ConfiguredSuite {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn description(&self) -> &str {
        self.config.description.as_deref().unwrap_or("")
    }

    fn run(&self, runner: &SuiteRunner) -> SuiteReport {
        runner.run_suite(&self.config.name, &self.config)
    }
}
