//! Verification comparison engine.
//!
//! Walks paired model/benchmark case trees, matches output, configuration
//! and log files by name, and folds the per-case results into a JSON report
//! plus pass/fail counters per case group.

pub mod case;
pub mod config_diff;
pub mod numeric;
pub mod plot;
pub mod report;
pub mod result;
pub mod settings;
pub mod suite;
pub mod summary;

pub use case::{CaseAnalyzer, CaseKey};
pub use config_diff::{diff_configurations, diff_tables};
pub use numeric::{NumericComparator, error_norms};
pub use plot::{PlotRequest, PlotSink, PngPlotter};
pub use report::{ReportError, write_report, write_summary_index};
pub use result::{CaseResult, ConfigDiff, ConfigDiffEntry, NumericStats, ReportTree, VariableStats};
pub use settings::{HarnessPaths, RunOptions, SettingsError, SuiteConfig, load_suite_configs};
pub use suite::{ConfiguredSuite, SuiteReport, SuiteRunner, VerificationTest, leaf_dirs};
pub use summary::{CaseSummary, GroupSummaries, SummaryIndex, summarize};
