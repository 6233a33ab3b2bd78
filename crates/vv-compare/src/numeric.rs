//! Bit-for-bit comparison of output datasets.

use std::path::Path;

use ndarray::ArrayD;
use tracing::{debug, warn};
use vv_netcdf::Dataset;

use crate::case::CaseKey;
use crate::plot::{PlotRequest, PlotSink};
use crate::result::{NumericStats, VariableStats};

/// Compares the configured variables of two datasets.
pub struct NumericComparator<'a> {
    variables: &'a [String],
    case_name: &'a str,
    case_key: &'a CaseKey,
    plot: Option<&'a dyn PlotSink>,
}

impl<'a> NumericComparator<'a> {
    pub fn new(variables: &'a [String], case_name: &'a str, case_key: &'a CaseKey) -> Self {
        Self {
            variables,
            case_name,
            case_key,
            plot: None,
        }
    }

    /// Send every mismatching variable to `sink`.
    pub fn with_plot(mut self, sink: &'a dyn PlotSink) -> Self {
        self.plot = Some(sink);
        self
    }

    /// Statistics for each configured variable present in both files.
    ///
    /// Returns an empty map when either file is missing or unreadable, or
    /// when either dataset has no time dimension. Variables missing on one
    /// side are skipped; so are variables whose shapes disagree.
    pub fn compare(&self, model_path: &Path, bench_path: &Path) -> VariableStats {
        let mut stats = VariableStats::new();
        if !(model_path.is_file() && bench_path.is_file()) {
            debug!(
                "Skipping comparison of {} and {}: file missing",
                model_path.display(),
                bench_path.display()
            );
            return stats;
        }

        let (model, bench) = match (Dataset::open(model_path), Dataset::open(bench_path)) {
            (Ok(m), Ok(b)) => (m, b),
            (Err(e), _) => {
                warn!("Could not open dataset {}: {}", model_path.display(), e);
                return stats;
            }
            (_, Err(e)) => {
                warn!("Could not open dataset {}: {}", bench_path.display(), e);
                return stats;
            }
        };
        if !(model.has_time() && bench.has_time()) {
            debug!("{} has no time dimension on both sides", model_path.display());
            return stats;
        }

        let file = model_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        for var in self.variables {
            if !(model.contains(var) && bench.contains(var)) {
                debug!("Variable `{}` not in both copies of {}", var, file);
                continue;
            }
            let (m, b) = match (model.read(var), bench.read(var)) {
                (Ok(m), Ok(b)) => (m, b),
                (Err(e), _) | (_, Err(e)) => {
                    warn!("Skipping `{}` in {}: {}", var, file, e);
                    continue;
                }
            };
            if m.shape() != b.shape() {
                warn!(
                    "Skipping `{}` in {}: model shape {:?} differs from benchmark {:?}",
                    var,
                    file,
                    m.shape(),
                    b.shape()
                );
                continue;
            }

            let diff = &m - &b;
            if diff.iter().all(|&d| d == 0.0) {
                stats.insert(var.clone(), NumericStats::exact());
                continue;
            }

            let (max_error, rms_error) = error_norms(&diff);
            let plot = self.plot.and_then(|sink| {
                sink.plot(&PlotRequest {
                    case_name: self.case_name,
                    case_key: self.case_key,
                    file: &file,
                    variable: var,
                    model: &m,
                    bench: &b,
                    diff: &diff,
                })
            });
            stats.insert(
                var.clone(),
                NumericStats {
                    max_error,
                    rms_error,
                    plot,
                },
            );
        }
        stats
    }
}

/// `(max |d|, sqrt(mean(d²)))` of a difference array. NaN entries make
/// both norms NaN; an empty array has zero norms.
pub fn error_norms(diff: &ArrayD<f64>) -> (f64, f64) {
    if diff.is_empty() {
        return (0.0, 0.0);
    }
    let max = diff.iter().fold(0.0f64, |acc, &d| {
        if acc.is_nan() || d.is_nan() {
            f64::NAN
        } else {
            acc.max(d.abs())
        }
    });
    let sum_sq: f64 = diff.iter().map(|d| d * d).sum();
    (max, (sum_sq / diff.len() as f64).sqrt())
}
