//! Run log scraping.
//!
//! Solver logs are free-form text written by the model's standard output.
//! There is no grammar to rely on, so the scraper looks for a handful of
//! known markers in a single forward pass and ignores every other line.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Serialize, Serializer};
use serde_json::Value;
use strum::{Display, FromRepr};
use tracing::{debug, error};

/// Placeholder for a field the log never provided.
pub const NOT_AVAILABLE: &str = "N/A";

/// Placeholder for an unknown dycore.
pub const DYCORE_UNAVAILABLE: &str = "Unavailable";

const DYCORE_MARKER: &str = "CISM dycore type";
const PROCS_MARKER: &str = "total procs";
const SOLVER_STEP_MARKER: &str = "Nonlinear Solver Step";
const CONVERGED_STATUS_MARKER: &str = "\"SOLVE_STATUS_CONVERGED\"";
const STEP_CONVERGED_MARKER: &str = "Converged!";
const STEP_FAILED_MARKER: &str = "Failed!";

/// Whitespace token holding the step index on a solver step line.
const SOLVER_STEP_TOKEN: usize = 4;

/// Field names of the fixed record template, as they appear in reports.
pub const TEMPLATE_FIELDS: [&str; 5] = [
    "Dycore Type",
    "Number of processors",
    "Number of timesteps",
    "Average iterations to converge",
    "Converged Iterations",
];

/// Dynamical core variants, identified in logs by a small integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum Dycore {
    Glide = 0,
    Glam = 1,
    Glissade = 2,
    AlbanyFelix = 3,
    #[strum(to_string = "BISICLES")]
    Bisicles = 4,
}

impl Dycore {
    /// Map a log code token ("0".."4") to its dycore.
    pub fn from_code(code: &str) -> Option<Self> {
        code.trim().parse::<u8>().ok().and_then(Self::from_repr)
    }
}

/// Metadata scraped from one run log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    #[serde(rename = "Dycore Type", serialize_with = "dycore_or_unavailable")]
    pub dycore: Option<Dycore>,
    /// Sum of all `total procs` counts.
    #[serde(rename = "Number of processors")]
    pub processors: u64,
    /// Last nonlinear solver step seen.
    #[serde(rename = "Number of timesteps")]
    pub timesteps: i64,
    #[serde(
        rename = "Average iterations to converge",
        serialize_with = "number_or_not_available"
    )]
    pub avg_iterations_to_converge: Option<f64>,
    /// Step indices in log order: positive if the step converged,
    /// negated if it failed.
    #[serde(rename = "Converged Iterations")]
    pub converged_iterations: Vec<i64>,
    /// Caller-predefined fields carried through unchanged.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn dycore_or_unavailable<S: Serializer>(
    dycore: &Option<Dycore>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match dycore {
        Some(d) => serializer.collect_str(d),
        None => serializer.serialize_str(DYCORE_UNAVAILABLE),
    }
}

fn number_or_not_available<S: Serializer>(
    value: &Option<f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_f64(*v),
        None => serializer.serialize_str(NOT_AVAILABLE),
    }
}

/// Scrapes run logs into [`LogRecord`]s.
#[derive(Debug, Clone, Default)]
pub struct LogScraper {
    predefined: BTreeMap<String, Value>,
}

impl LogScraper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scraper whose records carry extra caller-defined fields.
    ///
    /// Names that collide with the fixed template are dropped. Null values
    /// are reported as `"N/A"`.
    pub fn with_fields(fields: BTreeMap<String, Value>) -> Self {
        let predefined = fields
            .into_iter()
            .filter(|(name, _)| {
                let reserved = TEMPLATE_FIELDS.contains(&name.as_str());
                if reserved {
                    debug!("Ignoring predefined log field `{}`: reserved name", name);
                }
                !reserved
            })
            .map(|(name, value)| match value {
                Value::Null => (name, Value::String(NOT_AVAILABLE.to_string())),
                other => (name, other),
            })
            .collect();
        Self { predefined }
    }

    /// The record returned when nothing could be scraped.
    pub fn template(&self) -> LogRecord {
        LogRecord {
            dycore: None,
            processors: 0,
            timesteps: 0,
            avg_iterations_to_converge: None,
            converged_iterations: Vec::new(),
            extra: self.predefined.clone(),
        }
    }

    /// Scrape a log file. An unreadable file is reported and yields the
    /// default template.
    pub fn scrape(&self, path: impl AsRef<Path>) -> LogRecord {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => self.scrape_reader(BufReader::new(file)),
            Err(e) => {
                error!("Could not read {}: {}", path.display(), e);
                self.template()
            }
        }
    }

    /// Scrape log text from any buffered reader.
    pub fn scrape_reader<R: BufRead>(&self, reader: R) -> LogRecord {
        let mut record = self.template();
        let mut current_step: i64 = 0;
        let mut iteration_counts: Vec<i64> = Vec::new();

        let mut lines = reader
            .split(b'\n')
            .map_while(Result::ok)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());

        while let Some(line) = lines.next() {
            let tokens: Vec<&str> = line.split_whitespace().collect();

            if line.contains(DYCORE_MARKER) {
                let code = match tokens.last() {
                    Some(&"=") => lines.next(),
                    Some(last) => Some(last.to_string()),
                    None => None,
                };
                match code.as_deref().and_then(Dycore::from_code) {
                    Some(dycore) => record.dycore = Some(dycore),
                    None => debug!("Unrecognized dycore code {:?}", code),
                }
            }

            if line.contains(PROCS_MARKER)
                && let Some(procs) = tokens.last().and_then(|t| t.parse::<u64>().ok())
            {
                record.processors += procs;
            }

            if line.contains(SOLVER_STEP_MARKER)
                && let Some(step) = tokens
                    .get(SOLVER_STEP_TOKEN)
                    .and_then(|t| t.parse::<i64>().ok())
            {
                current_step = step;
            }

            if line.contains(CONVERGED_STATUS_MARKER)
                && let Some(count) = tokens
                    .iter()
                    .position(|t| *t == CONVERGED_STATUS_MARKER)
                    .and_then(|pos| tokens.get(pos + 2))
                    .and_then(|t| t.parse::<i64>().ok())
            {
                iteration_counts.push(count);
            }

            if line.contains(STEP_CONVERGED_MARKER) {
                record.converged_iterations.push(current_step);
            }
            if line.contains(STEP_FAILED_MARKER) {
                record.converged_iterations.push(-current_step);
            }
        }

        record.timesteps = current_step;
        if !iteration_counts.is_empty() {
            let total: i64 = iteration_counts.iter().sum();
            record.avg_iterations_to_converge = Some(total as f64 / iteration_counts.len() as f64);
        }
        record
    }
}
