//! Ice-sheet model verification
//!
//! Compares a model run tree against a benchmark tree for every configured
//! suite and writes JSON reports under the output directory.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vv_compare::{
    ConfiguredSuite, GroupSummaries, HarnessPaths, RunOptions, SuiteRunner, VerificationTest,
    load_suite_configs, write_summary_index,
};

/// Verify model output against benchmark runs
#[derive(Parser, Debug)]
#[command(name = "vv")]
#[command(author, version, about = "Bit-for-bit verification of ice-sheet model runs", long_about = None)]
struct Args {
    /// Root of the model run tree
    #[arg(short = 'm', long = "model-dir")]
    model_dir: Option<PathBuf>,

    /// Root of the benchmark run tree
    #[arg(short = 'b', long = "bench-dir")]
    bench_dir: Option<PathBuf>,

    /// Directory receiving reports and plots
    #[arg(short = 'o', long = "out-dir", default_value = "vv_output")]
    out_dir: PathBuf,

    /// Suite definition file (JSON object keyed by suite name)
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Run only these suites (repeatable)
    #[arg(long = "case")]
    cases: Vec<String>,

    /// Worker threads per suite
    #[arg(short = 'j', long = "jobs", default_value_t = 1)]
    jobs: usize,

    /// Skip difference plots
    #[arg(long = "no-plot")]
    no_plot: bool,

    /// List configured suites and exit
    #[arg(short = 'l', long = "list")]
    list: bool,

    /// More log output (repeat for more)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let configs = load_suite_configs(&args.config)
        .with_context(|| format!("loading suites from {}", args.config.display()))?;

    if args.list {
        for (name, suite) in &configs {
            match &suite.description {
                Some(desc) => println!("{:<20} {}", name, desc),
                None => println!("{}", name),
            }
        }
        return Ok(());
    }

    for name in &args.cases {
        if !configs.contains_key(name) {
            bail!("unknown suite `{}` (see --list)", name);
        }
    }
    let selected: BTreeMap<_, _> = configs
        .into_iter()
        .filter(|(name, _)| args.cases.is_empty() || args.cases.contains(name))
        .collect();

    let (Some(model_dir), Some(bench_dir)) = (args.model_dir, args.bench_dir) else {
        bail!("--model-dir and --bench-dir are required to run suites");
    };
    let paths = HarnessPaths::new(model_dir, bench_dir, &args.out_dir);
    let options = RunOptions {
        plot: !args.no_plot,
        jobs: args.jobs.max(1),
    };
    let runner = SuiteRunner::new(paths, options);

    println!("Beginning verification test suite...");
    let mut summaries: BTreeMap<String, GroupSummaries> = BTreeMap::new();
    for test in ConfiguredSuite::from_configs(selected) {
        info!("Running {}", test.name());
        let report = test.run(&runner);
        summaries.insert(report.name, report.groups);
    }

    let index_path = runner.paths().summary_index_path();
    write_summary_index(&index_path, summaries)
        .with_context(|| format!("writing {}", index_path.display()))?;
    println!("Verification reports written to {}", args.out_dir.display());
    Ok(())
}
