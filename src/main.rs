use anyhow::Result;
use clap::Parser;
use evalset_harness::output::OutputFormat;
use evalset_harness::{
    Config, EvalDataset, EvalError, Harness, LlmPredictor, Predictor, Scorer, builtin, output,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Eval-set harness CLI - normalize evaluation datasets and score every row
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML run configuration file
    run_file: PathBuf,

    /// Output format: plain or json
    #[arg(short, long, default_value = "plain")]
    output: OutputFormat,

    /// Verbose output - show per-row progress
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = Config::from_file(&args.run_file)?;

    let mut reports = Vec::new();
    for run in &config.runs {
        tracing::info!(title = %run.title, data = %run.data, "running evaluation");

        let dataset = EvalDataset::records_from_file(Path::new(&run.data))?;
        let scorers = resolve_scorers(&run.scorers)?;
        let predictor = run
            .predict
            .clone()
            .map(|predict| Arc::new(LlmPredictor::new(predict)) as Arc<dyn Predictor>);

        let harness = Harness::new(run.concurrency);
        let report = harness.evaluate(&dataset, scorers, predictor).await?;

        tracing::debug!(title = %run.title, rows = report.rows.len(), "evaluation finished");
        reports.push(report);
    }

    output::print_reports(&reports, args.output);

    Ok(())
}

/// Resolve configured scorer names against the predefined library
fn resolve_scorers(names: &[String]) -> Result<Vec<Arc<dyn Scorer>>> {
    names
        .iter()
        .map(|name| {
            builtin::by_name(name).ok_or_else(|| {
                EvalError::UnknownScorer {
                    name: name.clone(),
                }
                .into()
            })
        })
        .collect()
}

/// Install the log subscriber; --verbose raises the default level to debug
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
