use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use mixforge::criteria::{MixCriteria, RecentHistory};
use mixforge::plan::{self, CancellationToken, PlanError};
use mixforge::track::Track;
use mixforge::{analyzer, config, recipe};

#[derive(Parser)]
#[command(name = "mixforge", version, about = "Deterministic DJ mix planner")]
struct Cli {
    /// Path to the MixCriteria JSON file
    #[arg(long)]
    criteria: PathBuf,

    /// Path to the candidate-pool JSON file (array of Tracks)
    #[arg(long)]
    pool: PathBuf,

    /// Override MixCriteria.seed
    #[arg(long)]
    seed: Option<u64>,

    /// Write the MixPlan JSON here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// Directory for the content-addressed analysis cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Analyzer version stamped into cache keys and reports
    #[arg(long, default_value = mixforge::ANALYZER_VERSION)]
    analyzer_version: String,

    /// Parallel analysis workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let cache_dir = cli.cache_dir.unwrap_or_else(config::default_cache_dir);
    log::info!("Analysis cache: {}", cache_dir.display());
    analyzer::cache::init(cache_dir);

    let criteria_raw = std::fs::read_to_string(&cli.criteria)
        .with_context(|| format!("reading criteria file {}", cli.criteria.display()))?;
    let mut criteria: MixCriteria =
        serde_json::from_str(&criteria_raw).context("parsing MixCriteria JSON")?;
    if let Some(seed) = cli.seed {
        criteria.seed = seed;
    }

    let pool_raw = std::fs::read_to_string(&cli.pool)
        .with_context(|| format!("reading pool file {}", cli.pool.display()))?;
    let pool: Vec<Track> = serde_json::from_str(&pool_raw).context("parsing candidate pool JSON")?;

    let recent_history = RecentHistory::new();
    let cancel = CancellationToken::new();

    let result = plan::plan(&pool, &criteria, &recent_history, &cli.analyzer_version, cli.jobs, &cancel);

    let planned = match result {
        Ok(planned) => planned,
        Err(PlanError::InsufficientPool) => {
            eprintln!("error: no candidate tracks survived selection");
            return Ok(ExitCode::from(3));
        }
        Err(e @ PlanError::ConstraintInconsistent { .. }) => {
            eprintln!("error: {e}");
            return Ok(ExitCode::from(2));
        }
        Err(PlanError::Cancelled) => {
            eprintln!("error: plan cancelled");
            return Ok(ExitCode::from(4));
        }
    };
    let mixforge::plan::PlannedMix { plan: mix_plan, analyses } = planned;

    log::info!(
        "Planned {} tracks, {} transitions, {:.1} min total",
        mix_plan.tracks.len(),
        mix_plan.transitions.len(),
        mix_plan.total_duration / 60.0,
    );

    let spec = recipe::renderer_spec(&mix_plan, &analyses);
    let json = serde_json::to_string_pretty(&spec).context("serializing MixPlan")?;

    match cli.out {
        Some(path) => {
            std::fs::write(&path, &json).with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote mix plan to {}", path.display());
        }
        None => println!("{json}"),
    }

    println!();
    println!("{}", recipe::cue_sheet(&mix_plan, &analyses));

    Ok(ExitCode::SUCCESS)
}
