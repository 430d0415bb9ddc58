use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lpn_bench::experiment::trial::trial_rng;
use lpn_bench::experiment::{
    summarize, write_summary, write_trials, ExperimentConfig, ExperimentRunner,
};
use lpn_bench::lpn::acceptance::AcceptanceTest;
use lpn_bench::lpn::instance::LpnSample;
use lpn_bench::lpn::params::{LpnParams, SampleRule, Slack};
use lpn_bench::recovery::{MipConfig, Strategy};

#[derive(Parser)]
#[command(name = "lpn-bench")]
#[command(about = "Key recovery benchmarks for Learning Parity with Noise")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an experiment grid and write the results tables
    Run(RunArgs),
    /// Generate one instance and try to recover its key
    Solve(SolveArgs),
    /// Show the sample count and acceptance threshold for a cell
    Params(ParamsArgs),
}

#[derive(Args)]
struct RunArgs {
    /// TOML experiment config; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_delimiter = ',')]
    key_lengths: Option<Vec<usize>>,

    #[arg(long, value_delimiter = ',')]
    noise_rates: Option<Vec<f64>>,

    /// Trials per cell
    #[arg(long)]
    trials: Option<usize>,

    /// Wall-clock budget per strategy per trial
    #[arg(long)]
    budget_secs: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    /// mip, brute-force
    #[arg(long, value_delimiter = ',')]
    strategy: Option<Vec<Strategy>>,

    /// advantage, power or fixed:<m>
    #[arg(long)]
    sample_rule: Option<SampleRule>,

    /// root-nm, none or fixed:<delta>
    #[arg(long)]
    slack: Option<Slack>,

    #[arg(long)]
    threads: Option<usize>,

    /// Per-trial CSV; stdout when absent
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Per-cell summary CSV
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Args)]
struct SolveArgs {
    #[arg(long)]
    n: usize,

    #[arg(long)]
    noise_rate: f64,

    #[arg(long, value_delimiter = ',', default_values_t = [Strategy::Mip, Strategy::BruteForce])]
    strategy: Vec<Strategy>,

    #[arg(long, default_value = "advantage")]
    sample_rule: SampleRule,

    #[arg(long, default_value = "root-nm")]
    slack: Slack,

    #[arg(long, default_value = "10")]
    budget_secs: f64,

    #[arg(long, default_value = "42")]
    seed: u64,

    /// MIP remainder bound is 2 - epsilon, epsilon in (0, 1]
    #[arg(long, default_value = "0.5")]
    remainder_epsilon: f64,
}

impl SolveArgs {
    fn budget(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.budget_secs)
            .ok()
            .filter(|budget| !budget.is_zero())
            .with_context(|| format!("budget must be positive, got {}s", self.budget_secs))
    }

    fn mip_config(&self) -> Result<MipConfig> {
        let config = MipConfig {
            remainder_epsilon: self.remainder_epsilon,
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args)]
struct ParamsArgs {
    #[arg(long)]
    n: usize,

    #[arg(long)]
    noise_rate: f64,

    #[arg(long, default_value = "root-nm")]
    slack: Slack,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Command::Run(args) => run(args),
        Command::Solve(args) => solve(args),
        Command::Params(args) => params(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ExperimentConfig::load(path)?,
        None => ExperimentConfig::default(),
    };
    if let Some(v) = args.key_lengths {
        config.key_lengths = v;
    }
    if let Some(v) = args.noise_rates {
        config.noise_rates = v;
    }
    if let Some(v) = args.trials {
        config.trials = v;
    }
    if let Some(v) = args.budget_secs {
        config.time_budget_secs = v;
    }
    if let Some(v) = args.seed {
        config.seed = v;
    }
    if let Some(v) = args.strategy {
        config.strategies = v;
    }
    if let Some(v) = args.sample_rule {
        config.sample_rule = v;
    }
    if let Some(v) = args.slack {
        config.slack = v;
    }
    if args.threads.is_some() {
        config.threads = args.threads;
    }

    let runner = ExperimentRunner::new(config)?;
    let records = runner.run()?;

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_trials(&records, file)?;
            tracing::info!("wrote {} trial rows to {}", records.len(), path.display());
        }
        None => write_trials(&records, io::stdout().lock())?,
    }

    let summary = summarize(&records);
    for cell in &summary {
        tracing::info!(
            "[{}] n={} p={} m={} tau={}: recovered {}/{} (exact {}, timeouts {}, errors {}), mean {:.1} ms",
            cell.strategy,
            cell.n,
            cell.noise_rate,
            cell.m,
            cell.threshold,
            cell.recovered_count,
            cell.trials,
            cell.exact_count,
            cell.timeouts,
            cell.errors,
            cell.mean_elapsed_ms
        );
    }
    if let Some(path) = &args.summary {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        write_summary(&summary, file)?;
    }
    Ok(())
}

fn solve(args: SolveArgs) -> Result<()> {
    let params = LpnParams::new(args.n, args.noise_rate, args.sample_rule, args.slack)?;
    let budget = args.budget()?;
    let mip = args.mip_config()?;

    let mut rng = trial_rng(args.seed, 0);
    let sample = LpnSample::generate(&params, &mut rng);
    let test = AcceptanceTest::from_params(&params);
    tracing::info!(
        "n={} m={} p={} tau={} secret={} noise weight={}",
        params.n,
        params.m,
        params.noise_rate,
        params.threshold,
        sample.secret,
        sample.noise.weight()
    );

    for strategy in args.strategy {
        let recovery = strategy.build(mip);
        match recovery.recover(&sample.instance, &test, budget) {
            Ok(recovered) => {
                let verdict = test.evaluate(&sample.instance, &recovered.key)?;
                tracing::info!(
                    "[{}] {}: key={} disagreement={} accepted={} exact={}",
                    recovery.name(),
                    recovered.status,
                    recovered.key,
                    verdict.disagreement,
                    verdict.accepted,
                    recovered.key == sample.secret
                );
            }
            Err(e) => tracing::error!("[{}] failed: {e}", recovery.name()),
        }
    }
    Ok(())
}

fn params(args: ParamsArgs) -> Result<()> {
    println!("rule,n,noise_rate,m,slack,threshold,random_key_disagreement");
    for rule in [SampleRule::Advantage, SampleRule::Power] {
        let p = LpnParams::new(args.n, args.noise_rate, rule, args.slack)?;
        println!(
            "{rule},{},{},{},{:.3},{},{:.1}",
            p.n,
            p.noise_rate,
            p.m,
            p.slack,
            p.threshold,
            p.random_key_disagreement()
        );
    }
    Ok(())
}
