//! Checkpoint Simulation Engine CLI
//!
//! Sweeps the true MTTF and reports how much each checkpoint strategy
//! stretches job completion times.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use checkpoint_core::ResultSink;
use checkpoint_simulation_engine::{
    ExperimentConfig, StrategyKind,
    config::DEFAULT_MTTF_SWEEP_HOURS,
    output::{CsvSink, JsonSink},
    run_sweep,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Young,
    Additive,
    Multiplicative,
}

#[derive(Parser, Debug)]
#[command(name = "ckpt-sim")]
#[command(about = "Compare checkpoint-interval strategies under random job failures", long_about = None)]
struct Args {
    /// Checkpoint strategy
    #[arg(short, long, value_enum, default_value_t = StrategyArg::Young)]
    strategy: StrategyArg,

    /// Smoothing constant of the additive strategy, in (0, 1]
    #[arg(long, default_value_t = checkpoint_simulation_engine::checkpoint::DEFAULT_ADDITIVE_N)]
    additive_n: f64,

    /// Growth base of the multiplicative strategy, > 1
    #[arg(long, default_value_t = checkpoint_simulation_engine::checkpoint::DEFAULT_MULTIPLICATIVE_A)]
    multiplicative_a: f64,

    /// True MTTF values to sweep, in hours (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    mttf_hours: Vec<u64>,

    /// MTTF handed to the strategies (default: the true MTTF of each run)
    #[arg(long)]
    apriori_mttf_hours: Option<f64>,

    /// Mean checkpoint grace period, in minutes
    #[arg(long, default_value_t = 5.0)]
    delta_minutes: f64,

    /// Mean restart delay after a failure, in minutes
    #[arg(long, default_value_t = 5.0)]
    restart_minutes: f64,

    /// Number of jobs
    #[arg(short, long, default_value_t = 500)]
    jobs: usize,

    /// Mean job length, in hours
    #[arg(long, default_value_t = 1_000.0)]
    job_length_hours: f64,

    /// Random seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Simulated time budget per run, in hours (default: 20 mean job lengths)
    #[arg(long)]
    horizon_hours: Option<f64>,

    /// JSON experiment configuration; replaces the parameter flags above
    #[arg(short, long)]
    config: Option<String>,

    /// Output CSV file path (optional)
    #[arg(short, long)]
    output: Option<String>,

    /// Output JSON file path (optional)
    #[arg(long)]
    json: Option<String>,
}

impl Args {
    fn experiment(&self) -> Result<ExperimentConfig> {
        if let Some(path) = &self.config {
            return ExperimentConfig::from_json_file(path)
                .with_context(|| format!("Failed to load configuration from {path}"));
        }

        let strategy = match self.strategy {
            StrategyArg::Young => StrategyKind::Young,
            StrategyArg::Additive => StrategyKind::Additive { n: self.additive_n },
            StrategyArg::Multiplicative => StrategyKind::Multiplicative { a: self.multiplicative_a },
        };
        let config = ExperimentConfig {
            strategy,
            apriori_mttf_hours: self.apriori_mttf_hours,
            delta_minutes: self.delta_minutes,
            restart_delay_minutes: self.restart_minutes,
            job_count: self.jobs,
            mean_job_length_hours: self.job_length_hours,
            seed: self.seed,
            horizon_hours: self.horizon_hours,
            ..ExperimentConfig::default()
        };
        config.validate().context("Invalid experiment parameters")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = args.experiment()?;
    let sweep: Vec<u64> = if args.mttf_hours.is_empty() {
        DEFAULT_MTTF_SWEEP_HOURS.to_vec()
    } else {
        args.mttf_hours.clone()
    };

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  Checkpoint Simulation Engine                            ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    println!("Configuration:");
    println!("  Strategy: {:?}", config.strategy);
    println!("  Jobs: {}", config.job_count);
    println!("  Job length (mean): {} hours", config.mean_job_length_hours);
    println!("  Delta (mean): {} minutes", config.delta_minutes);
    println!("  Restart delay (mean): {} minutes", config.restart_delay_minutes);
    match config.apriori_mttf_hours {
        Some(hours) => println!("  A-priori MTTF: {hours} hours"),
        None => println!("  A-priori MTTF: true MTTF"),
    }
    println!("  MTTF sweep: {} runs\n", sweep.len());

    let description = config.describe();
    let mut csv = match &args.output {
        Some(path) => Some(
            CsvSink::create(path, &description)
                .with_context(|| format!("Failed to create CSV output {path}"))?,
        ),
        None => None,
    };
    let mut json = args.json.as_ref().map(JsonSink::new);

    let mut sinks: Vec<&mut dyn ResultSink> = Vec::new();
    if let Some(sink) = csv.as_mut() {
        sinks.push(sink);
    }
    if let Some(sink) = json.as_mut() {
        sinks.push(sink);
    }

    let reports = run_sweep(&config, &sweep, &mut sinks).context("Simulation sweep failed")?;

    println!("\n╔══════════════════════════════════════════════════════════╗");
    println!("║  Simulation Results                                      ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    println!("{:>12} {:>12} {:>12} {:>12} {:>14} {:>12}",
        "MTTF (h)", "Overhead %", "Failures", "No-ops", "Checkpoints", "Incomplete");
    println!("{}", "-".repeat(79));

    for (mttf, report) in &reports {
        println!("{:>12} {:>12.2} {:>12} {:>12} {:>14} {:>12}",
            mttf,
            report.overhead_percent,
            report.failure_count,
            report.no_op_failures,
            report.checkpoints,
            report.incomplete_jobs,
        );
    }

    if let Some(path) = &args.output {
        println!("\nResults written to {path}");
    }
    if let Some(path) = &args.json {
        println!("Results written to {path}");
    }

    println!("\n✅ Simulation complete!\n");
    Ok(())
}
