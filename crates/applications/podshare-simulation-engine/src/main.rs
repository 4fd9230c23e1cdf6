//! Podshare Simulation Engine CLI
//!
//! Command-line interface for sweeping pod sizing policies over a CPU demand series

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use podshare_core::{DemandSeries, HostCapacity, WorkloadId};
use podshare_simulation_engine::{
    config::{SweepConfig, TimelineConfig},
    metrics::MetricsAggregator,
    observer::TracingObserver,
    simulation::SimulationRun,
    sweep::RunSpec,
};

#[derive(Parser, Debug)]
#[command(name = "podshare-sim")]
#[command(about = "Simulate CPU fair-share between percentile-sized pods", long_about = None)]
struct Args {
    /// JSON sweep configuration (command-line flags override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Delimited demand file (one row per time step, one column per pod)
    #[arg(short, long)]
    series: Option<PathBuf>,

    /// Cell delimiter of the demand file
    #[arg(long)]
    delimiter: Option<char>,

    /// Pods in the synthetic series (used when no demand file is given)
    #[arg(long)]
    synthetic_workloads: Option<usize>,

    /// Time steps in the synthetic series
    #[arg(long)]
    synthetic_steps: Option<usize>,

    /// Percentiles to sweep (comma-separated, e.g. 50,90,99)
    #[arg(short, long, value_delimiter = ',')]
    percentiles: Vec<u32>,

    /// Request factor applied to every swept percentile
    #[arg(long)]
    request_factor: Option<f64>,

    /// Limit factor applied to every run (no limit when omitted)
    #[arg(long)]
    limit_factor: Option<f64>,

    /// Fixed host capacity in millicores (default: sum of requests)
    #[arg(long, allow_hyphen_values = true)]
    capacity: Option<i64>,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Run everything on the calling thread
    #[arg(long)]
    sequential: bool,

    /// Average completion below which throttled steps are logged
    #[arg(long)]
    low_completion: Option<f64>,

    /// Output JSON file for run summaries
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pod to compare across runs
    #[arg(long)]
    timeline_workload: Option<usize>,

    /// First time step of the comparison window
    #[arg(long, default_value_t = 0)]
    timeline_skip: usize,

    /// Length of the comparison window
    #[arg(long, default_value_t = 100)]
    timeline_limit: usize,

    /// Delimited file receiving the comparison
    #[arg(long, default_value = "timeline.csv")]
    timeline_output: PathBuf,
}

impl Args {
    /// Fold command-line overrides into the file (or default) configuration
    fn into_config(self) -> Result<SweepConfig> {
        let mut config = match &self.config {
            Some(path) => SweepConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => SweepConfig::default(),
        };

        if let Some(series) = self.series {
            config.series = Some(series);
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        }
        if let Some(workloads) = self.synthetic_workloads {
            config.synthetic.workloads = workloads;
        }
        if let Some(steps) = self.synthetic_steps {
            config.synthetic.steps = steps;
        }
        if !self.percentiles.is_empty() {
            config.runs = self.percentiles.iter().map(|&p| RunSpec::percentile(p)).collect();
        }
        for spec in &mut config.runs {
            if let Some(request_factor) = self.request_factor {
                spec.sizing.request_factor = request_factor;
            }
            if self.limit_factor.is_some() {
                spec.sizing.limit_factor = self.limit_factor;
            }
            if let Some(capacity) = self.capacity {
                spec.capacity = HostCapacity::Fixed(capacity);
            }
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.sequential {
            config.parallel = false;
        }
        if let Some(threshold) = self.low_completion {
            config.low_completion_threshold = threshold;
        }
        if let Some(output) = self.output {
            config.output = Some(output);
        }
        if let Some(workload) = self.timeline_workload {
            config.timeline = Some(TimelineConfig {
                workload,
                skip: self.timeline_skip,
                limit: self.timeline_limit,
                output: self.timeline_output,
            });
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "podshare=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Args::parse().into_config()?;
    let observer = TracingObserver;

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  Podshare Simulation Engine                              ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    let series = config.load_series().context("Failed to load demand series")?;
    match &config.series {
        Some(path) => println!("Loaded demand series from {}", path.display()),
        None => println!("Generated synthetic demand series"),
    }
    println!("  Pods: {}", series.workload_count());
    println!("  Time steps: {}", series.series_len());
    println!("  Peak step demand: {}m", series.peak_demand());
    println!("  Runs: {}\n", config.runs.len());

    let runs = config.sweep().run(&series, &observer)?;

    if let Some(first) = runs.first() {
        info!(
            biggest_time_step = first.biggest_time_step().map(|t| t.demand_sum()).unwrap_or(0),
            sum_of_max = first.sum_of_max(),
            "demand series loaded"
        );
    }
    for run in &runs {
        // Reports every step below the threshold through the observer
        let completion = run.average_completion_with(config.low_completion_threshold, &observer);
        info!(
            run = run.name().unwrap_or("unnamed"),
            ideal_efficiency = run.capacity().map(|c| series.ideal_efficiency(c)).unwrap_or(0.0),
            average_completion = completion,
            "run checked"
        );
    }

    let labelled: Vec<(&str, &SimulationRun)> = runs
        .iter()
        .map(|run| (run.name().unwrap_or("unnamed"), run))
        .collect();
    let summaries = MetricsAggregator::summarize_all(labelled.iter().copied())?;

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  Simulation Results                                      ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");
    print!("{}", MetricsAggregator::render_table(&summaries));

    if let Some(output_path) = &config.output {
        println!("\nWriting results to {}...", output_path.display());
        let json = serde_json::to_string_pretty(&summaries)?;
        fs::write(output_path, json)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        println!("  Results saved");
    }

    if let Some(timeline) = &config.timeline {
        if labelled.is_empty() {
            bail!("No runs to compare");
        }
        let table = MetricsAggregator::workload_timeline(
            &labelled,
            WorkloadId(timeline.workload),
            timeline.skip,
            timeline.limit,
        )?;
        table.save(&timeline.output, config.delimiter)?;
        println!(
            "\nWrote {} timeline to {}",
            table.workload,
            timeline.output.display()
        );
    }

    println!("\n✅ Simulation complete!\n");
    Ok(())
}
