//! Run-level statistics and cross-run comparisons
//!
//! Everything here is a read-only reduction over completed runs.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use podshare_core::{PodshareError, Result, WorkloadId};

use crate::simulation::SimulationRun;

/// Headline numbers of one completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub name: String,
    pub percentile: Option<u32>,
    pub request_factor: Option<f64>,
    pub limit_factor: Option<f64>,
    pub capacity: u64,
    pub seed: u64,
    pub workloads: usize,
    pub time_steps: usize,
    pub sum_of_requests: u64,
    pub sum_of_max: u64,
    pub biggest_time_step_demand: u64,
    pub average_efficiency_percent: f64,
    pub saturated_time_steps: usize,
    pub saturated_percent: f64,
    pub average_completion_percent: f64,
    pub throttled_pairs: u64,
    pub total_pairs: u64,
    pub throttled_percent: f64,
}

/// Allocation of one workload over a window of time steps, in every run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSliceTable {
    pub workload: WorkloadId,
    pub time_steps: Vec<usize>,
    pub rows: Vec<TimeSliceRow>,
    pub ideal: Vec<u32>,
}

/// Real millicores of the workload in one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSliceRow {
    pub label: String,
    pub request: u32,
    pub limit: Option<u32>,
    pub real: Vec<u32>,
}

impl TimeSliceTable {
    /// Semicolon-style layout: a header of step ids, one row per run, then `ideal`
    pub fn write_delimited<W: Write>(&self, mut writer: W, delimiter: char) -> Result<()> {
        let sep = delimiter.to_string();
        let join = |cells: Vec<String>| cells.join(sep.as_str());

        writeln!(
            writer,
            "{}{}",
            sep,
            join(self.time_steps.iter().map(usize::to_string).collect())
        )?;
        for row in &self.rows {
            writeln!(
                writer,
                "{}{}{}",
                row.label,
                sep,
                join(row.real.iter().map(u32::to_string).collect())
            )?;
        }
        writeln!(
            writer,
            "ideal{}{}",
            sep,
            join(self.ideal.iter().map(u32::to_string).collect())
        )?;
        writer.flush()?;
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>, delimiter: char) -> Result<()> {
        let file = File::create(path)?;
        self.write_delimited(BufWriter::new(file), delimiter)
    }
}

/// Turns completed runs into summaries and comparison tables
pub struct MetricsAggregator;

impl MetricsAggregator {
    /// Summarize a completed run under its own name
    pub fn summarize(run: &SimulationRun) -> Result<RunSummary> {
        Self::summarize_as(run.name().unwrap_or("unnamed"), run)
    }

    /// Summarize a completed run under `label`
    pub fn summarize_as(label: &str, run: &SimulationRun) -> Result<RunSummary> {
        let (capacity, seed) = match (run.capacity(), run.seed()) {
            (Some(capacity), Some(seed)) => (capacity, seed),
            _ => return Err(PodshareError::NotRun(label.to_string())),
        };
        let sizing = run.sizing();
        let saturated = run.saturated_time_steps().len();

        Ok(RunSummary {
            name: label.to_string(),
            percentile: sizing.map(|s| s.percentile),
            request_factor: sizing.map(|s| s.request_factor),
            limit_factor: sizing.and_then(|s| s.limit_factor),
            capacity,
            seed,
            workloads: run.workloads().len(),
            time_steps: run.time_steps().len(),
            sum_of_requests: run.sum_of_requests(),
            sum_of_max: run.sum_of_max(),
            biggest_time_step_demand: run.biggest_time_step().map(|t| t.demand_sum()).unwrap_or(0),
            average_efficiency_percent: run.average_efficiency() * 100.0,
            saturated_time_steps: saturated,
            saturated_percent: run.saturated_fraction() * 100.0,
            average_completion_percent: run.average_completion() * 100.0,
            throttled_pairs: run.throttled_pairs(),
            total_pairs: run.total_pairs(),
            throttled_percent: run.throttled_fraction() * 100.0,
        })
    }

    /// Summaries of several labelled runs, in the order given
    pub fn summarize_all<'a, I>(runs: I) -> Result<Vec<RunSummary>>
    where
        I: IntoIterator<Item = (&'a str, &'a SimulationRun)>,
    {
        runs.into_iter()
            .map(|(label, run)| Self::summarize_as(label, run))
            .collect()
    }

    /// Compare one workload across runs over `limit` steps starting at `skip`.
    ///
    /// All runs must replay the same demand series.
    pub fn workload_timeline(
        runs: &[(&str, &SimulationRun)],
        workload: WorkloadId,
        skip: usize,
        limit: usize,
    ) -> Result<TimeSliceTable> {
        let (first_label, first) = runs
            .first()
            .ok_or_else(|| PodshareError::config("no runs to compare"))?;
        first.workload(workload)?;

        let window: Vec<usize> = (0..first.time_steps().len()).skip(skip).take(limit).collect();
        let ideal: Vec<u32> = window
            .iter()
            .map(|&t| first.time_steps()[t].values()[workload.index()].ideal_millicores())
            .collect();

        let mut rows = Vec::with_capacity(runs.len());
        for (label, run) in runs {
            if run.capacity().is_none() {
                return Err(PodshareError::NotRun(label.to_string()));
            }
            if run.time_steps().len() != first.time_steps().len()
                || run.workloads().len() != first.workloads().len()
            {
                return Err(PodshareError::config(format!(
                    "run {} does not replay the same series as {}",
                    label, first_label
                )));
            }

            let sized = run.workload(workload)?;
            let real = window
                .iter()
                .map(|&t| run.time_steps()[t].values()[workload.index()].real_millicores())
                .collect();
            rows.push(TimeSliceRow {
                label: label.to_string(),
                request: sized.request(),
                limit: sized.limit(),
                real,
            });
        }

        Ok(TimeSliceTable {
            workload,
            time_steps: window,
            rows,
            ideal,
        })
    }

    /// Fixed-width console table of summaries
    pub fn render_table(summaries: &[RunSummary]) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{:<12} {:>10} {:>10} {:>12} {:>12} {:>12} {:>22}\n",
            "Run", "Requests", "Host (m)", "Efficiency", "Saturated", "Completion", "Throttled pods"
        ));
        out.push_str(&format!("{}\n", "-".repeat(96)));

        for s in summaries {
            out.push_str(&format!(
                "{:<12} {:>10} {:>10} {:>11.0}% {:>11.1}% {:>11.1}% {:>10}/{:<6} ({:>4.1}%)\n",
                s.name,
                s.sum_of_requests,
                s.capacity,
                s.average_efficiency_percent.floor(),
                s.saturated_percent,
                s.average_completion_percent,
                s.throttled_pairs,
                s.total_pairs,
                s.throttled_percent,
            ));
        }
        out
    }
}
