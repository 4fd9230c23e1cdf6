//! `tracing`-backed simulation observer

use std::time::Duration;

use podshare_core::{
    LowCompletionReport, RunStarted, SimulationObserver, SizingDecision, StepReport,
};
use tracing::{debug, info, trace};

/// Logs sizing, run lifecycle and low-completion steps through `tracing`.
///
/// Per-step reports go to `trace` so that long series stay quiet unless
/// `RUST_LOG` asks for them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SimulationObserver for TracingObserver {
    fn on_sized(&self, decision: &SizingDecision) {
        debug!(
            workload = %decision.workload,
            percentile_value = decision.percentile_value,
            request = decision.request,
            limit = ?decision.limit,
            "workload sized"
        );
    }

    fn on_run_started(&self, run: &RunStarted) {
        info!(
            run = run.name.as_deref().unwrap_or("unnamed"),
            workloads = run.workloads,
            time_steps = run.time_steps,
            sum_of_requests = run.sum_of_requests,
            capacity = run.capacity,
            seed = run.seed,
            "simulation started"
        );
    }

    fn on_step_allocated(&self, report: &StepReport) {
        trace!(
            time_step = %report.time_step,
            granted = report.granted,
            capacity = report.capacity,
            passes = report.passes,
            efficiency = report.efficiency,
            "time step allocated"
        );
    }

    fn on_low_completion(&self, report: &LowCompletionReport) {
        let throttled = report
            .throttled
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        info!(
            "{} completion={}%: {}",
            report.time_step,
            (report.average_completion * 100.0) as u32,
            throttled
        );
    }

    fn on_run_finished(&self, name: Option<&str>, elapsed: Duration) {
        info!(
            run = name.unwrap_or("unnamed"),
            elapsed_ms = elapsed.as_millis() as u64,
            "simulation calculated"
        );
    }
}
