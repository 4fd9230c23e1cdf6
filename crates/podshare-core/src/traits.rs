//! Core traits for Podshare
//!
//! `DemandSeries` is the only thing the engine needs from a loader, and
//! `SimulationObserver` is the only way the engine reports what it does.
//! The engine never logs through a process-wide logger on its own.

use std::time::Duration;

use crate::types::{TimeStepId, WorkloadId};

/// Rectangular table of CPU demand: rows are time steps, columns are workloads
pub trait DemandSeries: Send + Sync {
    /// Number of time steps
    fn series_len(&self) -> usize;

    /// Number of workloads
    fn workload_count(&self) -> usize;

    /// Demand (millicores) of a workload at a time step
    fn demand_at(&self, time_step: usize, workload: usize) -> u32;
}

/// Request/limit chosen for one workload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingDecision {
    pub workload: WorkloadId,
    pub percentile_value: u32,
    pub request: u32,
    pub limit: Option<u32>,
}

/// Outcome of allocating one time step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub time_step: TimeStepId,
    pub capacity: u64,
    pub granted: u64,
    pub passes: u32,
    pub efficiency: f64,
}

/// A workload that got less than it asked for at a time step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottledValue {
    pub workload: WorkloadId,
    pub time_step: TimeStepId,
    pub request: u32,
    pub limit: Option<u32>,
    pub real_millicores: u32,
    pub ideal_millicores: u32,
}

impl ThrottledValue {
    /// Fraction of demand that was served
    pub fn completion(&self) -> f64 {
        if self.ideal_millicores == 0 {
            1.0
        } else {
            self.real_millicores as f64 / self.ideal_millicores as f64
        }
    }
}

impl std::fmt::Display for ThrottledValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let limit = self
            .limit
            .map(|l| l.to_string())
            .unwrap_or_else(|| "none".to_string());
        write!(
            f,
            "{}[R:{},L:{}]@{}:A={}/W={}({}%)",
            self.workload,
            self.request,
            limit,
            self.time_step,
            self.real_millicores,
            self.ideal_millicores,
            (self.completion() * 100.0) as u32
        )
    }
}

/// A time step whose average completion fell below the diagnostic threshold
#[derive(Debug, Clone, PartialEq)]
pub struct LowCompletionReport {
    pub time_step: TimeStepId,
    pub average_completion: f64,
    pub throttled: Vec<ThrottledValue>,
}

/// Summary handed to the observer when a run starts
#[derive(Debug, Clone, PartialEq)]
pub struct RunStarted {
    pub name: Option<String>,
    pub workloads: usize,
    pub time_steps: usize,
    pub sum_of_requests: u64,
    pub capacity: u64,
    pub seed: u64,
}

/// Hooks the engine calls while sizing and running.
///
/// Every method has an empty default so an observer only implements what it
/// cares about. Steps may be allocated from several threads at once, so
/// implementations must be `Send + Sync` and must not assume step order.
pub trait SimulationObserver: Send + Sync {
    fn on_sized(&self, _decision: &SizingDecision) {}

    fn on_run_started(&self, _run: &RunStarted) {}

    fn on_step_allocated(&self, _report: &StepReport) {}

    fn on_low_completion(&self, _report: &LowCompletionReport) {}

    fn on_run_finished(&self, _name: Option<&str>, _elapsed: Duration) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SimulationObserver for NoopObserver {}
