//! One simulation run: a sized set of workloads replayed over every time step
//!
//! Time steps share nothing but the read-only workload sizing, so they are
//! allocated in parallel. Each step draws from its own `ChaCha8Rng` stream
//! derived from the run seed, which makes the result independent of the
//! order (or thread) the steps are processed in.

use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use podshare_core::{
    DemandSeries, LowCompletionReport, PodshareError, Result, RunStarted, SimulationObserver,
    SizingParams, TimeStepId, WorkloadId,
};

use crate::allocation::AllocationStep;
use crate::model::{TimeStep, Value, Workload};
use crate::sizing::WorkloadSizer;

/// Average completion below which a throttled time step is reported
pub const DEFAULT_LOW_COMPLETION_THRESHOLD: f64 = 0.90;

/// How time steps are scheduled onto threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// Fan steps out over the rayon thread pool
    #[default]
    Parallel,
    /// Allocate steps one after the other on the calling thread
    Sequential,
}

/// Workloads and time steps of one parameterization
#[derive(Debug, Clone)]
pub struct SimulationRun {
    name: Option<String>,
    workloads: Vec<Workload>,
    time_steps: Vec<TimeStep>,
    sizing: Option<SizingParams>,
    capacity: Option<u64>,
    seed: Option<u64>,
    execution: Execution,
}

impl SimulationRun {
    /// Build unsized workloads and unallocated time steps from a demand series
    pub fn from_series(series: &dyn DemandSeries) -> Result<Self> {
        let steps = series.series_len();
        let count = series.workload_count();
        if steps == 0 || count == 0 {
            return Err(PodshareError::EmptySeries);
        }

        let workloads = (0..count)
            .map(|w| {
                let history = (0..steps).map(|t| series.demand_at(t, w)).collect();
                Workload::new(WorkloadId(w), history)
            })
            .collect();

        let time_steps = (0..steps)
            .map(|t| {
                let values = (0..count)
                    .map(|w| Value::new(WorkloadId(w), series.demand_at(t, w)))
                    .collect();
                TimeStep::new(TimeStepId(t), values)
            })
            .collect();

        Ok(SimulationRun {
            name: None,
            workloads,
            time_steps,
            sizing: None,
            capacity: None,
            seed: None,
            execution: Execution::default(),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn workloads(&self) -> &[Workload] {
        &self.workloads
    }

    pub fn time_steps(&self) -> &[TimeStep] {
        &self.time_steps
    }

    pub fn workload(&self, id: WorkloadId) -> Result<&Workload> {
        self.workloads
            .get(id.index())
            .ok_or(PodshareError::UnknownWorkload(id.index()))
    }

    pub fn time_step(&self, id: TimeStepId) -> Option<&TimeStep> {
        self.time_steps.get(id.index())
    }

    /// Parameters the workloads were sized with
    pub fn sizing(&self) -> Option<&SizingParams> {
        self.sizing.as_ref()
    }

    /// Host capacity of the last completed run
    pub fn capacity(&self) -> Option<u64> {
        self.capacity
    }

    /// Seed of the last completed run
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn is_complete(&self) -> bool {
        self.capacity.is_some()
    }

    /// Derive request/limit for every workload.
    ///
    /// Allocations made under earlier sizing are discarded, so a completed
    /// run has to be run again.
    pub fn size(&mut self, params: &SizingParams, observer: &dyn SimulationObserver) -> Result<()> {
        let sizer = WorkloadSizer::new(*params)?;
        sizer.size(&mut self.workloads, observer)?;
        self.sizing = Some(*params);
        self.clear_allocation();
        Ok(())
    }

    fn clear_allocation(&mut self) {
        self.time_steps.iter_mut().for_each(TimeStep::reset);
        self.capacity = None;
        self.seed = None;
    }

    /// RNG used for one time step of a run seeded with `seed`
    pub fn step_rng(seed: u64, time_step: TimeStepId) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(time_step.index() as u64);
        rng
    }

    /// Allocate every time step with the same host capacity.
    ///
    /// Without a seed a fresh one is drawn; either way the seed used is kept
    /// on the run so the result can be reproduced.
    pub fn run(
        &mut self,
        capacity: u64,
        seed: Option<u64>,
        observer: &dyn SimulationObserver,
    ) -> Result<()> {
        // A failed run must not look complete with the previous metadata
        self.capacity = None;
        self.seed = None;

        if self.sizing.is_none() || !self.workloads.iter().all(Workload::is_sized) {
            return Err(PodshareError::NotSized);
        }
        if self.sum_of_requests() == 0 {
            return Err(PodshareError::EmptyPool { time_step: 0 });
        }

        let seed = seed.unwrap_or_else(|| rand::thread_rng().r#gen());
        observer.on_run_started(&RunStarted {
            name: self.name.clone(),
            workloads: self.workloads.len(),
            time_steps: self.time_steps.len(),
            sum_of_requests: self.sum_of_requests(),
            capacity,
            seed,
        });

        let started = Instant::now();
        let workloads = &self.workloads;
        let allocate_step = |step: &mut TimeStep| -> Result<()> {
            let mut rng = Self::step_rng(seed, step.id());
            let outcome = AllocationStep::allocate(step, workloads, capacity, &mut rng)?;
            observer.on_step_allocated(&outcome.report(step));
            Ok(())
        };

        match self.execution {
            Execution::Parallel => self.time_steps.par_iter_mut().try_for_each(allocate_step)?,
            Execution::Sequential => self.time_steps.iter_mut().try_for_each(allocate_step)?,
        }

        self.capacity = Some(capacity);
        self.seed = Some(seed);
        observer.on_run_finished(self.name(), started.elapsed());
        Ok(())
    }

    /// Sum over workloads of their largest observed demand
    pub fn sum_of_max(&self) -> u64 {
        self.workloads.iter().map(|w| w.max_demand() as u64).sum()
    }

    /// Time step with the largest total demand
    pub fn biggest_time_step(&self) -> Option<&TimeStep> {
        self.time_steps.iter().max_by_key(|t| t.demand_sum())
    }

    pub fn sum_of_requests(&self) -> u64 {
        self.workloads.iter().map(|w| w.request() as u64).sum()
    }

    /// Time steps where the host was fully consumed
    pub fn saturated_time_steps(&self) -> Vec<&TimeStep> {
        self.time_steps.iter().filter(|t| t.is_saturated()).collect()
    }

    pub fn saturated_fraction(&self) -> f64 {
        self.saturated_time_steps().len() as f64 / self.time_steps.len() as f64
    }

    pub fn average_efficiency(&self) -> f64 {
        self.time_steps.iter().map(TimeStep::efficiency).sum::<f64>() / self.time_steps.len() as f64
    }

    /// Mean of `real / ideal` over every (workload, time step) pair
    pub fn average_completion(&self) -> f64 {
        self.time_steps
            .iter()
            .map(TimeStep::average_completion)
            .sum::<f64>()
            / self.time_steps.len() as f64
    }

    /// Same as [`average_completion`](Self::average_completion), reporting
    /// each time step whose completion is below `threshold` while at least
    /// one workload is throttled.
    pub fn average_completion_with(&self, threshold: f64, observer: &dyn SimulationObserver) -> f64 {
        let mut total = 0.0;
        for step in &self.time_steps {
            let completion = step.average_completion();
            if completion < threshold && step.throttled_count() > 0 {
                observer.on_low_completion(&LowCompletionReport {
                    time_step: step.id(),
                    average_completion: completion,
                    throttled: step.throttled_values(&self.workloads),
                });
            }
            total += completion;
        }
        total / self.time_steps.len() as f64
    }

    /// Number of (workload, time step) pairs served less than their demand
    pub fn throttled_pairs(&self) -> u64 {
        self.time_steps
            .iter()
            .map(|t| t.throttled_count() as u64)
            .sum()
    }

    pub fn throttled_fraction(&self) -> f64 {
        self.throttled_pairs() as f64 / self.total_pairs() as f64
    }

    /// `|workloads| * |time steps|`
    pub fn total_pairs(&self) -> u64 {
        self.workloads.len() as u64 * self.time_steps.len() as u64
    }

    fn value(&self, time_step: TimeStepId, workload: WorkloadId) -> Result<&Value> {
        let step = self.time_step(time_step).ok_or_else(|| {
            PodshareError::config(format!("time step {} out of range", time_step.index()))
        })?;
        step.value(workload)
            .ok_or(PodshareError::UnknownWorkload(workload.index()))
    }

    pub fn real_millicores(&self, time_step: TimeStepId, workload: WorkloadId) -> Result<u32> {
        Ok(self.value(time_step, workload)?.real_millicores())
    }

    pub fn ideal_millicores(&self, time_step: TimeStepId, workload: WorkloadId) -> Result<u32> {
        Ok(self.value(time_step, workload)?.ideal_millicores())
    }

    pub fn is_throttled(&self, time_step: TimeStepId, workload: WorkloadId) -> Result<bool> {
        Ok(self.value(time_step, workload)?.is_throttled())
    }

    pub fn is_satisfied(&self, time_step: TimeStepId, workload: WorkloadId) -> Result<bool> {
        let value = self.value(time_step, workload)?;
        Ok(self.workload(workload)?.is_satisfied_by(value))
    }
}
