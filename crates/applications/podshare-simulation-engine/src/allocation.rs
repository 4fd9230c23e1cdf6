//! Weighted fair-share distribution of host CPU for a single time step
//!
//! Every workload gets one pool entry per millicore of request, so a
//! workload with twice the request gets twice the turns per pass. The pool
//! is shuffled once per step and that order is reused for every pass:
//! tie-breaking under a shortfall is random, but consistent within the step.
//!
//! ## Algorithm
//!
//! 1. Build the weighted pool (`request` entries per workload)
//! 2. Shuffle it with the step's RNG
//! 3. Walk the pool, granting one millicore to each unsatisfied entry
//!    until capacity is gone; repeat the walk while anything is left to do
//! 4. `efficiency = granted / capacity`
//!
//! A workload is never granted past its demand or its limit, and the total
//! granted never exceeds capacity. A workload with a zero request has no
//! entries and never receives anything.

use rand::Rng;
use rand::seq::SliceRandom;

use podshare_core::{PodshareError, Result, StepReport, WorkloadId};

use crate::model::{TimeStep, Workload};

/// Result of allocating one time step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub capacity: u64,
    pub granted: u64,
    pub remaining: u64,
    pub passes: u32,
    pub efficiency: f64,
}

impl StepOutcome {
    /// All capacity was handed out
    pub fn is_saturated(&self) -> bool {
        self.capacity > 0 && self.remaining == 0
    }

    pub fn report(&self, step: &TimeStep) -> StepReport {
        StepReport {
            time_step: step.id(),
            capacity: self.capacity,
            granted: self.granted,
            passes: self.passes,
            efficiency: self.efficiency,
        }
    }
}

/// Per-step allocation engine
pub struct AllocationStep;

impl AllocationStep {
    /// One entry per millicore of request, in workload order
    pub fn weighted_pool(workloads: &[Workload]) -> Vec<WorkloadId> {
        let total: usize = workloads.iter().map(|w| w.request() as usize).sum();
        let mut pool = Vec::with_capacity(total);
        for workload in workloads {
            pool.extend(std::iter::repeat_n(workload.id(), workload.request() as usize));
        }
        pool
    }

    /// Most passes a step can need.
    ///
    /// A workload with request `r` gains `r` millicores per pass while
    /// capacity lasts, so it is satisfied after `ceil(target / r)` passes.
    /// One more pass is allowed to observe that nothing is left to grant.
    pub(crate) fn pass_budget(step: &TimeStep, workloads: &[Workload]) -> u32 {
        let longest = step
            .values()
            .iter()
            .filter_map(|value| {
                let workload = &workloads[value.workload().index()];
                let request = workload.request() as u64;
                (request > 0).then(|| {
                    let target = workload.allocation_target(value.ideal_millicores()) as u64;
                    target.div_ceil(request)
                })
            })
            .max()
            .unwrap_or(0);

        u32::try_from(longest).unwrap_or(u32::MAX).saturating_add(1)
    }

    /// Distribute `capacity` millicores among the workloads of `step`.
    ///
    /// Overwrites any earlier allocation of the step. Fails without touching
    /// the step when the pool is empty or values and workloads disagree.
    pub fn allocate<R: Rng + ?Sized>(
        step: &mut TimeStep,
        workloads: &[Workload],
        capacity: u64,
        rng: &mut R,
    ) -> Result<StepOutcome> {
        Self::check_arena(step, workloads)?;

        let mut pool = Self::weighted_pool(workloads);
        if pool.is_empty() {
            return Err(PodshareError::EmptyPool {
                time_step: step.id().index(),
            });
        }
        pool.shuffle(rng);

        let budget = Self::pass_budget(step, workloads);
        step.reset();

        let values = step.values_mut();
        let mut unsatisfied = values
            .iter()
            .filter(|v| !workloads[v.workload().index()].is_satisfied_by(v))
            .count();
        let mut remaining = capacity;
        let mut passes = 0u32;

        while unsatisfied > 0 && remaining > 0 {
            if passes >= budget {
                return Err(PodshareError::invariant(format!(
                    "allocation did not converge within {} passes ({} workloads unsatisfied, {} millicores left)",
                    budget, unsatisfied, remaining
                )));
            }
            passes += 1;

            let mut granted_this_pass = 0u64;
            for id in &pool {
                if remaining == 0 {
                    break;
                }
                let workload = &workloads[id.index()];
                let value = &mut values[id.index()];
                if workload.is_satisfied_by(value) {
                    continue;
                }

                value.real_millicores += 1;
                remaining -= 1;
                granted_this_pass += 1;

                if workload.is_satisfied_by(value) {
                    unsatisfied -= 1;
                }
            }

            // Only zero-request workloads are left wanting
            if granted_this_pass == 0 {
                break;
            }
        }

        let granted = capacity - remaining;
        let efficiency = if capacity == 0 {
            0.0
        } else {
            granted as f64 / capacity as f64
        };
        step.efficiency = efficiency;

        debug_assert_eq!(step.granted_sum(), granted);

        Ok(StepOutcome {
            capacity,
            granted,
            remaining,
            passes,
            efficiency,
        })
    }

    fn check_arena(step: &TimeStep, workloads: &[Workload]) -> Result<()> {
        if step.values().len() != workloads.len() {
            return Err(PodshareError::invariant(format!(
                "{} has {} values for {} workloads",
                step.id(),
                step.values().len(),
                workloads.len()
            )));
        }
        for (index, value) in step.values().iter().enumerate() {
            if value.workload().index() != index || workloads[index].id() != value.workload() {
                return Err(PodshareError::UnknownWorkload(value.workload().index()));
            }
        }
        Ok(())
    }
}
