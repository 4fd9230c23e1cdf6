//! Workload / time step / value model
//!
//! The model is an arena: a run owns one `Vec<Workload>` and one
//! `Vec<TimeStep>`, and each `Value` refers to its workload by `WorkloadId`.
//! Values hold no pointer back to their workload or time step.

use podshare_core::{ThrottledValue, TimeStepId, WorkloadId};
use serde::Serialize;

/// A simulated pod: demand history plus the request/limit derived from it
#[derive(Debug, Clone, Serialize)]
pub struct Workload {
    id: WorkloadId,
    request: u32,
    limit: Option<u32>,
    sized: bool,
    #[serde(skip)]
    sorted_history: Vec<u32>,
}

impl Workload {
    /// Create an unsized workload from its demand history (any order)
    pub fn new(id: WorkloadId, mut history: Vec<u32>) -> Self {
        history.sort_unstable();
        Workload {
            id,
            request: 0,
            limit: None,
            sized: false,
            sorted_history: history,
        }
    }

    pub fn id(&self) -> WorkloadId {
        self.id
    }

    pub fn request(&self) -> u32 {
        self.request
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn is_sized(&self) -> bool {
        self.sized
    }

    /// Demand history sorted ascending
    pub fn sorted_history(&self) -> &[u32] {
        &self.sorted_history
    }

    /// Largest demand ever observed (0 for an empty history)
    pub fn max_demand(&self) -> u32 {
        self.sorted_history.last().copied().unwrap_or(0)
    }

    /// Index of percentile `p` in the sorted history: `floor(p / 100 * n)`,
    /// clamped to the last index so that `p = 100` is the maximum.
    pub fn percentile_index(&self, p: u32) -> Option<usize> {
        let n = self.sorted_history.len();
        if n == 0 {
            return None;
        }
        let index = (p as usize).saturating_mul(n) / 100;
        Some(index.min(n - 1))
    }

    /// Demand at percentile `p`, `None` for an empty history
    pub fn percentile(&self, p: u32) -> Option<u32> {
        self.percentile_index(p).map(|i| self.sorted_history[i])
    }

    pub(crate) fn apply_sizing(&mut self, request: u32, limit: Option<u32>) {
        self.request = request;
        self.limit = limit;
        self.sized = true;
    }

    /// Most this workload can receive for a given demand
    pub fn allocation_target(&self, ideal_millicores: u32) -> u32 {
        match self.limit {
            Some(limit) => ideal_millicores.min(limit),
            None => ideal_millicores,
        }
    }

    /// Served in full, or served up to its limit
    pub fn is_satisfied_by(&self, value: &Value) -> bool {
        value.real_millicores == value.ideal_millicores
            || self.limit == Some(value.real_millicores)
    }
}

/// Demand and allocation of one workload at one time step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Value {
    workload: WorkloadId,
    ideal_millicores: u32,
    pub(crate) real_millicores: u32,
}

impl Value {
    pub fn new(workload: WorkloadId, ideal_millicores: u32) -> Self {
        Value {
            workload,
            ideal_millicores,
            real_millicores: 0,
        }
    }

    pub fn workload(&self) -> WorkloadId {
        self.workload
    }

    pub fn ideal_millicores(&self) -> u32 {
        self.ideal_millicores
    }

    pub fn real_millicores(&self) -> u32 {
        self.real_millicores
    }

    /// Fraction of demand served; a value with no demand is complete
    pub fn completion(&self) -> f64 {
        if self.ideal_millicores == 0 {
            1.0
        } else {
            self.real_millicores as f64 / self.ideal_millicores as f64
        }
    }

    /// Received less than it demanded (limit-capped values count as throttled)
    pub fn is_throttled(&self) -> bool {
        self.real_millicores < self.ideal_millicores
    }
}

/// One row of the demand series: a value per workload plus the step efficiency
#[derive(Debug, Clone, Serialize)]
pub struct TimeStep {
    id: TimeStepId,
    values: Vec<Value>,
    pub(crate) efficiency: f64,
}

impl TimeStep {
    /// `values[i]` must belong to workload `i`
    pub fn new(id: TimeStepId, values: Vec<Value>) -> Self {
        TimeStep {
            id,
            values,
            efficiency: 0.0,
        }
    }

    pub fn id(&self) -> TimeStepId {
        self.id
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut [Value] {
        &mut self.values
    }

    pub fn value(&self, workload: WorkloadId) -> Option<&Value> {
        self.values.get(workload.index())
    }

    /// Fraction of host capacity consumed, set by the allocation
    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    pub fn efficiency_percent(&self) -> u32 {
        (self.efficiency * 100.0) as u32
    }

    /// Host capacity was fully consumed
    pub fn is_saturated(&self) -> bool {
        self.efficiency >= 1.0
    }

    /// Total demand at this step
    pub fn demand_sum(&self) -> u64 {
        self.values.iter().map(|v| v.ideal_millicores as u64).sum()
    }

    /// Total allocation at this step
    pub fn granted_sum(&self) -> u64 {
        self.values.iter().map(|v| v.real_millicores as u64).sum()
    }

    pub fn average_completion(&self) -> f64 {
        if self.values.is_empty() {
            return 1.0;
        }
        self.values.iter().map(Value::completion).sum::<f64>() / self.values.len() as f64
    }

    pub fn throttled_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_throttled()).count()
    }

    /// Throttled values with their workload sizing, for diagnostics
    pub(crate) fn throttled_values(&self, workloads: &[Workload]) -> Vec<ThrottledValue> {
        self.values
            .iter()
            .filter(|v| v.is_throttled())
            .map(|v| {
                let workload = &workloads[v.workload.index()];
                ThrottledValue {
                    workload: v.workload,
                    time_step: self.id,
                    request: workload.request(),
                    limit: workload.limit(),
                    real_millicores: v.real_millicores,
                    ideal_millicores: v.ideal_millicores,
                }
            })
            .collect()
    }

    /// Clear any previous allocation
    pub(crate) fn reset(&mut self) {
        for value in &mut self.values {
            value.real_millicores = 0;
        }
        self.efficiency = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_lookup() {
        let workload = Workload::new(WorkloadId(0), vec![400, 100, 300, 200]);

        assert_eq!(workload.sorted_history(), &[100, 200, 300, 400]);
        // floor(0.5 * 4) = 2
        assert_eq!(workload.percentile(50), Some(300));
        assert_eq!(workload.percentile(0), Some(100));
        assert_eq!(workload.percentile(99), Some(400));
        assert_eq!(workload.max_demand(), 400);
    }

    #[test]
    fn test_percentile_100_clamps_to_max() {
        let workload = Workload::new(WorkloadId(0), vec![5, 1, 9]);
        assert_eq!(workload.percentile_index(100), Some(2));
        assert_eq!(workload.percentile(100), Some(9));
    }

    #[test]
    fn test_percentile_empty_history() {
        let workload = Workload::new(WorkloadId(0), vec![]);
        assert_eq!(workload.percentile(50), None);
        assert_eq!(workload.max_demand(), 0);
    }

    #[test]
    fn test_satisfied_and_throttled() {
        let mut workload = Workload::new(WorkloadId(0), vec![100]);
        workload.apply_sizing(100, Some(120));

        let mut value = Value::new(WorkloadId(0), 200);
        value.real_millicores = 100;
        assert!(value.is_throttled());
        assert!(!workload.is_satisfied_by(&value));

        // Capped at the limit: satisfied but still throttled
        value.real_millicores = 120;
        assert!(workload.is_satisfied_by(&value));
        assert!(value.is_throttled());
        assert_eq!(workload.allocation_target(200), 120);

        let zero = Value::new(WorkloadId(0), 0);
        assert!(workload.is_satisfied_by(&zero));
        assert!(!zero.is_throttled());
        assert_eq!(zero.completion(), 1.0);
    }

    #[test]
    fn test_time_step_reductions() {
        let mut step = TimeStep::new(
            TimeStepId(7),
            vec![Value::new(WorkloadId(0), 100), Value::new(WorkloadId(1), 50)],
        );
        step.values_mut()[0].real_millicores = 50;
        step.values_mut()[1].real_millicores = 50;

        assert_eq!(step.demand_sum(), 150);
        assert_eq!(step.granted_sum(), 100);
        assert_eq!(step.throttled_count(), 1);
        assert!((step.average_completion() - 0.75).abs() < 1e-9);

        let mut w0 = Workload::new(WorkloadId(0), vec![100]);
        w0.apply_sizing(80, None);
        let w1 = Workload::new(WorkloadId(1), vec![50]);
        let throttled = step.throttled_values(&[w0, w1]);
        assert_eq!(throttled.len(), 1);
        assert_eq!(throttled[0].request, 80);
        assert_eq!(throttled[0].time_step, TimeStepId(7));

        step.reset();
        assert_eq!(step.granted_sum(), 0);
    }
}
