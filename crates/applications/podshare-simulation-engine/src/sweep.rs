//! Parameter sweeps: many independent runs over one shared demand series

use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use podshare_core::{
    DemandSeries, HostCapacity, PodshareError, Result, SimulationObserver, SizingParams,
};

use crate::simulation::{Execution, SimulationRun};

/// Percentiles swept by default: 50, 55, ..., 95 and 99
pub fn standard_percentiles() -> Vec<u32> {
    (50..=95).step_by(5).chain(std::iter::once(99)).collect()
}

/// One parameterization of a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    pub label: String,

    #[serde(flatten)]
    pub sizing: SizingParams,

    #[serde(default)]
    pub capacity: HostCapacity,

    #[serde(default)]
    pub seed: Option<u64>,
}

impl RunSpec {
    pub fn new(label: impl Into<String>, sizing: SizingParams) -> Self {
        Self {
            label: label.into(),
            sizing,
            capacity: HostCapacity::default(),
            seed: None,
        }
    }

    /// Plain percentile sizing labelled `P{p}`
    pub fn percentile(percentile: u32) -> Self {
        Self::new(format!("P{}", percentile), SizingParams::percentile(percentile))
    }

    /// Median sizing with a 15% request headroom
    pub fn harness() -> Self {
        Self::new(
            "harness",
            SizingParams::percentile(50).with_request_factor(1.15),
        )
    }

    pub fn with_capacity(mut self, capacity: HostCapacity) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_limit_factor(mut self, limit_factor: Option<f64>) -> Self {
        self.sizing = self.sizing.with_limit_factor(limit_factor);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.sizing.validate()?;
        // Only a negative fixed capacity can fail to resolve
        self.capacity.resolve(0)?;
        Ok(())
    }
}

/// Size, then replay, one spec over the series
pub fn run_one(
    series: &dyn DemandSeries,
    spec: &RunSpec,
    execution: Execution,
    observer: &dyn SimulationObserver,
) -> Result<SimulationRun> {
    spec.validate()?;

    let mut run = SimulationRun::from_series(series)?
        .with_name(spec.label.clone())
        .with_execution(execution);
    run.size(&spec.sizing, observer)?;
    let capacity = spec.capacity.resolve(run.sum_of_requests())?;
    run.run(capacity, spec.seed, observer)?;
    Ok(run)
}

/// Ordered set of run specs executed against one series
#[derive(Debug, Clone)]
pub struct Sweep {
    specs: Vec<RunSpec>,
    execution: Execution,
    seed: Option<u64>,
}

impl Sweep {
    pub fn new(specs: Vec<RunSpec>) -> Self {
        Self {
            specs,
            execution: Execution::default(),
            seed: None,
        }
    }

    /// The standard percentiles followed by the harness run
    pub fn standard() -> Self {
        let mut specs: Vec<RunSpec> = standard_percentiles()
            .into_iter()
            .map(RunSpec::percentile)
            .collect();
        specs.push(RunSpec::harness());
        Self::new(specs)
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    /// Seed for every spec that does not carry its own
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Apply the same host capacity to every spec
    pub fn with_capacity(mut self, capacity: HostCapacity) -> Self {
        for spec in &mut self.specs {
            spec.capacity = capacity;
        }
        self
    }

    /// Apply the same limit factor to every spec
    pub fn with_limit_factor(mut self, limit_factor: Option<f64>) -> Self {
        for spec in &mut self.specs {
            spec.sizing = spec.sizing.with_limit_factor(limit_factor);
        }
        self
    }

    pub fn specs(&self) -> &[RunSpec] {
        &self.specs
    }

    pub fn validate(&self) -> Result<()> {
        if self.specs.is_empty() {
            return Err(PodshareError::config("sweep has no runs"));
        }
        self.specs.iter().try_for_each(RunSpec::validate)
    }

    /// Execute every spec, returning runs in spec order.
    ///
    /// All specs are validated first so a bad one fails the sweep before any
    /// run starts.
    pub fn run(
        &self,
        series: &dyn DemandSeries,
        observer: &dyn SimulationObserver,
    ) -> Result<Vec<SimulationRun>> {
        self.validate()?;
        if series.series_len() == 0 || series.workload_count() == 0 {
            return Err(PodshareError::EmptySeries);
        }

        let started = Instant::now();
        let execute = |spec: &RunSpec| {
            let spec = match (spec.seed, self.seed) {
                (None, Some(seed)) => spec.clone().with_seed(Some(seed)),
                _ => spec.clone(),
            };
            run_one(series, &spec, self.execution, observer)
        };

        let runs = match self.execution {
            Execution::Parallel => self
                .specs
                .par_iter()
                .map(execute)
                .collect::<Result<Vec<_>>>()?,
            Execution::Sequential => self.specs.iter().map(execute).collect::<Result<Vec<_>>>()?,
        };

        info!(
            runs = runs.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sweep finished"
        );
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::DemandTable;
    use podshare_core::NoopObserver;

    fn table() -> DemandTable {
        DemandTable::new(
            (0..40)
                .map(|t| vec![(t * 17 % 250) as u32, (t * 29 % 180) as u32, 90, (t * 7 % 60) as u32])
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_standard_percentiles() {
        assert_eq!(
            standard_percentiles(),
            vec![50, 55, 60, 65, 70, 75, 80, 85, 90, 95, 99]
        );

        let sweep = Sweep::standard();
        assert_eq!(sweep.specs().len(), 12);
        assert_eq!(sweep.specs()[0].label, "P50");
        assert_eq!(sweep.specs()[11].label, "harness");
        assert_eq!(sweep.specs()[11].sizing.request_factor, 1.15);
    }

    #[test]
    fn test_runs_come_back_in_spec_order() {
        let sweep = Sweep::standard().with_seed(Some(11));
        let runs = sweep.run(&table(), &NoopObserver).unwrap();

        assert_eq!(runs.len(), sweep.specs().len());
        for (run, spec) in runs.iter().zip(sweep.specs()) {
            assert_eq!(run.name(), Some(spec.label.as_str()));
            assert_eq!(run.seed(), Some(11));
            assert_eq!(run.capacity(), Some(run.sum_of_requests()));
        }
    }

    #[test]
    fn test_parallel_sweep_matches_sequential() {
        let specs = vec![
            RunSpec::percentile(50).with_seed(Some(3)),
            RunSpec::percentile(90)
                .with_seed(Some(4))
                .with_capacity(HostCapacity::Fixed(300)),
        ];
        let parallel = Sweep::new(specs.clone()).run(&table(), &NoopObserver).unwrap();
        let sequential = Sweep::new(specs)
            .with_execution(Execution::Sequential)
            .run(&table(), &NoopObserver)
            .unwrap();

        for (a, b) in parallel.iter().zip(&sequential) {
            for (x, y) in a.time_steps().iter().zip(b.time_steps()) {
                assert_eq!(x.values(), y.values());
            }
        }
        assert_eq!(parallel[1].capacity(), Some(300));
    }

    #[test]
    fn test_invalid_spec_fails_before_running() {
        let sweep = Sweep::new(vec![
            RunSpec::percentile(50),
            RunSpec::percentile(120),
        ]);
        assert!(matches!(
            sweep.run(&table(), &NoopObserver),
            Err(PodshareError::InvalidPercentile(120))
        ));

        let negative = Sweep::new(vec![
            RunSpec::percentile(50).with_capacity(HostCapacity::Fixed(-5)),
        ]);
        assert!(matches!(
            negative.validate(),
            Err(PodshareError::NegativeCapacity(-5))
        ));

        assert!(Sweep::new(Vec::new()).validate().is_err());
    }

    #[test]
    fn test_run_spec_from_json() {
        let spec: RunSpec = serde_json::from_str(
            r#"{"label": "tight", "percentile": 80, "limit_factor": 2.0, "capacity": {"fixed": 500}}"#,
        )
        .unwrap();

        assert_eq!(spec.label, "tight");
        assert_eq!(spec.sizing.percentile, 80);
        assert_eq!(spec.sizing.request_factor, 1.0);
        assert_eq!(spec.sizing.limit_factor, Some(2.0));
        assert_eq!(spec.capacity, HostCapacity::Fixed(500));
        assert_eq!(spec.seed, None);
    }
}
