//! Synthetic CPU demand generation using an Ornstein-Uhlenbeck process
//!
//! Models each pod's demand as a mean-reverting stochastic process with:
//! - a per-pod baseline (pods are not all the same size)
//! - a daily cycle
//! - occasional bursts well above the baseline
//!
//! Used when no recorded trace is available, and by tests and demos.

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use podshare_core::{PodshareError, Result};

use crate::series::DemandTable;

/// Demand generator for a set of pods
#[derive(Debug, Clone)]
pub struct DemandGenerator {
    mean_millicores: f64,
    volatility: f64,
    mean_reversion_speed: f64,
    daily_amplitude: f64,
    steps_per_day: usize,
    burst_probability: f64,
    max_millicores: u32,
}

impl DemandGenerator {
    /// Create a new demand generator
    ///
    /// # Arguments
    /// * `mean_millicores` - Average demand of a typical pod (e.g. 500m)
    /// * `max_millicores` - Hard ceiling, typically the pod's core count * 1000
    pub fn new(mean_millicores: f64, max_millicores: u32) -> Self {
        DemandGenerator {
            mean_millicores,
            volatility: 0.25,          // 25% of the mean per sqrt(step)
            mean_reversion_speed: 0.3, // Moderate mean reversion
            daily_amplitude: 0.3,
            steps_per_day: 288, // 5-minute samples
            burst_probability: 0.01,
            max_millicores,
        }
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    pub fn with_daily_cycle(mut self, amplitude: f64, steps_per_day: usize) -> Self {
        self.daily_amplitude = amplitude;
        self.steps_per_day = steps_per_day;
        self
    }

    pub fn with_burst_probability(mut self, probability: f64) -> Self {
        self.burst_probability = probability;
        self
    }

    /// Generate `steps` time steps of demand for `workloads` pods
    pub fn generate<R: Rng + ?Sized>(
        &self,
        workloads: usize,
        steps: usize,
        rng: &mut R,
    ) -> Result<DemandTable> {
        if !(self.mean_millicores.is_finite() && self.mean_millicores > 0.0) {
            return Err(PodshareError::config(format!(
                "mean demand must be > 0, got {}",
                self.mean_millicores
            )));
        }
        if self.steps_per_day == 0 {
            return Err(PodshareError::config("steps per day must be > 0"));
        }

        let mut columns = Vec::with_capacity(workloads);
        for _ in 0..workloads {
            // Pods range from a quarter to twice the typical size
            let baseline = self.mean_millicores * rng.gen_range(0.25..2.0);
            // Not every pod peaks at the same time of day
            let phase = rng.gen_range(0.0..std::f64::consts::TAU);
            columns.push(self.pod_series(baseline, phase, steps, rng));
        }

        let rows = (0..steps)
            .map(|t| columns.iter().map(|c| c[t]).collect())
            .collect();
        DemandTable::new(rows)
    }

    fn pod_series<R: Rng + ?Sized>(
        &self,
        baseline: f64,
        phase: f64,
        steps: usize,
        rng: &mut R,
    ) -> Vec<u32> {
        let mut current = baseline;
        let mut series = Vec::with_capacity(steps);

        for t in 0..steps {
            // dX = θ(μ - X)dt + σdW with dt = 1 step
            let dw: f64 = StandardNormal.sample(rng);
            current += self.mean_reversion_speed * (baseline - current)
                + self.volatility * baseline * dw;

            let angle = std::f64::consts::TAU * t as f64 / self.steps_per_day as f64 + phase;
            let daily_factor = 1.0 + self.daily_amplitude * angle.sin();

            let mut demand = current * daily_factor;
            if rng.gen_bool(self.burst_probability.clamp(0.0, 1.0)) {
                demand *= rng.gen_range(2.0..4.0);
            }

            series.push(demand.clamp(0.0, self.max_millicores as f64).round() as u32);
        }

        series
    }

    /// Constant demand for every pod (deterministic, for testing)
    pub fn generate_flat(workloads: usize, steps: usize, millicores: u32) -> Result<DemandTable> {
        DemandTable::new(vec![vec![millicores; workloads]; steps])
    }
}
