//! Sweep configuration file
//!
//! A JSON document describing where the demand series comes from, which runs
//! to execute and where to write results. Every field has a default, so `{}`
//! is a valid configuration: a synthetic series swept over the standard
//! percentiles.

use std::fs;
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use podshare_core::{PodshareError, Result, WorkloadId};

use crate::series::{DelimitedFormat, DemandTable};
use crate::simulation::{DEFAULT_LOW_COMPLETION_THRESHOLD, Execution};
use crate::sweep::{RunSpec, Sweep};
use crate::synthetic::DemandGenerator;

/// Top-level sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Delimited demand file; a synthetic series is generated when absent
    #[serde(default)]
    pub series: Option<PathBuf>,

    /// Cell delimiter of the demand file
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Shape of the synthetic series
    #[serde(default)]
    pub synthetic: SyntheticConfig,

    /// Runs to execute, in order
    #[serde(default = "default_runs")]
    pub runs: Vec<RunSpec>,

    /// Seed for runs (and the synthetic series) that do not set one
    #[serde(default)]
    pub seed: Option<u64>,

    /// Average completion below which throttled steps are logged
    #[serde(default = "default_low_completion_threshold")]
    pub low_completion_threshold: f64,

    /// Run the sweep on the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// JSON file receiving the run summaries
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Per-workload comparison export
    #[serde(default)]
    pub timeline: Option<TimelineConfig>,
}

/// Synthetic demand series parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    #[serde(default = "default_synthetic_workloads")]
    pub workloads: usize,

    #[serde(default = "default_synthetic_steps")]
    pub steps: usize,

    #[serde(default = "default_mean_millicores")]
    pub mean_millicores: f64,

    #[serde(default = "default_max_millicores")]
    pub max_millicores: u32,
}

/// Window of one workload compared across every run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    pub workload: usize,

    #[serde(default)]
    pub skip: usize,

    #[serde(default = "default_timeline_limit")]
    pub limit: usize,

    pub output: PathBuf,
}

fn default_delimiter() -> char {
    ';'
}

fn default_runs() -> Vec<RunSpec> {
    Sweep::standard().specs().to_vec()
}

fn default_low_completion_threshold() -> f64 {
    DEFAULT_LOW_COMPLETION_THRESHOLD
}

fn default_parallel() -> bool {
    true
}

fn default_synthetic_workloads() -> usize {
    50
}

fn default_synthetic_steps() -> usize {
    288
}

fn default_mean_millicores() -> f64 {
    500.0
}

fn default_max_millicores() -> u32 {
    4000
}

fn default_timeline_limit() -> usize {
    100
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            workloads: default_synthetic_workloads(),
            steps: default_synthetic_steps(),
            mean_millicores: default_mean_millicores(),
            max_millicores: default_max_millicores(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            series: None,
            delimiter: default_delimiter(),
            synthetic: SyntheticConfig::default(),
            runs: default_runs(),
            seed: None,
            low_completion_threshold: default_low_completion_threshold(),
            parallel: default_parallel(),
            output: None,
            timeline: None,
        }
    }
}

impl SweepConfig {
    /// Parse a configuration file.
    ///
    /// Values are not range-checked here; call [`validate`](Self::validate)
    /// once any overrides have been applied.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Set the demand file
    pub fn with_series(mut self, path: impl Into<PathBuf>) -> Self {
        self.series = Some(path.into());
        self
    }

    /// Set the runs
    pub fn with_runs(mut self, runs: Vec<RunSpec>) -> Self {
        self.runs = runs;
        self
    }

    /// Set the default seed
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Set the summary output file
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.delimiter.is_ascii_digit() || self.delimiter == '-' {
            return Err(PodshareError::config(format!(
                "delimiter {:?} cannot separate numbers",
                self.delimiter
            )));
        }
        if !(0.0..=1.0).contains(&self.low_completion_threshold) {
            return Err(PodshareError::config(format!(
                "low completion threshold must be within [0, 1], got {}",
                self.low_completion_threshold
            )));
        }
        if self.series.is_none() && (self.synthetic.workloads == 0 || self.synthetic.steps == 0) {
            return Err(PodshareError::EmptySeries);
        }
        if let Some(timeline) = &self.timeline {
            if timeline.limit == 0 {
                return Err(PodshareError::config("timeline limit must be > 0"));
            }
        }
        self.sweep().validate()
    }

    pub fn execution(&self) -> Execution {
        if self.parallel {
            Execution::Parallel
        } else {
            Execution::Sequential
        }
    }

    /// Read the demand file, or generate the synthetic series
    pub fn load_series(&self) -> Result<DemandTable> {
        if let Some(path) = &self.series {
            let format = DelimitedFormat {
                delimiter: self.delimiter,
                ..DelimitedFormat::default()
            };
            return format.load(path);
        }

        let generator =
            DemandGenerator::new(self.synthetic.mean_millicores, self.synthetic.max_millicores);
        match self.seed {
            Some(seed) => generator.generate(
                self.synthetic.workloads,
                self.synthetic.steps,
                &mut ChaCha8Rng::seed_from_u64(seed),
            ),
            None => generator.generate(
                self.synthetic.workloads,
                self.synthetic.steps,
                &mut rand::thread_rng(),
            ),
        }
    }

    pub fn sweep(&self) -> Sweep {
        Sweep::new(self.runs.clone())
            .with_execution(self.execution())
            .with_seed(self.seed)
    }

    pub fn timeline_workload(&self) -> Option<WorkloadId> {
        self.timeline.as_ref().map(|t| WorkloadId(t.workload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podshare_core::{DemandSeries, HostCapacity};

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: SweepConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config.delimiter, ';');
        assert_eq!(config.runs.len(), 12);
        assert_eq!(config.low_completion_threshold, 0.90);
        assert!(config.parallel);
        assert_eq!(config.synthetic.workloads, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_document() {
        let config: SweepConfig = serde_json::from_str(
            r#"{
                "series": "cpu.csv",
                "delimiter": ",",
                "runs": [
                    {"label": "P95", "percentile": 95, "capacity": {"fixed": 12000}, "seed": 7}
                ],
                "low_completion_threshold": 0.5,
                "parallel": false,
                "output": "summary.json",
                "timeline": {"workload": 3, "output": "pod3.csv"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.series, Some(PathBuf::from("cpu.csv")));
        assert_eq!(config.delimiter, ',');
        assert_eq!(config.runs[0].capacity, HostCapacity::Fixed(12000));
        assert_eq!(config.execution(), Execution::Sequential);
        let timeline = config.timeline.as_ref().unwrap();
        assert_eq!(timeline.skip, 0);
        assert_eq!(timeline.limit, 100);
        assert_eq!(config.timeline_workload(), Some(WorkloadId(3)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = SweepConfig::default();
        config.low_completion_threshold = 1.5;
        assert!(config.validate().is_err());

        let config = SweepConfig::default().with_runs(vec![RunSpec::percentile(101)]);
        assert!(matches!(
            config.validate(),
            Err(PodshareError::InvalidPercentile(101))
        ));

        let mut config = SweepConfig::default();
        config.delimiter = '5';
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builders() {
        let config = SweepConfig::default()
            .with_series("trace.csv")
            .with_output("out/summary.json")
            .with_seed(Some(5));

        assert_eq!(config.series, Some(PathBuf::from("trace.csv")));
        assert_eq!(config.output, Some(PathBuf::from("out/summary.json")));
        assert_eq!(config.sweep().specs().len(), 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_seeded_synthetic_series_is_reproducible() {
        let mut config = SweepConfig::default().with_seed(Some(21));
        config.synthetic.workloads = 4;
        config.synthetic.steps = 24;

        let a = config.load_series().unwrap();
        let b = config.load_series().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.series_len(), 24);
        assert_eq!(a.workload_count(), 4);
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("podshare-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sweep.json");
        fs::write(&path, r#"{"runs": [{"label": "P50", "percentile": 50}]}"#).unwrap();

        let config = SweepConfig::load(&path).unwrap();
        assert_eq!(config.runs.len(), 1);
        assert_eq!(config.sweep().specs()[0].label, "P50");

        // Out-of-range values parse, and can still be overridden before validation
        fs::write(&path, r#"{"low_completion_threshold": -1}"#).unwrap();
        let mut config = SweepConfig::load(&path).unwrap();
        assert!(config.validate().is_err());
        config.low_completion_threshold = 0.75;
        assert!(config.validate().is_ok());

        fs::write(&path, r#"{"runs": "P50"}"#).unwrap();
        assert!(matches!(SweepConfig::load(&path), Err(PodshareError::Json(_))));

        fs::remove_dir_all(&dir).unwrap();
    }
}
