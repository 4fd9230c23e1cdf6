//! Core types shared across Podshare components

use serde::{Deserialize, Serialize};

use crate::error::{PodshareError, Result};

/// Index of a workload (pod) in a run, equal to its column in the demand series
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkloadId(pub usize);

impl WorkloadId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for WorkloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Index of a time step in a run, equal to its row in the demand series
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeStepId(pub usize);

impl TimeStepId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for TimeStepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Parameters used to derive request/limit from demand history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingParams {
    /// Percentile of the demand history used as the request base (0-100)
    pub percentile: u32,

    /// Multiplier applied to the percentile value to get the request
    #[serde(default = "default_request_factor")]
    pub request_factor: f64,

    /// Multiplier applied to the request to get the limit (no limit when absent)
    #[serde(default)]
    pub limit_factor: Option<f64>,
}

fn default_request_factor() -> f64 {
    1.0
}

impl SizingParams {
    /// Size at a percentile with request factor 1.0 and no limit
    pub fn percentile(percentile: u32) -> Self {
        Self {
            percentile,
            request_factor: default_request_factor(),
            limit_factor: None,
        }
    }

    /// Set the request factor
    pub fn with_request_factor(mut self, request_factor: f64) -> Self {
        self.request_factor = request_factor;
        self
    }

    /// Set the limit factor
    pub fn with_limit_factor(mut self, limit_factor: Option<f64>) -> Self {
        self.limit_factor = limit_factor;
        self
    }

    /// Check every parameter, naming the first one that is out of range
    pub fn validate(&self) -> Result<()> {
        if self.percentile > 100 {
            return Err(PodshareError::InvalidPercentile(self.percentile));
        }
        if !(self.request_factor.is_finite() && self.request_factor > 0.0) {
            return Err(PodshareError::InvalidRequestFactor(self.request_factor));
        }
        if let Some(limit_factor) = self.limit_factor {
            if !(limit_factor.is_finite() && limit_factor >= 1.0) {
                return Err(PodshareError::InvalidLimitFactor(limit_factor));
            }
        }
        Ok(())
    }
}

impl Default for SizingParams {
    fn default() -> Self {
        Self::percentile(50)
    }
}

/// How much CPU the simulated host has at every time step (millicores)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HostCapacity {
    /// Host sized to exactly the sum of all workload requests
    #[default]
    SumOfRequests,

    /// Fixed capacity in millicores
    Fixed(i64),
}

impl HostCapacity {
    /// Resolve to a concrete capacity once the requests are known
    pub fn resolve(self, sum_of_requests: u64) -> Result<u64> {
        match self {
            HostCapacity::SumOfRequests => Ok(sum_of_requests),
            HostCapacity::Fixed(millicores) => {
                u64::try_from(millicores).map_err(|_| PodshareError::NegativeCapacity(millicores))
            }
        }
    }
}

impl std::fmt::Display for HostCapacity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostCapacity::SumOfRequests => write!(f, "sum-of-requests"),
            HostCapacity::Fixed(millicores) => write!(f, "{}m", millicores),
        }
    }
}
