//! Error types for Podshare

use thiserror::Error;

/// Podshare result type
pub type Result<T> = std::result::Result<T, PodshareError>;

/// Errors raised by the simulator and its collaborators
///
/// Everything except `InvariantViolation` is an input validation error and is
/// raised before any time step is allocated.
#[derive(Error, Debug)]
pub enum PodshareError {
    /// The demand series has no time steps or no workloads
    #[error("Demand series is empty")]
    EmptySeries,

    /// A row of the demand series has a different width than the first row
    #[error("Ragged demand series: row {row} has {found} columns, expected {expected}")]
    RaggedSeries {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A demand cell is negative
    #[error("Negative demand {value} at time step {row}, workload {column}")]
    NegativeDemand { row: usize, column: usize, value: i64 },

    /// A line of delimited text could not be parsed
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Percentile outside [0, 100]
    #[error("Percentile must be within [0, 100], got {0}")]
    InvalidPercentile(u32),

    /// Request factor is not a positive finite number
    #[error("Request factor must be > 0, got {0}")]
    InvalidRequestFactor(f64),

    /// Limit factor would produce a limit below the request
    #[error("Limit factor must be >= 1.0, got {0}")]
    InvalidLimitFactor(f64),

    /// Host capacity is negative
    #[error("Host capacity must be >= 0, got {0}")]
    NegativeCapacity(i64),

    /// A run was started before its workloads were sized
    #[error("Workloads have not been sized")]
    NotSized,

    /// Results were requested from a run that has not been executed
    #[error("Simulation {0} has not been run")]
    NotRun(String),

    /// Every workload has a zero request, so the weighted pool is empty
    #[error("Weighted pool is empty at time step {time_step}: every workload has a zero request")]
    EmptyPool { time_step: usize },

    /// Workload id does not exist in the run
    #[error("Workload {0} not found")]
    UnknownWorkload(usize),

    /// The allocation engine broke one of its own invariants
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PodshareError {
    /// Create a parse error for a 1-based line number
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Create an invariant violation error
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors caused by malformed input or parameters
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            Self::InvariantViolation(_) | Self::Io(_) | Self::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_told_apart() {
        assert!(PodshareError::InvalidPercentile(101).is_validation());
        assert!(PodshareError::EmptyPool { time_step: 0 }.is_validation());
        assert!(PodshareError::NegativeCapacity(-1).is_validation());
        assert!(PodshareError::parse(3, "bad cell").is_validation());

        assert!(!PodshareError::invariant("granted past limit").is_validation());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(!PodshareError::from(io).is_validation());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PodshareError::parse(7, "invalid demand 'x'").to_string(),
            "Parse error on line 7: invalid demand 'x'"
        );
        assert_eq!(
            PodshareError::EmptyPool { time_step: 4 }.to_string(),
            "Weighted pool is empty at time step 4: every workload has a zero request"
        );
    }
}
