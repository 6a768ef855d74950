//! Typed errors which callers may need to tell apart.
//!
//! Errors are generally passed around as [`anyhow::Error`]; the types here are wrapped inside and
//! recovered with `downcast_ref` where the distinction matters (e.g. in the rolling scheduler).
use chrono::NaiveDateTime;
use derive_more::{Display, Error};
use std::path::PathBuf;

/// The model configuration is invalid. Fatal.
#[derive(Debug, Display, Error, PartialEq)]
#[display("Invalid model configuration in {}", model_path.display())]
pub struct ConfigurationError {
    /// Path to the model directory
    pub model_path: PathBuf,
}

/// Required exogenous data is missing for a period. Fatal for the run.
#[derive(Debug, Display, Error, PartialEq)]
#[display("Missing {what} for {datetime}")]
pub struct DataGapError {
    /// Description of the missing data
    pub what: String,
    /// The hour for which data is missing
    pub datetime: NaiveDateTime,
}

/// A horizon could not be solved
#[derive(Debug, Display, Error, PartialEq)]
pub enum HorizonSolveError {
    /// There is no dispatch which satisfies the hard constraints
    #[display("No feasible dispatch for horizon starting at {horizon_start}: {reason}")]
    Infeasible {
        /// The first hour of the horizon
        horizon_start: NaiveDateTime,
        /// What was found to be infeasible
        reason: String,
    },
    /// The solver ran out of time
    #[display("Solver reached its time limit of {time_limit}s for horizon starting at {horizon_start}")]
    Timeout {
        /// The first hour of the horizon
        horizon_start: NaiveDateTime,
        /// The time limit in seconds
        time_limit: f64,
    },
    /// The solver stopped for some other reason (e.g. numerical trouble)
    #[display("Solver failed for horizon starting at {horizon_start} with status {status}")]
    SolverFailure {
        /// The first hour of the horizon
        horizon_start: NaiveDateTime,
        /// The status reported by the solver
        status: String,
    },
}

impl HorizonSolveError {
    /// A short label for the failure, used in output files
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Infeasible { .. } => "infeasible",
            Self::Timeout { .. } => "timeout",
            Self::SolverFailure { .. } => "solver_failure",
        }
    }

    /// Whether a retry with relaxed bounds may help
    pub fn is_relaxable(&self) -> bool {
        matches!(self, Self::Infeasible { .. } | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn hour() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_solve_error_downcast() {
        let err: anyhow::Error = HorizonSolveError::Timeout {
            horizon_start: hour(),
            time_limit: 5.0,
        }
        .into();
        let err = err.context("Failed to solve");
        let inner = err.downcast_ref::<HorizonSolveError>().unwrap();
        assert_eq!(inner.kind(), "timeout");
        assert!(inner.is_relaxable());
    }

    #[test]
    fn test_data_gap_message() {
        let err = DataGapError {
            what: "spot price".into(),
            datetime: hour(),
        };
        assert_eq!(err.to_string(), "Missing spot price for 2019-03-01 12:00:00");
    }
}
