use good_lp::ResolutionError;
use serde::Serialize;

use crate::lpn::bits::BitsError;

#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("parity program is infeasible")]
    Infeasible,
    #[error("parity program is unbounded")]
    Unbounded,
    #[error("solver error: {0}")]
    Solver(String),
    #[error("remainder epsilon {0} outside (0, 1]")]
    Epsilon(f64),
    #[error("key length {n} exceeds exhaustive search limit of {max} bits")]
    KeyTooLong { n: usize, max: usize },
    #[error(transparent)]
    Dimension(#[from] BitsError),
}

/// Coarse category of a [`RecoveryError`], as written to the results table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Infeasible,
    Unbounded,
    Solver,
    InvalidConfig,
    KeyTooLong,
    Dimension,
}

impl RecoveryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Infeasible => ErrorKind::Infeasible,
            Self::Unbounded => ErrorKind::Unbounded,
            Self::Solver(_) => ErrorKind::Solver,
            Self::Epsilon(_) => ErrorKind::InvalidConfig,
            Self::KeyTooLong { .. } => ErrorKind::KeyTooLong,
            Self::Dimension(_) => ErrorKind::Dimension,
        }
    }
}

impl From<ResolutionError> for RecoveryError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::Infeasible => Self::Infeasible,
            ResolutionError::Unbounded => Self::Unbounded,
            other => Self::Solver(other.to_string()),
        }
    }
}
