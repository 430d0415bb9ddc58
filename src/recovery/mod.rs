pub mod brute_force;
pub mod error;
pub mod mip;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lpn::acceptance::AcceptanceTest;
use crate::lpn::bits::BitVector;
use crate::lpn::instance::LpnInstance;
use crate::lpn::params::ParamsError;

pub use brute_force::{BruteForce, BruteForceOutcome};
pub use error::{ErrorKind, RecoveryError};
pub use mip::{MipConfig, MipOutcome, ParityProgram, SolveStatus};

/// How a strategy stopped. The variant says nothing about whether the key
/// passes the acceptance test; callers re-run the test on `Recovered::key`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryStatus {
    /// MIP solved to optimality
    Optimal,
    /// MIP hit the budget; key is the solver's incumbent
    TimeLimit,
    /// Enumeration found a candidate that passed the test
    Accepted,
    /// Enumeration ran out of time; key is the last candidate tried, unverified
    BudgetExhausted,
    /// Enumeration tried every key without an accepted one
    SpaceExhausted,
}

impl RecoveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimal => "optimal",
            Self::TimeLimit => "time-limit",
            Self::Accepted => "accepted",
            Self::BudgetExhausted => "budget-exhausted",
            Self::SpaceExhausted => "space-exhausted",
        }
    }

    pub fn hit_budget(&self) -> bool {
        matches!(self, Self::TimeLimit | Self::BudgetExhausted)
    }
}

impl fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate key returned by a strategy, with how it was obtained.
#[derive(Clone, Debug)]
pub struct Recovered {
    pub key: BitVector,
    pub status: RecoveryStatus,
    /// Candidates evaluated (enumeration only)
    pub candidates_tried: Option<u64>,
    /// Objective reported by the solver (MIP only)
    pub solver_objective: Option<f64>,
}

/// A key-recovery strategy: sees only the public instance and the threshold.
pub trait KeyRecovery: Send + Sync {
    fn name(&self) -> &'static str;

    fn recover(
        &self,
        instance: &LpnInstance,
        test: &AcceptanceTest,
        budget: Duration,
    ) -> Result<Recovered, RecoveryError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Mip,
    BruteForce,
}

impl Strategy {
    pub fn build(&self, mip: MipConfig) -> Box<dyn KeyRecovery> {
        match self {
            Self::Mip => Box::new(ParityProgram::new(mip)),
            Self::BruteForce => Box::new(BruteForce),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mip => "mip",
            Self::BruteForce => "brute-force",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mip" => Ok(Self::Mip),
            "brute-force" | "brute" => Ok(Self::BruteForce),
            _ => Err(ParamsError::Parse {
                what: "strategy",
                input: s.to_string(),
            }),
        }
    }
}
