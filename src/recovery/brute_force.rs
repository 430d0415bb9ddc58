use std::time::{Duration, Instant};

use itertools::Itertools;

use super::error::RecoveryError;
use super::{KeyRecovery, Recovered, RecoveryStatus};
use crate::lpn::acceptance::{disagreement, AcceptanceTest};
use crate::lpn::bits::BitVector;
use crate::lpn::instance::LpnInstance;

/// Widest key [`BruteForce::minimum`] will enumerate completely.
pub const EXHAUSTIVE_MAX_BITS: usize = 24;

/// Enumeration baseline: candidates by increasing Hamming weight, and within a
/// weight by lexicographic order of the 1-bit positions.
#[derive(Clone, Copy, Debug, Default)]
pub struct BruteForce;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BruteForceOutcome {
    /// First candidate that passed the acceptance test
    Accepted {
        key: BitVector,
        disagreement: usize,
        tried: u64,
    },
    /// Budget expired; `last` is the last candidate tried and was NOT accepted
    BudgetExhausted { last: BitVector, tried: u64 },
    /// Every key was tried and none passed; `best` has the lowest disagreement
    SpaceExhausted {
        best: BitVector,
        best_disagreement: usize,
        tried: u64,
    },
}

impl BruteForceOutcome {
    pub fn key(&self) -> &BitVector {
        match self {
            Self::Accepted { key, .. } => key,
            Self::BudgetExhausted { last, .. } => last,
            Self::SpaceExhausted { best, .. } => best,
        }
    }

    pub fn tried(&self) -> u64 {
        match self {
            Self::Accepted { tried, .. }
            | Self::BudgetExhausted { tried, .. }
            | Self::SpaceExhausted { tried, .. } => *tried,
        }
    }
}

/// All keys of length `n` in search order.
pub fn candidates(n: usize) -> impl Iterator<Item = BitVector> {
    (0..=n).flat_map(move |weight| {
        (0..n)
            .combinations(weight)
            .map(move |support| BitVector::from_support(n, &support))
    })
}

impl BruteForce {
    /// Walk candidates until one passes `test` or `budget` runs out.
    /// At least one candidate is always tried. A budget past the end of
    /// representable time means no deadline.
    pub fn search(
        &self,
        instance: &LpnInstance,
        test: &AcceptanceTest,
        budget: Duration,
    ) -> Result<BruteForceOutcome, RecoveryError> {
        let deadline = Instant::now().checked_add(budget);
        let mut tried = 0u64;
        let mut best: Option<(BitVector, usize)> = None;

        for candidate in candidates(instance.key_len()) {
            let d = disagreement(instance, &candidate)?;
            tried += 1;

            if test.accepts(d) {
                tracing::debug!("candidate {candidate} accepted after {tried} tries");
                return Ok(BruteForceOutcome::Accepted {
                    key: candidate,
                    disagreement: d,
                    tried,
                });
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::warn!(
                    "enumeration hit the {:.1}s budget after {tried} candidates (weight {})",
                    budget.as_secs_f64(),
                    candidate.weight()
                );
                return Ok(BruteForceOutcome::BudgetExhausted {
                    last: candidate,
                    tried,
                });
            }
            if best.as_ref().map_or(true, |(_, bd)| d < *bd) {
                best = Some((candidate, d));
            }
        }

        // n = 0 yields exactly one (empty) candidate, so `best` is set
        let (best, best_disagreement) = best.ok_or_else(|| {
            RecoveryError::Solver("enumeration produced no candidates".to_string())
        })?;
        Ok(BruteForceOutcome::SpaceExhausted {
            best,
            best_disagreement,
            tried,
        })
    }

    /// Key with the lowest disagreement over the whole key space; ties go to
    /// the earliest candidate in search order.
    pub fn minimum(&self, instance: &LpnInstance) -> Result<(BitVector, usize), RecoveryError> {
        let n = instance.key_len();
        if n > EXHAUSTIVE_MAX_BITS {
            return Err(RecoveryError::KeyTooLong {
                n,
                max: EXHAUSTIVE_MAX_BITS,
            });
        }
        let mut best: Option<(BitVector, usize)> = None;
        for candidate in candidates(n) {
            let d = disagreement(instance, &candidate)?;
            if best.as_ref().map_or(true, |(_, bd)| d < *bd) {
                best = Some((candidate, d));
            }
        }
        best.ok_or_else(|| RecoveryError::Solver("enumeration produced no candidates".to_string()))
    }
}

impl KeyRecovery for BruteForce {
    fn name(&self) -> &'static str {
        "brute-force"
    }

    fn recover(
        &self,
        instance: &LpnInstance,
        test: &AcceptanceTest,
        budget: Duration,
    ) -> Result<Recovered, RecoveryError> {
        let outcome = self.search(instance, test, budget)?;
        let tried = outcome.tried();
        let (key, status) = match outcome {
            BruteForceOutcome::Accepted { key, .. } => (key, RecoveryStatus::Accepted),
            BruteForceOutcome::BudgetExhausted { last, .. } => {
                (last, RecoveryStatus::BudgetExhausted)
            }
            BruteForceOutcome::SpaceExhausted { best, .. } => (best, RecoveryStatus::SpaceExhausted),
        };
        Ok(Recovered {
            key,
            status,
            candidates_tried: Some(tried),
            solver_objective: None,
        })
    }
}
