//! Parity-to-MIP linearization.
//!
//! Finding the key that minimizes disagreement with the answers is
//! `min_s sum_j |(A[j]·s mod 2) - b[j]|`. Solvers have no mod operator, so
//! each row j gets
//!
//! - an integer quotient `y_j >= 0`,
//! - a remainder `h_j in [0, 2 - eps]`,
//! - a slack `z_j >= 0` bounding `|h_j - b_j|`,
//!
//! subject to `sum_i A[j,i]·s_i = 2·y_j + h_j`, `h_j - b_j <= z_j` and
//! `b_j - h_j <= z_j`, minimizing `sum_j z_j`. With s and y integral, the
//! equality forces h_j to be an integer below 2, i.e. the row parity, so the
//! optimum equals the Hamming disagreement.

use std::time::{Duration, Instant};

use good_lp::{
    constraint, highs, variable, Expression, ProblemVariables, Solution, SolutionStatus,
    SolverModel, Variable,
};
use serde::{Deserialize, Serialize};

use super::error::RecoveryError;
use super::{KeyRecovery, Recovered, RecoveryStatus};
use crate::lpn::acceptance::{disagreement, AcceptanceTest};
use crate::lpn::bits::{BitVector, BitsError};
use crate::lpn::instance::LpnInstance;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MipConfig {
    /// Remainder upper bound is 2 - eps
    pub remainder_epsilon: f64,
}

impl Default for MipConfig {
    fn default() -> Self {
        Self {
            remainder_epsilon: 0.5,
        }
    }
}

impl MipConfig {
    pub fn validate(&self) -> Result<(), RecoveryError> {
        let eps = self.remainder_epsilon;
        if !(eps > 0.0 && eps <= 1.0) {
            return Err(RecoveryError::Epsilon(eps));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolveStatus {
    Optimal,
    /// Budget ran out; the key is the incumbent, not a proven optimum
    TimeLimit,
}

#[derive(Clone, Debug)]
pub struct MipOutcome {
    pub key: BitVector,
    pub status: SolveStatus,
    /// Objective of `key` as reported by the solver
    pub solver_objective: f64,
    /// Disagreement of `key` recomputed directly from the instance
    pub disagreement: usize,
    pub elapsed: Duration,
}

/// The MIP strategy.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParityProgram {
    pub config: MipConfig,
}

impl ParityProgram {
    pub fn new(config: MipConfig) -> Self {
        Self { config }
    }

    /// Solve with a wall-clock budget, enforced by the solver's own time
    /// limit. On the limit the key is the solver's incumbent, which always
    /// exists: the all-zero point (y = h = 0, z = b) is feasible.
    pub fn solve(
        &self,
        instance: &LpnInstance,
        budget: Duration,
    ) -> Result<MipOutcome, RecoveryError> {
        self.config.validate()?;
        let formulation = Formulation::from_instance(instance, self.config.remainder_epsilon);
        tracing::debug!(
            "parity program: {} key vars, {} rows, {} nonzeros",
            formulation.n,
            formulation.rows.len(),
            formulation.rows.iter().map(|r| r.support.len()).sum::<usize>()
        );

        let start = Instant::now();
        let solution = formulation.solve(None, Some(budget))?;
        let elapsed = start.elapsed();
        if solution.status == SolveStatus::TimeLimit {
            tracing::warn!(
                "parity program hit the {:.1}s budget, returning incumbent with objective {}",
                budget.as_secs_f64(),
                solution.objective
            );
        }

        let disagreement = disagreement(instance, &solution.key)?;
        // an incumbent may carry loose slacks; an optimum may not
        if solution.status == SolveStatus::Optimal
            && (solution.objective - disagreement as f64).abs() > 1e-6
        {
            tracing::warn!(
                "solver objective {} differs from recomputed disagreement {disagreement}",
                solution.objective
            );
        }

        Ok(MipOutcome {
            key: solution.key,
            status: solution.status,
            solver_objective: solution.objective,
            disagreement,
            elapsed,
        })
    }

    /// Optimal value of the program with the key variables pinned to `key`.
    /// Equals `disagreement(instance, key)` when the linearization is exact.
    pub fn objective_for_key(
        &self,
        instance: &LpnInstance,
        key: &BitVector,
    ) -> Result<f64, RecoveryError> {
        self.config.validate()?;
        if key.len() != instance.key_len() {
            return Err(BitsError::LengthMismatch {
                left: instance.key_len(),
                right: key.len(),
            }
            .into());
        }
        let formulation = Formulation::from_instance(instance, self.config.remainder_epsilon);
        Ok(formulation.solve(Some(key), None)?.objective)
    }
}

impl KeyRecovery for ParityProgram {
    fn name(&self) -> &'static str {
        "mip"
    }

    fn recover(
        &self,
        instance: &LpnInstance,
        _test: &AcceptanceTest,
        budget: Duration,
    ) -> Result<Recovered, RecoveryError> {
        let outcome = self.solve(instance, budget)?;
        let status = match outcome.status {
            SolveStatus::Optimal => RecoveryStatus::Optimal,
            SolveStatus::TimeLimit => RecoveryStatus::TimeLimit,
        };
        Ok(Recovered {
            key: outcome.key,
            status,
            candidates_tried: None,
            solver_objective: Some(outcome.solver_objective),
        })
    }
}

struct Row {
    /// Columns with A[j,i] = 1
    support: Vec<usize>,
    answer: bool,
}

/// Rows of the instance in the shape the model is built from.
struct Formulation {
    n: usize,
    epsilon: f64,
    rows: Vec<Row>,
}

struct RowVars {
    quotient: Variable,
    remainder: Variable,
    slack: Variable,
}

struct FormulationSolution {
    key: BitVector,
    objective: f64,
    status: SolveStatus,
}

impl Formulation {
    fn from_instance(instance: &LpnInstance, epsilon: f64) -> Self {
        let rows = instance
            .questions
            .iter_rows()
            .enumerate()
            .map(|(j, row)| Row {
                support: row.support(),
                answer: instance.answers.get(j),
            })
            .collect();
        Self {
            n: instance.key_len(),
            epsilon,
            rows,
        }
    }

    fn solve(
        &self,
        fixed_key: Option<&BitVector>,
        time_limit: Option<Duration>,
    ) -> Result<FormulationSolution, RecoveryError> {
        let mut vars = ProblemVariables::new();
        let key: Vec<Variable> = (0..self.n).map(|_| vars.add(variable().binary())).collect();
        let row_vars: Vec<RowVars> = self
            .rows
            .iter()
            .map(|row| RowVars {
                quotient: vars.add(variable().integer().min(0).max((row.support.len() / 2) as f64)),
                remainder: vars.add(variable().min(0).max(2.0 - self.epsilon)),
                slack: vars.add(variable().min(0)),
            })
            .collect();

        let objective: Expression = row_vars.iter().map(|r| r.slack).sum();
        let mut model = vars.minimise(objective).using(highs);
        model.set_verbose(false);
        if let Some(limit) = time_limit {
            model = model.set_time_limit(limit.as_secs_f64());
        }

        for (row, rv) in self.rows.iter().zip(row_vars.iter()) {
            let b = if row.answer { 1.0 } else { 0.0 };
            let dot: Expression = row.support.iter().map(|&i| key[i]).sum();
            model = model
                .with(constraint!(dot == 2 * rv.quotient + rv.remainder))
                .with(constraint!(rv.remainder - b <= rv.slack))
                .with(constraint!(rv.remainder + rv.slack >= b));
        }

        if let Some(fixed) = fixed_key {
            for (i, &var) in key.iter().enumerate() {
                let bit = if fixed.get(i) { 1.0 } else { 0.0 };
                model = model.with(constraint!(var == bit));
            }
        }

        let solution = model.solve()?;
        let status = match solution.status() {
            SolutionStatus::TimeLimit => SolveStatus::TimeLimit,
            _ => SolveStatus::Optimal,
        };

        let support: Vec<usize> = key
            .iter()
            .enumerate()
            .filter_map(|(i, &var)| (solution.value(var) > 0.5).then_some(i))
            .collect();
        let objective = row_vars.iter().map(|r| solution.value(r.slack)).sum();

        Ok(FormulationSolution {
            key: BitVector::from_support(self.n, &support),
            objective,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lpn::bits::BitMatrix;
    use crate::lpn::instance::LpnSample;
    use crate::lpn::params::{LpnParams, SampleRule, Slack};
    use itertools::Itertools;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    const BUDGET: Duration = Duration::from_secs(60);

    fn all_keys(n: usize) -> impl Iterator<Item = BitVector> {
        (0..n)
            .map(|_| [0u8, 1u8])
            .multi_cartesian_product()
            .map(|bits| BitVector::from_bits(&bits))
    }

    fn random_instance(n: usize, m: usize, rng: &mut ChaCha20Rng) -> LpnInstance {
        let questions = BitMatrix::random(m, n, rng);
        let answers = BitVector::random(m, rng);
        LpnInstance::new(questions, answers, 0.25).unwrap()
    }

    #[test]
    fn test_pinned_objective_equals_disagreement() {
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        let program = ParityProgram::default();
        for n in 2..=4 {
            for m in [4, 6, 8] {
                let instance = random_instance(n, m, &mut rng);
                for key in all_keys(n) {
                    let objective = program.objective_for_key(&instance, &key).unwrap();
                    let direct = disagreement(&instance, &key).unwrap();
                    assert!(
                        (objective - direct as f64).abs() < 1e-6,
                        "n={n} m={m} key={key}: objective {objective} vs disagreement {direct}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_optimum_matches_exhaustive_minimum() {
        let mut rng = ChaCha20Rng::seed_from_u64(22);
        let program = ParityProgram::default();
        for n in 2..=4 {
            for m in [4, 5, 7, 8] {
                let instance = random_instance(n, m, &mut rng);
                let best = all_keys(n)
                    .map(|k| disagreement(&instance, &k).unwrap())
                    .min()
                    .unwrap();
                let outcome = program.solve(&instance, BUDGET).unwrap();
                assert_eq!(outcome.status, SolveStatus::Optimal);
                assert_eq!(outcome.disagreement, best);
                assert!((outcome.solver_objective - best as f64).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_recovers_small_key() {
        let mut rng = ChaCha20Rng::seed_from_u64(23);
        let params = LpnParams::new(4, 0.05, SampleRule::Advantage, Slack::RootNm).unwrap();
        assert_eq!(params.m, 79);
        let secret = BitVector::from_bits(&[1, 1, 0, 1]);
        let sample = LpnSample::with_secret(&params, secret, &mut rng);

        let outcome = ParityProgram::default()
            .solve(&sample.instance, BUDGET)
            .unwrap();
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert!(outcome.disagreement <= params.threshold);
        // the optimum can never be worse than the true key
        assert!(outcome.disagreement <= sample.noise.weight());
    }

    #[test]
    fn test_time_limit_returns_solver_incumbent() {
        let mut rng = ChaCha20Rng::seed_from_u64(24);
        let params = LpnParams::new(48, 0.125, SampleRule::Power, Slack::RootNm).unwrap();
        let sample = LpnSample::generate(&params, &mut rng);
        let budget = Duration::from_millis(200);

        let outcome = ParityProgram::default()
            .solve(&sample.instance, budget)
            .unwrap();
        assert_eq!(outcome.status, SolveStatus::TimeLimit);
        assert_eq!(outcome.key.len(), 48);
        // the solver stops itself; generous margin for model setup
        assert!(outcome.elapsed < budget + Duration::from_secs(5), "{:?}", outcome.elapsed);
        assert_eq!(
            outcome.disagreement,
            disagreement(&sample.instance, &outcome.key).unwrap()
        );
        // any feasible point has z_j >= |parity_j - b_j|
        assert!(
            outcome.solver_objective >= outcome.disagreement as f64 - 1e-6,
            "objective {} vs disagreement {}",
            outcome.solver_objective,
            outcome.disagreement
        );

        let recovered = ParityProgram::default()
            .recover(&sample.instance, &AcceptanceTest::from_params(&params), budget)
            .unwrap();
        assert_eq!(recovered.status, RecoveryStatus::TimeLimit);
        assert!(recovered.solver_objective.is_some());
    }

    #[test]
    fn test_rejects_bad_epsilon() {
        let mut rng = ChaCha20Rng::seed_from_u64(25);
        let instance = random_instance(3, 6, &mut rng);
        for eps in [0.0, -0.5, 1.5, f64::NAN] {
            let program = ParityProgram::new(MipConfig {
                remainder_epsilon: eps,
            });
            assert!(matches!(
                program.solve(&instance, BUDGET),
                Err(RecoveryError::Epsilon(_))
            ));
        }
    }

    #[test]
    fn test_empty_rows_are_handled() {
        let questions = BitMatrix::from_rows(
            3,
            vec![
                BitVector::zeros(3),
                BitVector::from_bits(&[1, 0, 0]),
                BitVector::from_bits(&[0, 1, 1]),
                BitVector::zeros(3),
            ],
        )
        .unwrap();
        let answers = BitVector::from_bits(&[1, 1, 0, 0]);
        let instance = LpnInstance::new(questions, answers, 0.1).unwrap();
        let outcome = ParityProgram::default().solve(&instance, BUDGET).unwrap();
        // first row can never agree
        assert_eq!(outcome.disagreement, 1);
        assert!(outcome.key.get(0));
    }
}
