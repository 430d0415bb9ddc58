use std::fmt;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Serialize, Serializer};

use crate::lpn::acceptance::AcceptanceTest;
use crate::lpn::instance::LpnSample;
use crate::lpn::params::LpnParams;
use crate::recovery::{ErrorKind, MipConfig, RecoveryStatus, Strategy};

/// One instance of one grid cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrialSpec {
    /// Position in the whole run; also the RNG stream
    pub id: usize,
    /// Replicate number within the cell
    pub replicate: usize,
    pub params: LpnParams,
}

/// How a strategy's run ended, as one results-table column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordStatus {
    Finished(RecoveryStatus),
    /// The strategy returned an error; the record's `error` says which
    Error,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finished(status) => status.as_str(),
            Self::Error => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    pub fn hit_budget(&self) -> bool {
        matches!(self, Self::Finished(status) if status.hit_budget())
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RecordStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One row of the results table: one strategy on one trial instance.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrialRecord {
    pub trial: usize,
    pub replicate: usize,
    pub strategy: Strategy,
    pub n: usize,
    pub m: usize,
    pub threshold: usize,
    pub noise_rate: f64,
    /// Weight of the actual noise realization
    pub noise_weight: usize,
    pub status: RecordStatus,
    /// Set iff `status` is `Error`
    pub error: Option<ErrorKind>,
    pub disagreement: Option<usize>,
    /// Recomputed acceptance verdict for the returned key
    pub accepted: bool,
    pub exact_match: bool,
    /// Fraction of key bits equal to the secret
    pub bit_accuracy: Option<f64>,
    pub candidates_tried: Option<u64>,
    pub elapsed_ms: f64,
}

impl TrialRecord {
    pub fn is_error(&self) -> bool {
        self.status.is_error()
    }

    pub fn hit_budget(&self) -> bool {
        self.status.hit_budget()
    }

    fn fail(&mut self, kind: ErrorKind) {
        self.status = RecordStatus::Error;
        self.error = Some(kind);
    }
}

/// RNG for a trial: the run seed picks the key, the trial id picks the stream.
pub fn trial_rng(seed: u64, id: usize) -> ChaCha20Rng {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    rng.set_stream(id as u64);
    rng
}

/// Generate the trial's instance and hand it to every strategy.
pub fn run_trial(
    spec: &TrialSpec,
    strategies: &[Strategy],
    mip: MipConfig,
    budget: Duration,
    seed: u64,
) -> Vec<TrialRecord> {
    let mut rng = trial_rng(seed, spec.id);
    let params = &spec.params;
    let sample = LpnSample::generate(params, &mut rng);
    let test = AcceptanceTest::from_params(params);
    let noise_weight = sample.noise.weight();

    strategies
        .iter()
        .map(|&strategy| {
            let recovery = strategy.build(mip);
            let start = Instant::now();
            let result = recovery.recover(&sample.instance, &test, budget);
            let elapsed_ms = start.elapsed().as_secs_f64() * 1e3;

            let mut record = TrialRecord {
                trial: spec.id,
                replicate: spec.replicate,
                strategy,
                n: params.n,
                m: params.m,
                threshold: params.threshold,
                noise_rate: params.noise_rate,
                noise_weight,
                status: RecordStatus::Error,
                error: None,
                disagreement: None,
                accepted: false,
                exact_match: false,
                bit_accuracy: None,
                candidates_tried: None,
                elapsed_ms,
            };

            let recovered = match result {
                Ok(recovered) => recovered,
                Err(e) => {
                    tracing::warn!(
                        "trial {} [{}] n={} p={}: {e}",
                        spec.id,
                        recovery.name(),
                        params.n,
                        params.noise_rate
                    );
                    record.fail(e.kind());
                    return record;
                }
            };

            record.status = RecordStatus::Finished(recovered.status);
            record.candidates_tried = recovered.candidates_tried;
            match test.evaluate(&sample.instance, &recovered.key) {
                Ok(verdict) => {
                    record.disagreement = Some(verdict.disagreement);
                    record.accepted = verdict.accepted;
                }
                Err(e) => {
                    tracing::warn!("trial {}: returned key has wrong shape: {e}", spec.id);
                    record.fail(ErrorKind::Dimension);
                    return record;
                }
            }
            record.exact_match = recovered.key == sample.secret;
            if let Ok(distance) = recovered.key.distance(&sample.secret) {
                record.bit_accuracy = Some(1.0 - distance as f64 / params.n as f64);
            }

            tracing::info!(
                "trial {} [{}] n={} m={} p={} tau={}: {} disagreement={} noise={} accepted={} exact={} ({:.1} ms)",
                spec.id,
                recovery.name(),
                params.n,
                params.m,
                params.noise_rate,
                params.threshold,
                record.status,
                record.disagreement.unwrap_or_default(),
                noise_weight,
                record.accepted,
                record.exact_match,
                elapsed_ms
            );
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lpn::params::{SampleRule, Slack};
    use rand::Rng;

    fn spec(n: usize, p: f64, samples: usize) -> TrialSpec {
        TrialSpec {
            id: 3,
            replicate: 0,
            params: LpnParams::new(n, p, SampleRule::Fixed { samples }, Slack::RootNm).unwrap(),
        }
    }

    #[test]
    fn test_trial_rng_streams_differ() {
        let a: u64 = trial_rng(5, 0).gen();
        let b: u64 = trial_rng(5, 1).gen();
        let a2: u64 = trial_rng(5, 0).gen();
        assert_ne!(a, b);
        assert_eq!(a, a2);
    }

    #[test]
    fn test_all_strategies_see_same_instance() {
        let records = run_trial(
            &spec(4, 0.05, 24),
            &[Strategy::Mip, Strategy::BruteForce],
            MipConfig::default(),
            Duration::from_secs(60),
            11,
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].noise_weight, records[1].noise_weight);
        for r in &records {
            assert!(!r.is_error());
            assert!(r.accepted, "{r:?}");
            assert!(r.disagreement.unwrap() <= r.threshold);
            assert!(r.bit_accuracy.is_some());
        }
        assert_eq!(
            records[0].status,
            RecordStatus::Finished(RecoveryStatus::Optimal)
        );
        assert_eq!(
            records[1].status,
            RecordStatus::Finished(RecoveryStatus::Accepted)
        );
        assert!(records.iter().all(|r| r.error.is_none()));
    }

    #[test]
    fn test_budget_exhausted_is_not_accepted() {
        let mut s = spec(40, 0.1, 80);
        s.params.threshold = 0;
        let records = run_trial(
            &s,
            &[Strategy::BruteForce],
            MipConfig::default(),
            Duration::ZERO,
            1,
        );
        assert_eq!(
            records[0].status,
            RecordStatus::Finished(RecoveryStatus::BudgetExhausted)
        );
        assert!(records[0].hit_budget());
        assert!(!records[0].accepted);
    }

    #[test]
    fn test_strategy_error_is_recorded_with_kind() {
        let mip = MipConfig {
            remainder_epsilon: 3.0,
        };
        let records = run_trial(
            &spec(4, 0.05, 24),
            &[Strategy::Mip, Strategy::BruteForce],
            mip,
            Duration::from_secs(60),
            2,
        );
        assert!(records[0].is_error());
        assert_eq!(records[0].error, Some(ErrorKind::InvalidConfig));
        assert!(!records[0].accepted);
        assert!(!records[0].hit_budget());
        // the other strategy still runs
        assert!(!records[1].is_error());
        assert_eq!(records[1].error, None);
    }
}
