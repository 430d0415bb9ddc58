use serde::Serialize;

use super::bits::{BitVector, BitsError};
use super::instance::LpnInstance;
use super::params::LpnParams;

/// Number of rows where A·key mod 2 disagrees with the answers b.
pub fn disagreement(instance: &LpnInstance, key: &BitVector) -> Result<usize, BitsError> {
    let predicted = instance.questions.mul_vec(key)?;
    predicted.distance(&instance.answers)
}

/// Threshold test on the disagreement count: a key is accepted as recovered
/// iff its disagreement is at most τ.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcceptanceTest {
    pub threshold: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub disagreement: usize,
    pub threshold: usize,
    pub accepted: bool,
}

impl AcceptanceTest {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn from_params(params: &LpnParams) -> Self {
        Self::new(params.threshold)
    }

    pub fn accepts(&self, disagreement: usize) -> bool {
        disagreement <= self.threshold
    }

    pub fn evaluate(&self, instance: &LpnInstance, key: &BitVector) -> Result<Verdict, BitsError> {
        let disagreement = disagreement(instance, key)?;
        Ok(Verdict {
            disagreement,
            threshold: self.threshold,
            accepted: self.accepts(disagreement),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lpn::instance::LpnSample;
    use crate::lpn::params::{SampleRule, Slack};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_true_key_disagreement_is_noise_weight() {
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        for p in [0.0, 0.05, 0.125, 0.3] {
            let params = LpnParams::new(12, p, SampleRule::Advantage, Slack::RootNm).unwrap();
            let sample = LpnSample::generate(&params, &mut rng);
            let d = disagreement(&sample.instance, &sample.secret).unwrap();
            assert_eq!(d, sample.noise.weight());
        }
    }

    #[test]
    fn test_true_key_accepted_when_threshold_covers_noise() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let params = LpnParams::new(10, 0.1, SampleRule::Advantage, Slack::RootNm).unwrap();
        let sample = LpnSample::generate(&params, &mut rng);
        let test = AcceptanceTest::new(sample.noise.weight());
        let verdict = test.evaluate(&sample.instance, &sample.secret).unwrap();
        assert!(verdict.accepted);
        assert_eq!(verdict.disagreement, sample.noise.weight());

        if sample.noise.weight() > 0 {
            let strict = AcceptanceTest::new(sample.noise.weight() - 1);
            assert!(!strict.evaluate(&sample.instance, &sample.secret).unwrap().accepted);
        }
    }

    #[test]
    fn test_random_wrong_key_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let params = LpnParams::new(16, 0.05, SampleRule::Advantage, Slack::RootNm).unwrap();
        let sample = LpnSample::generate(&params, &mut rng);
        // tight threshold, well below m/2
        let test = AcceptanceTest::new(params.m / 8);

        let mut total = 0usize;
        let trials = 50;
        for _ in 0..trials {
            let mut wrong = BitVector::random(params.n, &mut rng);
            if wrong == sample.secret {
                wrong.flip(0);
            }
            let verdict = test.evaluate(&sample.instance, &wrong).unwrap();
            assert!(!verdict.accepted);
            total += verdict.disagreement;
        }
        let mean = total as f64 / trials as f64;
        let half = params.random_key_disagreement();
        assert!((mean - half).abs() < 0.1 * half, "mean {mean} vs m/2 {half}");
    }

    #[test]
    fn test_wrong_key_length_is_error() {
        let mut rng = ChaCha20Rng::seed_from_u64(13);
        let params = LpnParams::new(6, 0.1, SampleRule::Power, Slack::Off).unwrap();
        let sample = LpnSample::generate(&params, &mut rng);
        assert!(disagreement(&sample.instance, &BitVector::zeros(5)).is_err());
    }
}
