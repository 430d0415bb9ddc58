use rand::Rng;

use super::bits::{BitMatrix, BitVector, BitsError};
use super::params::LpnParams;

/// Public part of an LPN instance: what a recovery strategy is allowed to see.
#[derive(Clone, Debug)]
pub struct LpnInstance {
    /// Question matrix A (m x n)
    pub questions: BitMatrix,
    /// Answers b = A·s + e mod 2
    pub answers: BitVector,
    /// Bernoulli noise rate p
    pub noise_rate: f64,
}

impl LpnInstance {
    pub fn new(
        questions: BitMatrix,
        answers: BitVector,
        noise_rate: f64,
    ) -> Result<Self, BitsError> {
        if questions.rows() != answers.len() {
            return Err(BitsError::LengthMismatch {
                left: questions.rows(),
                right: answers.len(),
            });
        }
        Ok(Self {
            questions,
            answers,
            noise_rate,
        })
    }

    /// Key length n.
    pub fn key_len(&self) -> usize {
        self.questions.cols()
    }

    /// Number of samples m.
    pub fn samples(&self) -> usize {
        self.questions.rows()
    }
}

/// A generated instance together with its ground truth.
/// The secret and noise are only used for evaluation.
#[derive(Clone, Debug)]
pub struct LpnSample {
    pub instance: LpnInstance,
    pub secret: BitVector,
    pub noise: BitVector,
}

impl LpnSample {
    /// Sample a fresh instance:
    /// 1. uniform secret s of length n
    /// 2. uniform question matrix A (m x n)
    /// 3. Bernoulli(p) noise e of length m
    /// 4. b = A·s + e
    pub fn generate<R: Rng>(params: &LpnParams, rng: &mut R) -> Self {
        let secret = BitVector::random(params.n, rng);
        Self::with_secret(params, secret, rng)
    }

    /// Same as [`LpnSample::generate`] but with a caller-chosen secret.
    pub fn with_secret<R: Rng>(params: &LpnParams, secret: BitVector, rng: &mut R) -> Self {
        assert_eq!(secret.len(), params.n, "secret must have length n");
        let questions = BitMatrix::random(params.m, params.n, rng);
        let noise = BitVector::bernoulli(params.m, params.noise_rate, rng);
        Self::from_parts(questions, secret, noise, params.noise_rate)
    }

    /// Assemble from explicit A, s and e. Panics on inconsistent dimensions.
    pub fn from_parts(
        questions: BitMatrix,
        secret: BitVector,
        noise: BitVector,
        noise_rate: f64,
    ) -> Self {
        assert_eq!(secret.len(), questions.cols(), "secret must have one bit per column");
        assert_eq!(noise.len(), questions.rows(), "noise must have one bit per row");
        let mut answers = questions
            .mul_vec(&secret)
            .expect("secret length matches question columns");
        answers
            .xor_assign(&noise)
            .expect("noise length matches question rows");
        let instance = LpnInstance {
            questions,
            answers,
            noise_rate,
        };
        Self {
            instance,
            secret,
            noise,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lpn::params::{SampleRule, Slack};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_sample_dimensions() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let params = LpnParams::new(8, 0.1, SampleRule::Advantage, Slack::RootNm).unwrap();
        let sample = LpnSample::generate(&params, &mut rng);
        assert_eq!(sample.instance.key_len(), 8);
        assert_eq!(sample.instance.samples(), params.m);
        assert_eq!(sample.noise.len(), params.m);
        assert_eq!(sample.secret.len(), 8);
    }

    #[test]
    fn test_answers_are_noisy_parities() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let params = LpnParams::new(6, 0.2, SampleRule::Power, Slack::Off).unwrap();
        let sample = LpnSample::generate(&params, &mut rng);

        // b - e should equal A·s
        let mut clean = sample.instance.answers.clone();
        clean.xor_assign(&sample.noise).unwrap();
        let expected = sample.instance.questions.mul_vec(&sample.secret).unwrap();
        assert_eq!(clean, expected);
    }

    #[test]
    fn test_zero_noise_rate_is_noiseless() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let params = LpnParams::new(5, 0.0, SampleRule::Fixed { samples: 40 }, Slack::Off).unwrap();
        let sample = LpnSample::generate(&params, &mut rng);
        assert_eq!(sample.noise.weight(), 0);
    }

    #[test]
    fn test_instance_rejects_mismatched_answers() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let questions = BitMatrix::random(5, 3, &mut rng);
        assert!(LpnInstance::new(questions, BitVector::zeros(4), 0.1).is_err());
    }
}
