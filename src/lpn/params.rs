use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How many samples (rows of A) to draw for a key of length n at noise rate p.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SampleRule {
    /// m = floor(4n / (0.5 - p)^2)
    #[default]
    Advantage,
    /// m = ceil(n^1.5)
    Power,
    Fixed { samples: usize },
}

/// Slack term δ added to the expected noise weight p·m.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Slack {
    /// δ = sqrt(n·m)
    #[default]
    RootNm,
    Fixed { value: f64 },
    #[serde(rename = "none")]
    Off,
}

#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("noise rate {0} outside [0, 0.5)")]
    NoiseRate(f64),
    #[error("key length must be at least 1")]
    ZeroKeyLength,
    #[error("{samples} samples is fewer than the key length {n}")]
    TooFewSamples { samples: usize, n: usize },
    #[error("slack {0} must be finite and non-negative")]
    Slack(f64),
    #[error("cannot parse {what} from {input:?}")]
    Parse { what: &'static str, input: String },
}

/// Parameters of one LPN trial cell: key length, sample count, noise rate and
/// the acceptance threshold derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LpnParams {
    /// Key length
    pub n: usize,
    /// Number of samples
    pub m: usize,
    /// Bernoulli noise rate
    pub noise_rate: f64,
    /// Slack δ used in the threshold
    pub slack: f64,
    /// τ = ceil(p·m + δ)
    pub threshold: usize,
}

impl LpnParams {
    pub fn new(
        n: usize,
        noise_rate: f64,
        rule: SampleRule,
        slack: Slack,
    ) -> Result<Self, ParamsError> {
        let m = sample_count(n, noise_rate, rule)?;
        let delta = slack_value(n, m, slack)?;
        Ok(Self {
            n,
            m,
            noise_rate,
            slack: delta,
            threshold: acceptance_threshold(noise_rate, m, delta),
        })
    }

    /// Expected disagreement of a uniformly random wrong key.
    pub fn random_key_disagreement(&self) -> f64 {
        self.m as f64 / 2.0
    }
}

pub fn validate_noise_rate(p: f64) -> Result<(), ParamsError> {
    if !(0.0..0.5).contains(&p) {
        return Err(ParamsError::NoiseRate(p));
    }
    Ok(())
}

/// Sample count for key length `n` and noise rate `p` under `rule`.
/// Never below `n`.
pub fn sample_count(n: usize, p: f64, rule: SampleRule) -> Result<usize, ParamsError> {
    if n == 0 {
        return Err(ParamsError::ZeroKeyLength);
    }
    validate_noise_rate(p)?;
    let m = match rule {
        SampleRule::Advantage => {
            let bias = 0.5 - p;
            (4.0 * n as f64 / (bias * bias)).floor() as usize
        }
        SampleRule::Power => (n as f64 * (n as f64).sqrt()).ceil() as usize,
        SampleRule::Fixed { samples } => {
            if samples < n {
                return Err(ParamsError::TooFewSamples { samples, n });
            }
            samples
        }
    };
    Ok(m.max(n))
}

pub fn slack_value(n: usize, m: usize, slack: Slack) -> Result<f64, ParamsError> {
    match slack {
        Slack::RootNm => Ok(((n * m) as f64).sqrt()),
        Slack::Fixed { value } if value.is_finite() && value >= 0.0 => Ok(value),
        Slack::Fixed { value } => Err(ParamsError::Slack(value)),
        Slack::Off => Ok(0.0),
    }
}

/// τ = ceil(p·m + δ)
pub fn acceptance_threshold(p: f64, m: usize, delta: f64) -> usize {
    (p * m as f64 + delta).ceil() as usize
}

impl fmt::Display for SampleRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advantage => f.write_str("advantage"),
            Self::Power => f.write_str("power"),
            Self::Fixed { samples } => write!(f, "fixed:{samples}"),
        }
    }
}

impl FromStr for SampleRule {
    type Err = ParamsError;

    /// `advantage`, `power` or `fixed:<m>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParamsError::Parse {
            what: "sample rule",
            input: s.to_string(),
        };
        match s {
            "advantage" => Ok(Self::Advantage),
            "power" => Ok(Self::Power),
            _ => {
                let samples = s.strip_prefix("fixed:").ok_or_else(err)?;
                let samples = samples.parse().map_err(|_| err())?;
                Ok(Self::Fixed { samples })
            }
        }
    }
}

impl fmt::Display for Slack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootNm => f.write_str("root-nm"),
            Self::Fixed { value } => write!(f, "fixed:{value}"),
            Self::Off => f.write_str("none"),
        }
    }
}

impl FromStr for Slack {
    type Err = ParamsError;

    /// `root-nm`, `none` or `fixed:<delta>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParamsError::Parse {
            what: "slack",
            input: s.to_string(),
        };
        match s {
            "root-nm" => Ok(Self::RootNm),
            "none" => Ok(Self::Off),
            _ => {
                let value = s.strip_prefix("fixed:").ok_or_else(err)?;
                let value = value.parse().map_err(|_| err())?;
                Ok(Self::Fixed { value })
            }
        }
    }
}
