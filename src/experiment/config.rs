use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lpn::params::{validate_noise_rate, LpnParams, ParamsError, SampleRule, Slack};
use crate::recovery::{MipConfig, RecoveryError, Strategy};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Params(#[from] ParamsError),
    #[error(transparent)]
    Mip(#[from] RecoveryError),
}

/// Experiment grid: every (key length, noise rate) pair is a cell, every cell
/// runs `trials` independent instances, and each instance is handed to every
/// strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    pub key_lengths: Vec<usize>,
    pub noise_rates: Vec<f64>,
    pub trials: usize,
    pub time_budget_secs: f64,
    pub seed: u64,
    pub strategies: Vec<Strategy>,
    /// Worker threads; rayon's default when absent
    pub threads: Option<usize>,
    pub sample_rule: SampleRule,
    pub slack: Slack,
    pub mip: MipConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            key_lengths: vec![4, 8, 12],
            noise_rates: vec![0.05, 0.1],
            trials: 5,
            time_budget_secs: 10.0,
            seed: 42,
            strategies: vec![Strategy::Mip, Strategy::BruteForce],
            threads: None,
            sample_rule: SampleRule::default(),
            slack: Slack::default(),
            mip: MipConfig::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_lengths.is_empty() {
            return Err(ConfigError::Invalid("no key lengths".to_string()));
        }
        if self.noise_rates.is_empty() {
            return Err(ConfigError::Invalid("no noise rates".to_string()));
        }
        if self.strategies.is_empty() {
            return Err(ConfigError::Invalid("no strategies".to_string()));
        }
        if self.trials == 0 {
            return Err(ConfigError::Invalid("trials must be at least 1".to_string()));
        }
        let budget_ok = self.time_budget_secs > 0.0
            && Duration::try_from_secs_f64(self.time_budget_secs).is_ok();
        if !budget_ok {
            return Err(ConfigError::Invalid(format!(
                "time budget {}s must be positive and representable",
                self.time_budget_secs
            )));
        }
        if self.threads == Some(0) {
            return Err(ConfigError::Invalid("threads must be at least 1".to_string()));
        }
        for &p in &self.noise_rates {
            validate_noise_rate(p)?;
        }
        if self.key_lengths.contains(&0) {
            return Err(ParamsError::ZeroKeyLength.into());
        }
        self.mip.validate()?;
        // surfaces rule errors (e.g. fixed m below n) before any trial runs
        self.cells()?;
        Ok(())
    }

    /// Per-strategy budget; saturates for values `validate` would reject.
    pub fn budget(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_budget_secs).unwrap_or(Duration::MAX)
    }

    /// Parameters of every grid cell, key length major.
    pub fn cells(&self) -> Result<Vec<LpnParams>, ParamsError> {
        let mut cells = Vec::with_capacity(self.key_lengths.len() * self.noise_rates.len());
        for &n in &self.key_lengths {
            for &p in &self.noise_rates {
                cells.push(LpnParams::new(n, p, self.sample_rule, self.slack)?);
            }
        }
        Ok(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        ExperimentConfig::default().validate().unwrap();
        assert_eq!(ExperimentConfig::default().cells().unwrap().len(), 6);
    }

    #[test]
    fn test_parse_full_toml() {
        let text = r#"
            key_lengths = [4, 6]
            noise_rates = [0.125]
            trials = 3
            time_budget_secs = 2.5
            seed = 7
            strategies = ["brute-force"]
            threads = 2

            [sample_rule]
            kind = "fixed"
            samples = 64

            [slack]
            kind = "fixed"
            value = 4.0

            [mip]
            remainder_epsilon = 0.25
        "#;
        let config = ExperimentConfig::from_toml_str(text).unwrap();
        assert_eq!(config.key_lengths, vec![4, 6]);
        assert_eq!(config.strategies, vec![Strategy::BruteForce]);
        assert_eq!(config.sample_rule, SampleRule::Fixed { samples: 64 });
        assert_eq!(config.slack, Slack::Fixed { value: 4.0 });
        assert_eq!(config.mip.remainder_epsilon, 0.25);
        assert_eq!(config.budget(), Duration::from_millis(2500));

        let cells = config.cells().unwrap();
        assert_eq!(cells[0].m, 64);
        // ceil(0.125 * 64 + 4)
        assert_eq!(cells[0].threshold, 12);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ExperimentConfig::from_toml_str("trials = 9\n[slack]\nkind = \"none\"").unwrap();
        assert_eq!(config.trials, 9);
        assert_eq!(config.slack, Slack::Off);
        assert_eq!(config.key_lengths, ExperimentConfig::default().key_lengths);
    }

    #[test]
    fn test_oversized_budget_does_not_panic() {
        let config = ExperimentConfig {
            time_budget_secs: 1e300,
            ..ExperimentConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.budget(), Duration::MAX);

        // still representable, far beyond any run
        let config = ExperimentConfig::from_toml_str("time_budget_secs = 1e15").unwrap();
        assert_eq!(config.budget(), Duration::from_secs(1_000_000_000_000_000));
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(ExperimentConfig::from_toml_str("noise_rates = [0.5]").is_err());
        assert!(ExperimentConfig::from_toml_str("key_lengths = []").is_err());
        assert!(ExperimentConfig::from_toml_str("trials = 0").is_err());
        assert!(ExperimentConfig::from_toml_str("time_budget_secs = -1.0").is_err());
        assert!(ExperimentConfig::from_toml_str("time_budget_secs = 1e300").is_err());
        assert!(ExperimentConfig::from_toml_str("unknown_field = 1").is_err());
        assert!(ExperimentConfig::from_toml_str("[mip]\nremainder_epsilon = 2.0").is_err());
        assert!(ExperimentConfig::from_toml_str(
            "key_lengths = [16]\n[sample_rule]\nkind = \"fixed\"\nsamples = 8"
        )
        .is_err());
    }
}
