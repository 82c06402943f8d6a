use crate::{
    constants::{CANCEL_CHECK_INTERVAL, PROGRESS_INTERVAL},
    error::LedgerError,
    pow::Difficulty,
};
use std::{fmt, str::FromStr};

/// Digest used for block hashes. Only SHA-256 is supported; anything else is
/// rejected when the configuration is parsed, never per hash.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
}

impl FromStr for HashAlgorithm {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(LedgerError::config(format!(
                "unsupported hash algorithm `{other}`"
            ))),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => f.write_str("sha256"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MiningConfig {
    pub difficulty: Difficulty,
    /// Checked at startup and logged; block hashing is always SHA-256.
    pub algorithm: HashAlgorithm,
    pub cancel_check_interval: u64,
    pub progress_interval: u64,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::default(),
            algorithm: HashAlgorithm::default(),
            cancel_check_interval: CANCEL_CHECK_INTERVAL,
            progress_interval: PROGRESS_INTERVAL,
        }
    }
}

impl MiningConfig {
    pub fn with_difficulty(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.cancel_check_interval == 0 {
            return Err(LedgerError::config("cancel check interval must be at least 1"));
        }
        if self.progress_interval == 0 {
            return Err(LedgerError::config("progress interval must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_algorithms() {
        assert_eq!("sha256".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Sha256));
        assert_eq!(" SHA-256 ".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Sha256));
    }

    #[test]
    fn rejects_unknown_algorithm() {
        let err = "md5".parse::<HashAlgorithm>().unwrap_err();
        assert!(matches!(err, LedgerError::Configuration(_)));
        assert_eq!(err.to_string(), "configuration error: unsupported hash algorithm `md5`");
    }

    #[test]
    fn default_config_is_valid() {
        let config = MiningConfig::default();
        assert_eq!(config.difficulty.prefix(), "0000");
        assert_eq!(config.cancel_check_interval, 1_024);
        assert_eq!(config.algorithm.to_string(), "sha256");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let config = MiningConfig {
            cancel_check_interval: 0,
            ..MiningConfig::default()
        };
        assert!(matches!(config.validate(), Err(LedgerError::Configuration(_))));

        let config = MiningConfig {
            progress_interval: 0,
            ..MiningConfig::default()
        };
        assert!(matches!(config.validate(), Err(LedgerError::Configuration(_))));
    }
}
