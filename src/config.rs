use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::env;
use std::str::FromStr;

/// Default number of leading zero hex digits a block hash must carry
pub const DEFAULT_DIFFICULTY: usize = 2;

/// Default amount minted to the miner of each block
pub const DEFAULT_MINING_REWARD: i64 = 85;

/// A SHA-256 hash has 64 hex digits; a larger difficulty can never be met
pub const MAX_DIFFICULTY: usize = 64;

/// Upper bound on the per-block reward, keeping the minted supply far from `i64::MAX`
pub const MAX_MINING_REWARD: i64 = 1 << 40;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Ledger parameters
///
/// Environment variables (see [`LedgerConfig::from_env`]):
/// - `LEDGER_DIFFICULTY`: proof-of-work difficulty
/// - `LEDGER_MINING_REWARD`: reward paid per mined block
/// - `LEDGER_PARALLEL_MINING`: `true`/`false`, search nonces on all cores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub difficulty: usize,
    pub mining_reward: i64,
    pub parallel_mining: bool,
}

impl LedgerConfig {
    pub fn new() -> Self {
        LedgerConfig {
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
            parallel_mining: false,
        }
    }

    pub fn with_difficulty(self, difficulty: usize) -> Self {
        debug_assert!(difficulty <= MAX_DIFFICULTY, "difficulty {} out of range", difficulty);
        LedgerConfig { difficulty, ..self }
    }

    pub fn with_mining_reward(self, mining_reward: i64) -> Self {
        debug_assert!(
            (0..=MAX_MINING_REWARD).contains(&mining_reward),
            "mining reward {} out of range",
            mining_reward
        );
        LedgerConfig {
            mining_reward,
            ..self
        }
    }

    pub fn with_parallel_mining(self, parallel_mining: bool) -> Self {
        LedgerConfig {
            parallel_mining,
            ..self
        }
    }

    /// Checks that mining terminates and rewards are non-negative and bounded.
    ///
    /// # Returns
    ///
    /// `ConfigError::InvalidValue` naming the first offending setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::InvalidValue {
                var: "LEDGER_DIFFICULTY",
                value: self.difficulty.to_string(),
            });
        }

        if !(0..=MAX_MINING_REWARD).contains(&self.mining_reward) {
            return Err(ConfigError::InvalidValue {
                var: "LEDGER_MINING_REWARD",
                value: self.mining_reward.to_string(),
            });
        }

        Ok(())
    }

    /// Load config from the process environment, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load config through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LedgerConfig::new();

        if let Some(value) = lookup("LEDGER_DIFFICULTY") {
            config.difficulty = parse_var("LEDGER_DIFFICULTY", &value)?;
        }

        if let Some(value) = lookup("LEDGER_MINING_REWARD") {
            config.mining_reward = parse_var("LEDGER_MINING_REWARD", &value)?;
        }

        if let Some(value) = lookup("LEDGER_PARALLEL_MINING") {
            config.parallel_mining = parse_var("LEDGER_PARALLEL_MINING", &value)?;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig::new()
    }
}

fn parse_var<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| vars.get(var).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.difficulty, 2);
        assert_eq!(config.mining_reward, 85);
        assert!(!config.parallel_mining);
    }

    #[test]
    fn test_config_from_lookup() {
        let config = LedgerConfig::from_lookup(lookup_from(&[
            ("LEDGER_DIFFICULTY", "4"),
            ("LEDGER_MINING_REWARD", " 100 "),
            ("LEDGER_PARALLEL_MINING", "true"),
        ]))
        .unwrap();

        assert_eq!(config.difficulty, 4);
        assert_eq!(config.mining_reward, 100);
        assert!(config.parallel_mining);
    }

    #[test]
    fn test_config_rejects_garbage() {
        let err = LedgerConfig::from_lookup(lookup_from(&[("LEDGER_DIFFICULTY", "hard")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: "LEDGER_DIFFICULTY",
                value: "hard".to_string()
            }
        );
    }

    #[test]
    fn test_config_rejects_negative_reward() {
        let err = LedgerConfig::from_lookup(lookup_from(&[("LEDGER_MINING_REWARD", "-100")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: "LEDGER_MINING_REWARD",
                value: "-100".to_string()
            }
        );
    }

    #[test]
    fn test_config_rejects_oversized_reward() {
        let too_big = (MAX_MINING_REWARD + 1).to_string();
        let lookup = lookup_from(&[("LEDGER_MINING_REWARD", too_big.as_str())]);
        assert!(LedgerConfig::from_lookup(lookup).is_err());

        let max = MAX_MINING_REWARD.to_string();
        let lookup = lookup_from(&[("LEDGER_MINING_REWARD", max.as_str())]);
        let config = LedgerConfig::from_lookup(lookup).unwrap();
        assert_eq!(config.mining_reward, MAX_MINING_REWARD);
    }

    #[test]
    fn test_config_rejects_unreachable_difficulty() {
        let err = LedgerConfig::from_lookup(lookup_from(&[("LEDGER_DIFFICULTY", "65")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: "LEDGER_DIFFICULTY",
                value: "65".to_string()
            }
        );

        let config =
            LedgerConfig::from_lookup(lookup_from(&[("LEDGER_DIFFICULTY", "64")])).unwrap();
        assert_eq!(config.difficulty, MAX_DIFFICULTY);
    }

    #[test]
    fn test_validate_struct_literal() {
        let config = LedgerConfig {
            difficulty: 100,
            ..LedgerConfig::new()
        };
        assert!(config.validate().is_err());
        assert!(LedgerConfig::new().validate().is_ok());
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn test_builder_rejects_negative_reward() {
        let _ = LedgerConfig::new().with_mining_reward(-1);
    }

    #[test]
    fn test_config_builders() {
        let config = LedgerConfig::new()
            .with_difficulty(0)
            .with_mining_reward(10)
            .with_parallel_mining(true);
        assert_eq!(config.difficulty, 0);
        assert_eq!(config.mining_reward, 10);
        assert!(config.parallel_mining);
    }

    #[test]
    fn test_config_deserializes_partial_json() {
        let config: LedgerConfig = serde_json::from_str(r#"{"difficulty": 3}"#).unwrap();
        assert_eq!(config.difficulty, 3);
        assert_eq!(config.mining_reward, DEFAULT_MINING_REWARD);
    }
}
