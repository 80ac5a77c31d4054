//! Runtime configuration, read from the environment (and an optional `.env` file)

use log::warn;
use serde::{Deserialize, Serialize};

use std::env;
use std::fmt::Display;
use std::str::FromStr;

pub const DEFAULT_DIFFICULTY: u32 = 3;
pub const DEFAULT_TARGET_BLOCK_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_RETARGET_WINDOW: usize = 5;
pub const DEFAULT_FAUCET_AMOUNT: f64 = 100.0;
pub const DEFAULT_FAUCET_COOLDOWN_MS: i64 = 24 * 60 * 60 * 1000;
pub const DEFAULT_FAUCET_RESERVE: f64 = 1_000_000.0;

/// Parameters of the ledger engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Difficulty of the first mined block
    #[serde(default = "default_difficulty")]
    pub initial_difficulty: u32,

    /// Desired time between blocks
    #[serde(default = "default_target_block_interval_ms")]
    pub target_block_interval_ms: u64,

    /// Number of recent blocks examined on retarget
    #[serde(default = "default_retarget_window")]
    pub retarget_window: usize,

    /// Tokens dispensed per faucet claim
    #[serde(default = "default_faucet_amount")]
    pub faucet_amount: f64,

    /// Minimum time between two claims for the same address
    #[serde(default = "default_faucet_cooldown_ms")]
    pub faucet_cooldown_ms: i64,

    /// Tokens minted to the faucet in the genesis block
    #[serde(default = "default_faucet_reserve")]
    pub faucet_reserve: f64,
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_target_block_interval_ms() -> u64 {
    DEFAULT_TARGET_BLOCK_INTERVAL_MS
}

fn default_retarget_window() -> usize {
    DEFAULT_RETARGET_WINDOW
}

fn default_faucet_amount() -> f64 {
    DEFAULT_FAUCET_AMOUNT
}

fn default_faucet_cooldown_ms() -> i64 {
    DEFAULT_FAUCET_COOLDOWN_MS
}

fn default_faucet_reserve() -> f64 {
    DEFAULT_FAUCET_RESERVE
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            initial_difficulty: DEFAULT_DIFFICULTY,
            target_block_interval_ms: DEFAULT_TARGET_BLOCK_INTERVAL_MS,
            retarget_window: DEFAULT_RETARGET_WINDOW,
            faucet_amount: DEFAULT_FAUCET_AMOUNT,
            faucet_cooldown_ms: DEFAULT_FAUCET_COOLDOWN_MS,
            faucet_reserve: DEFAULT_FAUCET_RESERVE,
        }
    }
}

impl LedgerConfig {
    /// Reads `LEDGER_*` variables, keeping defaults for anything unset or unparsable
    pub fn from_env() -> Self {
        let defaults = LedgerConfig::default();
        LedgerConfig {
            initial_difficulty: env_or("LEDGER_DIFFICULTY", defaults.initial_difficulty).max(1),
            target_block_interval_ms: env_or(
                "LEDGER_TARGET_BLOCK_INTERVAL_MS",
                defaults.target_block_interval_ms,
            ),
            retarget_window: env_or("LEDGER_RETARGET_WINDOW", defaults.retarget_window),
            faucet_amount: env_or("LEDGER_FAUCET_AMOUNT", defaults.faucet_amount),
            faucet_cooldown_ms: env_or("LEDGER_FAUCET_COOLDOWN_MS", defaults.faucet_cooldown_ms),
            faucet_reserve: env_or("LEDGER_FAUCET_RESERVE", defaults.faucet_reserve),
        }
    }
}

/// HTTP server and background driver settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How often the scheduler driver calls `tick`
    pub scheduler_poll_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            scheduler_poll_ms: 250,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = ServerConfig::default();
        ServerConfig {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port),
            scheduler_poll_ms: env_or("SCHEDULER_POLL_MS", defaults.scheduler_poll_ms).max(1),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(err) => {
                warn!("Ignoring {}={:?}: {}; using {}", key, raw, err, default);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.retarget_window, 5);
        assert_eq!(config.faucet_cooldown_ms, 86_400_000);
        assert_eq!(ServerConfig::default().port, 8080);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LedgerConfig = serde_json::from_str(r#"{"faucet_amount": 5.0}"#).unwrap();
        assert_eq!(config.faucet_amount, 5.0);
        assert_eq!(config.initial_difficulty, DEFAULT_DIFFICULTY);
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("TOKEN_LEDGER_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("TOKEN_LEDGER_TEST_GARBAGE", 7u32), 7);

        env::set_var("TOKEN_LEDGER_TEST_VALUE", " 42 ");
        assert_eq!(env_or("TOKEN_LEDGER_TEST_VALUE", 7u32), 42);
        assert_eq!(env_or("TOKEN_LEDGER_TEST_UNSET", 9u32), 9);
    }
}
