//! Runtime configuration, loaded from TOML and passed explicitly to the pool,
//! the admission controller and the batch assembler.

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::oracle::TrainerProfile;
use crate::record::Language;
use crate::spam::AdNameFilter;

pub const DEFAULT_TRAINER_NAME: &str = "FreeMons";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeConfig {
    pub trade: TradeSettings,
    pub legality: LegalitySettings,
    pub pool: PoolSettings,
    pub queue: QueueSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeSettings {
    pub min_trade_code: u32,
    pub max_trade_code: u32,
    /// Hand the same code to a requester on every trade.
    pub store_trade_codes: bool,
    pub allow_batch_trades: bool,
    /// Batch ceiling; values below 1 disable batch trades.
    pub max_pkms_per_trade: i32,
    /// Item given to generated records that hold nothing. 0 = none.
    pub default_held_item: u16,
    pub enable_spam_check: bool,
}

impl Default for TradeSettings {
    fn default() -> Self {
        Self {
            min_trade_code: 0,
            max_trade_code: 9999_9999,
            store_trade_codes: true,
            allow_batch_trades: true,
            max_pkms_per_trade: 1,
            default_held_item: 0,
            enable_spam_check: false,
        }
    }
}

impl TradeSettings {
    /// Batch ceiling, or `None` when batch trades are disabled.
    pub fn batch_ceiling(&self) -> Option<usize> {
        if !self.allow_batch_trades || self.max_pkms_per_trade < 1 {
            return None;
        }
        usize::try_from(self.max_pkms_per_trade).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegalitySettings {
    pub generate_ot: String,
    pub generate_tid16: u16,
    pub generate_sid16: u16,
    pub generate_language: Language,
    /// Seconds to wait for the legality engine before giving up.
    pub timeout_secs: u64,
    pub disallow_non_natives: bool,
    pub disallow_tracked: bool,
    /// Zero HOME trackers of records loaded into the pool.
    pub reset_home_tracker: bool,
}

impl Default for LegalitySettings {
    fn default() -> Self {
        Self {
            generate_ot: DEFAULT_TRAINER_NAME.to_string(),
            generate_tid16: 12345,
            generate_sid16: 54321,
            generate_language: Language::English,
            timeout_secs: 15,
            disallow_non_natives: false,
            disallow_tracked: false,
            reset_home_tracker: false,
        }
    }
}

impl LegalitySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn trainer(&self, language: Language) -> TrainerProfile {
        TrainerProfile {
            name: self.generate_ot.clone(),
            tid16: self.generate_tid16,
            sid16: self.generate_sid16,
            language,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub folder: Option<PathBuf>,
    /// Reshuffle the corpus after every full pass.
    pub shuffled: bool,
    pub recursive: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            folder: None,
            shuffled: true,
            recursive: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub capacity: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self { capacity: 512 }
    }
}

impl TradeConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: TradeConfig = toml::from_str(raw)?;
        config.validate()
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Check invariants and normalize values the bot cannot work with.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.trade.min_trade_code > self.trade.max_trade_code {
            return Err(ConfigError::Invalid(format!(
                "min_trade_code {} exceeds max_trade_code {}",
                self.trade.min_trade_code, self.trade.max_trade_code
            )));
        }
        if self.trade.max_trade_code > 9999_9999 {
            return Err(ConfigError::Invalid(
                "max_trade_code must fit in 8 digits".to_string(),
            ));
        }
        if self.legality.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "legality.timeout_secs must be positive".to_string(),
            ));
        }
        if self.queue.capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue.capacity must be positive".to_string(),
            ));
        }
        let ot = self.legality.generate_ot.trim();
        if ot.is_empty() || AdNameFilter::new().is_ad(ot) {
            warn!(
                generate_ot = %self.legality.generate_ot,
                "configured trainer name rejected, using default"
            );
            self.legality.generate_ot = DEFAULT_TRAINER_NAME.to_string();
        }
        Ok(self)
    }
}
