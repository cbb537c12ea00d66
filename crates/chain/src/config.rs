//! # Protocol Configuration
//!
//! Semua konstanta protokol yang dapat di-tune dikumpulkan di `ProtocolConfig`.
//!
//! ## Priority Chain
//!
//! ```text
//! 1. Compiled defaults (ProtocolConfig::default)
//! 2. Section [ledger] dari file TOML (SCILEDGER_CONFIG_FILE atau path eksplisit)
//! 3. Environment variable overrides (SCILEDGER_*)
//! ```
//!
//! PERINGATAN: nilai-nilai ini consensus-critical. Semua node dalam satu
//! jaringan HARUS memakai konfigurasi yang identik.
//!
//! | Env var | Field | Default |
//! |---------|-------|---------|
//! | `SCILEDGER_VOTE_REGENERATION_SECONDS` | `vote_regeneration_seconds` | 432000 |
//! | `SCILEDGER_REVERSE_AUCTION_WINDOW_SECONDS` | `reverse_auction_window_seconds` | 86400 |
//! | `SCILEDGER_MIN_ACCOUNT_CREATION_FEE` | `min_account_creation_fee` | 1000 |
//! | `SCILEDGER_CONTENT_ACTIVITY_WINDOW_SECONDS` | `content_activity_window_seconds` | 1209600 |
//! | `SCILEDGER_REGISTRAR` | `registrar` | registrar |

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{AccountName, ShareType, PERCENT_1};

pub const DEFAULT_VOTE_REGENERATION_SECONDS: u64 = 5 * 24 * 60 * 60;
pub const DEFAULT_REVERSE_AUCTION_WINDOW_SECONDS: u64 = 24 * 60 * 60;
pub const DEFAULT_VOTE_POWER_COST_DIVISOR: i64 = 10;
pub const DEFAULT_COMMON_TOKENS_WITHDRAW_INTERVALS: u32 = 13;
pub const DEFAULT_COMMON_TOKENS_WITHDRAW_INTERVAL_SECONDS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_MAX_WITHDRAW_ROUTES: u16 = 10;
pub const DEFAULT_MAX_ACCOUNT_WITNESS_VOTES: u16 = 30;
pub const DEFAULT_MAX_WITNESS_URL_LENGTH: usize = 2048;
pub const DEFAULT_OWNER_UPDATE_LIMIT_SECONDS: u64 = 60 * 60;
pub const DEFAULT_ACCOUNT_RECOVERY_REQUEST_EXPIRATION_PERIOD: u64 = 24 * 60 * 60;
pub const DEFAULT_OWNER_AUTH_RECOVERY_PERIOD: u64 = 30 * 24 * 60 * 60;
pub const DEFAULT_DELEGATION_RETURN_PERIOD: u64 = 5 * 24 * 60 * 60;
pub const DEFAULT_CONTENT_ACTIVITY_WINDOW_SECONDS: u64 = 14 * 24 * 60 * 60;
pub const DEFAULT_PROPOSAL_MIN_LIFETIME: u64 = 24 * 60 * 60;
pub const DEFAULT_PROPOSAL_MAX_LIFETIME: u64 = 10 * 24 * 60 * 60;
pub const DEFAULT_MIN_ACCOUNT_CREATION_FEE: ShareType = 1_000;
pub const DEFAULT_POWER_DOWN_FLOOR_MULTIPLIER: i64 = 10;
pub const DEFAULT_REFERENCES_REWARD_SHARE: u16 = 10 * PERCENT_1;
pub const DEFAULT_CURATORS_REWARD_SHARE: u16 = 5 * PERCENT_1;
pub const DEFAULT_REVIEW_VOTERS_REWARD_SHARE: u16 = 10 * PERCENT_1;
pub const DEFAULT_REGISTRAR: &str = "registrar";

const CONFIG_FILE_ENV: &str = "SCILEDGER_CONFIG_FILE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Waktu regenerasi voting power dari 0% ke 100%.
    pub vote_regeneration_seconds: u64,
    /// Jendela reverse auction untuk curator weight.
    pub reverse_auction_window_seconds: u64,
    /// `used_power / divisor` dipotong permanen dari voting power.
    pub vote_power_cost_divisor: i64,
    pub common_tokens_withdraw_intervals: u32,
    pub common_tokens_withdraw_interval_seconds: u64,
    pub max_withdraw_routes: u16,
    pub max_account_witness_votes: u16,
    pub max_witness_url_length: usize,
    pub owner_update_limit_seconds: u64,
    pub account_recovery_request_expiration_period: u64,
    /// Dipakai untuk change-recovery delay DAN retensi owner history.
    pub owner_auth_recovery_period: u64,
    pub delegation_return_period: u64,
    pub content_activity_window_seconds: u64,
    pub proposal_min_lifetime: u64,
    pub proposal_max_lifetime: u64,
    /// Fee minimum (dalam unit terkecil SCI) untuk account_create.
    pub min_account_creation_fee: ShareType,
    /// Account non-mined butuh > fee * multiplier common tokens sebelum power-down.
    pub power_down_floor_multiplier: i64,
    pub references_reward_share: u16,
    pub curators_reward_share: u16,
    pub review_voters_reward_share: u16,
    /// Account yang berhak menjalankan add_expertise_tokens.
    pub registrar: AccountName,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            vote_regeneration_seconds: DEFAULT_VOTE_REGENERATION_SECONDS,
            reverse_auction_window_seconds: DEFAULT_REVERSE_AUCTION_WINDOW_SECONDS,
            vote_power_cost_divisor: DEFAULT_VOTE_POWER_COST_DIVISOR,
            common_tokens_withdraw_intervals: DEFAULT_COMMON_TOKENS_WITHDRAW_INTERVALS,
            common_tokens_withdraw_interval_seconds: DEFAULT_COMMON_TOKENS_WITHDRAW_INTERVAL_SECONDS,
            max_withdraw_routes: DEFAULT_MAX_WITHDRAW_ROUTES,
            max_account_witness_votes: DEFAULT_MAX_ACCOUNT_WITNESS_VOTES,
            max_witness_url_length: DEFAULT_MAX_WITNESS_URL_LENGTH,
            owner_update_limit_seconds: DEFAULT_OWNER_UPDATE_LIMIT_SECONDS,
            account_recovery_request_expiration_period: DEFAULT_ACCOUNT_RECOVERY_REQUEST_EXPIRATION_PERIOD,
            owner_auth_recovery_period: DEFAULT_OWNER_AUTH_RECOVERY_PERIOD,
            delegation_return_period: DEFAULT_DELEGATION_RETURN_PERIOD,
            content_activity_window_seconds: DEFAULT_CONTENT_ACTIVITY_WINDOW_SECONDS,
            proposal_min_lifetime: DEFAULT_PROPOSAL_MIN_LIFETIME,
            proposal_max_lifetime: DEFAULT_PROPOSAL_MAX_LIFETIME,
            min_account_creation_fee: DEFAULT_MIN_ACCOUNT_CREATION_FEE,
            power_down_floor_multiplier: DEFAULT_POWER_DOWN_FLOOR_MULTIPLIER,
            references_reward_share: DEFAULT_REFERENCES_REWARD_SHARE,
            curators_reward_share: DEFAULT_CURATORS_REWARD_SHARE,
            review_voters_reward_share: DEFAULT_REVIEW_VOTERS_REWARD_SHARE,
            registrar: AccountName::new_unchecked(DEFAULT_REGISTRAR),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    ledger: Option<ProtocolConfig>,
}

impl ProtocolConfig {
    // ── PRIMARY ENTRY POINT ────────────────────────────────────────────

    /// Defaults → file dari `SCILEDGER_CONFIG_FILE` (jika ada) → env overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) => Self::parse_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load dari path eksplisit, lalu env overrides di atasnya.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut config = Self::parse_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse string TOML. Section `[ledger]` opsional; field yang hilang
    /// memakai default.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content).context("invalid ledger config TOML")?;
        let config = file.ledger.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    // ── ENV OVERRIDES ──────────────────────────────────────────────────

    fn apply_env_overrides(&mut self) -> Result<()> {
        fn env_u64(key: &str) -> Result<Option<u64>> {
            match std::env::var(key) {
                Ok(v) => Ok(Some(v.trim().parse().with_context(|| format!("{} must be an integer", key))?)),
                Err(_) => Ok(None),
            }
        }

        if let Some(v) = env_u64("SCILEDGER_VOTE_REGENERATION_SECONDS")? {
            self.vote_regeneration_seconds = v;
        }
        if let Some(v) = env_u64("SCILEDGER_REVERSE_AUCTION_WINDOW_SECONDS")? {
            self.reverse_auction_window_seconds = v;
        }
        if let Some(v) = env_u64("SCILEDGER_MIN_ACCOUNT_CREATION_FEE")? {
            self.min_account_creation_fee = i64::try_from(v).context("fee too large")?;
        }
        if let Some(v) = env_u64("SCILEDGER_CONTENT_ACTIVITY_WINDOW_SECONDS")? {
            self.content_activity_window_seconds = v;
        }
        if let Ok(name) = std::env::var("SCILEDGER_REGISTRAR") {
            self.registrar = AccountName::new(name.trim())?;
        }
        Ok(())
    }

    // ── VALIDATION ─────────────────────────────────────────────────────

    /// Tolak konfigurasi yang akan membuat pembagian nol atau share > 100%.
    pub fn validate(&self) -> Result<()> {
        if self.vote_regeneration_seconds == 0 {
            anyhow::bail!("vote_regeneration_seconds must be > 0");
        }
        if self.reverse_auction_window_seconds == 0 {
            anyhow::bail!("reverse_auction_window_seconds must be > 0");
        }
        if self.vote_power_cost_divisor <= 0 {
            anyhow::bail!("vote_power_cost_divisor must be > 0");
        }
        if self.common_tokens_withdraw_intervals == 0 {
            anyhow::bail!("common_tokens_withdraw_intervals must be > 0");
        }
        if self.proposal_min_lifetime > self.proposal_max_lifetime {
            anyhow::bail!("proposal_min_lifetime exceeds proposal_max_lifetime");
        }
        let content_shares = self.references_reward_share as u32 + self.curators_reward_share as u32;
        if content_shares > crate::types::PERCENT_100 as u32 {
            anyhow::bail!("references + curators reward share exceeds 100%");
        }
        if self.review_voters_reward_share > crate::types::PERCENT_100 {
            anyhow::bail!("review_voters_reward_share exceeds 100%");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let cfg = ProtocolConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.reverse_auction_window_seconds, 86_400);
        assert_eq!(cfg.registrar.as_str(), "registrar");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = ProtocolConfig::from_toml_str(
            "[ledger]\nreverse_auction_window_seconds = 1800\nregistrar = \"genesis\"\n",
        )
        .unwrap();
        assert_eq!(cfg.reverse_auction_window_seconds, 1800);
        assert_eq!(cfg.registrar.as_str(), "genesis");
        assert_eq!(cfg.vote_regeneration_seconds, DEFAULT_VOTE_REGENERATION_SECONDS);
    }

    #[test]
    fn test_missing_section_is_default() {
        let cfg = ProtocolConfig::from_toml_str("[other]\nx = 1\n").unwrap();
        assert_eq!(cfg, ProtocolConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ProtocolConfig::from_toml_str("[ledger]\nvote_regeneration_seconds = 0\n").is_err());
        assert!(ProtocolConfig::from_toml_str("[ledger]\nreferences_reward_share = 9000\ncurators_reward_share = 2000\n").is_err());
        assert!(ProtocolConfig::from_toml_str("[ledger]\nregistrar = \"NOPE\"\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ledger]\nmax_withdraw_routes = 3").unwrap();
        let cfg = ProtocolConfig::parse_file(file.path()).unwrap();
        assert_eq!(cfg.max_withdraw_routes, 3);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ProtocolConfig::parse_file(&dir.path().join("absent.toml")).is_err());
    }
}
