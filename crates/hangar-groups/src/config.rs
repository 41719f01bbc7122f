//! Engine configuration.
//!
//! Supports configuration via environment variables:
//!
//! ```bash
//! HANGAR_INVITATION_TTL_DAYS=7     # lifetime of direct invitations (1..=90)
//! HANGAR_INVITE_CODE_LENGTH=16     # characters per generated invite code (8..=64)
//! HANGAR_INVITE_CODE_MAX_DAYS=30   # longest allowed invite code lifetime (1..=365)
//! ```

use std::env;
use thiserror::Error;

pub const DEFAULT_INVITATION_TTL_DAYS: u32 = 7;
pub const DEFAULT_INVITE_CODE_LENGTH: u32 = 16;
pub const DEFAULT_INVITE_CODE_MAX_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Days until a direct invitation expires
    pub invitation_ttl_days: u32,
    /// Length of generated invite codes
    pub invite_code_length: u32,
    /// Upper bound for `expires_in_days` on invite codes
    pub invite_code_max_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            invitation_ttl_days: DEFAULT_INVITATION_TTL_DAYS,
            invite_code_length: DEFAULT_INVITE_CODE_LENGTH,
            invite_code_max_days: DEFAULT_INVITE_CODE_MAX_DAYS,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error("{var}={value} is out of range ({min}..={max})")]
    OutOfRange {
        var: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            invitation_ttl_days: bounded_var(
                "HANGAR_INVITATION_TTL_DAYS",
                DEFAULT_INVITATION_TTL_DAYS,
                1,
                90,
            )?,
            invite_code_length: bounded_var(
                "HANGAR_INVITE_CODE_LENGTH",
                DEFAULT_INVITE_CODE_LENGTH,
                8,
                64,
            )?,
            invite_code_max_days: bounded_var(
                "HANGAR_INVITE_CODE_MAX_DAYS",
                DEFAULT_INVITE_CODE_MAX_DAYS,
                1,
                365,
            )?,
        })
    }
}

fn bounded_var(var: &'static str, default: u32, min: u32, max: u32) -> Result<u32, ConfigError> {
    let value = match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidValue { var, value: raw })?,
        Err(_) => return Ok(default),
    };

    if !(min..=max).contains(&value) {
        return Err(ConfigError::OutOfRange {
            var,
            value,
            min,
            max,
        });
    }
    Ok(value)
}
