use std::time::Duration;

use crate::dispatch::{DEFAULT_ACK_TIMEOUT, DEFAULT_APPROVAL_PAGE, DEFAULT_SETTLE_DELAY};

pub const ENV_SETTLE_DELAY_MS: &str = "WALLET_UNLOCK_SETTLE_DELAY_MS";
pub const ENV_ACK_TIMEOUT_MS: &str = "WALLET_UNLOCK_ACK_TIMEOUT_MS";
pub const ENV_APPROVAL_PAGE: &str = "WALLET_UNLOCK_APPROVAL_PAGE";
pub const CONFIG_SOURCE_DEFAULT: &str = "default";

const MAX_SETTLE_DELAY_MS: u64 = 5_000;
const MAX_ACK_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid WALLET_UNLOCK_SETTLE_DELAY_MS: {0}")]
    InvalidSettleDelay(String),
    #[error("invalid WALLET_UNLOCK_ACK_TIMEOUT_MS: {0}")]
    InvalidAckTimeout(String),
    #[error("invalid WALLET_UNLOCK_APPROVAL_PAGE: {0}")]
    InvalidApprovalPage(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockConfig {
    pub settle_delay: Duration,
    pub ack_timeout: Duration,
    pub approval_page: String,
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            approval_page: DEFAULT_APPROVAL_PAGE.to_string(),
        }
    }
}

/// A resolved value and where it came from (`default` or the env var name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: &'static str,
}

impl UnlockConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            settle_delay: resolve_settle_delay()?.value,
            ack_timeout: resolve_ack_timeout()?.value,
            approval_page: resolve_approval_page()?.value,
        })
    }
}

pub fn resolve_settle_delay() -> Result<Resolved<Duration>, ConfigError> {
    let Some(raw) = env_non_empty(ENV_SETTLE_DELAY_MS) else {
        return Ok(Resolved {
            value: DEFAULT_SETTLE_DELAY,
            source: CONFIG_SOURCE_DEFAULT,
        });
    };
    let millis = parse_bounded_millis(&raw, MAX_SETTLE_DELAY_MS)
        .map_err(ConfigError::InvalidSettleDelay)?;
    Ok(Resolved {
        value: Duration::from_millis(millis),
        source: ENV_SETTLE_DELAY_MS,
    })
}

pub fn resolve_ack_timeout() -> Result<Resolved<Duration>, ConfigError> {
    let Some(raw) = env_non_empty(ENV_ACK_TIMEOUT_MS) else {
        return Ok(Resolved {
            value: DEFAULT_ACK_TIMEOUT,
            source: CONFIG_SOURCE_DEFAULT,
        });
    };
    let millis =
        parse_bounded_millis(&raw, MAX_ACK_TIMEOUT_MS).map_err(ConfigError::InvalidAckTimeout)?;
    if millis == 0 {
        return Err(ConfigError::InvalidAckTimeout(
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Resolved {
        value: Duration::from_millis(millis),
        source: ENV_ACK_TIMEOUT_MS,
    })
}

pub fn resolve_approval_page() -> Result<Resolved<String>, ConfigError> {
    let Some(raw) = env_non_empty(ENV_APPROVAL_PAGE) else {
        return Ok(Resolved {
            value: DEFAULT_APPROVAL_PAGE.to_string(),
            source: CONFIG_SOURCE_DEFAULT,
        });
    };
    Ok(Resolved {
        value: normalize_approval_page(&raw)?,
        source: ENV_APPROVAL_PAGE,
    })
}

/// Extension-relative page path, without query or fragment.
pub fn normalize_approval_page(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidApprovalPage(
            "must not be empty".to_string(),
        ));
    }
    if trimmed.contains(['?', '#']) || trimmed.contains("://") {
        return Err(ConfigError::InvalidApprovalPage(format!(
            "expected a page path, got {trimmed}"
        )));
    }
    Ok(trimmed.to_string())
}

fn parse_bounded_millis(raw: &str, max: u64) -> Result<u64, String> {
    let millis = raw.parse::<u64>().map_err(|error| error.to_string())?;
    if millis > max {
        return Err(format!("{millis} exceeds maximum of {max}"));
    }
    Ok(millis)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
