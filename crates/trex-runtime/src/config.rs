//! Runtime configuration.
//!
//! Defaults suit tests and the CLI. Override via environment variables or
//! explicit construction.

use trex_token::PausePolicy;

/// Host-level settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Maximum nesting of cross-contract calls within one top-level call.
    pub max_call_depth: usize,
    /// Pause policy of the token implementation registered at bootstrap.
    pub pause_policy: PausePolicy,
    /// Committed events kept before the oldest are trimmed.
    pub event_log_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 16,
            pause_policy: PausePolicy::default(),
            event_log_capacity: 100_000,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `TREX_MAX_CALL_DEPTH` (default: 16)
    /// - `TREX_PAUSE_ALLOWS_FORCED_TRANSFER` (default: true)
    /// - `TREX_PAUSE_ALLOWS_RECOVERY` (default: true)
    /// - `TREX_EVENT_LOG_CAPACITY` (default: 100000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`RuntimeConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            max_call_depth: parse_var(&lookup, "TREX_MAX_CALL_DEPTH", defaults.max_call_depth)?,
            pause_policy: PausePolicy {
                forced_transfer_when_paused: parse_var(
                    &lookup,
                    "TREX_PAUSE_ALLOWS_FORCED_TRANSFER",
                    defaults.pause_policy.forced_transfer_when_paused,
                )?,
                recovery_when_paused: parse_var(
                    &lookup,
                    "TREX_PAUSE_ALLOWS_RECOVERY",
                    defaults.pause_policy.recovery_when_paused,
                )?,
            },
            event_log_capacity: parse_var(&lookup, "TREX_EVENT_LOG_CAPACITY", defaults.event_log_capacity)?,
        };
        if config.max_call_depth == 0 {
            return Err(ConfigError::Invalid {
                var: "TREX_MAX_CALL_DEPTH".into(),
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(config)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, var: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: var.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid { var: String, value: String, reason: String },
}
