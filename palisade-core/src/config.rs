//! Configuration for brute force protection.

use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, ValidationError};

pub const ENV_IP_BAN_THRESHOLD: &str = "PALISADE_IP_BAN_THRESHOLD";
pub const ENV_USER_LOCK_THRESHOLD: &str = "PALISADE_USER_LOCK_THRESHOLD";
pub const ENV_CACHE_IDLE_TTL_SECS: &str = "PALISADE_CACHE_IDLE_TTL_SECS";
pub const ENV_WARM_USER_COUNTERS: &str = "PALISADE_WARM_USER_COUNTERS";

/// Thresholds and cache behaviour for the brute force guard.
///
/// # Defaults
///
/// - IP ban threshold: 10 failures
/// - User lock threshold: 3 failures
/// - Cache idle TTL: 30 seconds
/// - Warm user counters: off (only IP counters are seeded by warm start)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BruteForceConfig {
    /// Failures from one IP since its last success at which the IP is banned
    pub ip_ban_threshold: u32,
    /// Failures on one account since its last success at which it is locked
    pub user_lock_threshold: u32,
    /// How long a cached counter survives without being written
    pub cache_idle_ttl: Duration,
    /// Also seed user counters during warm start
    pub warm_user_counters: bool,
}

impl Default for BruteForceConfig {
    fn default() -> Self {
        Self {
            ip_ban_threshold: 10,
            user_lock_threshold: 3,
            cache_idle_ttl: Duration::from_secs(30),
            warm_user_counters: false,
        }
    }
}

impl BruteForceConfig {
    pub fn with_ip_ban_threshold(mut self, threshold: u32) -> Self {
        self.ip_ban_threshold = threshold;
        self
    }

    pub fn with_user_lock_threshold(mut self, threshold: u32) -> Self {
        self.user_lock_threshold = threshold;
        self
    }

    pub fn with_cache_idle_ttl(mut self, ttl: Duration) -> Self {
        self.cache_idle_ttl = ttl;
        self
    }

    pub fn with_warm_user_counters(mut self, enabled: bool) -> Self {
        self.warm_user_counters = enabled;
        self
    }

    /// Reject configurations that would ban every caller or disable the cache.
    pub fn validate(&self) -> Result<(), Error> {
        if self.ip_ban_threshold == 0 {
            return Err(ValidationError::InvalidField(
                "ip_ban_threshold must be at least 1".to_string(),
            )
            .into());
        }
        if self.user_lock_threshold == 0 {
            return Err(ValidationError::InvalidField(
                "user_lock_threshold must be at least 1".to_string(),
            )
            .into());
        }
        if self.cache_idle_ttl.is_zero() {
            return Err(ValidationError::InvalidField(
                "cache_idle_ttl must be greater than zero".to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// Build a configuration from `PALISADE_*` environment variables.
    ///
    /// Unset variables fall back to the defaults; set but unparsable values
    /// are an error rather than being silently ignored.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let defaults = Self::default();

        let config = Self {
            ip_ban_threshold: parse_var(&lookup, ENV_IP_BAN_THRESHOLD)?
                .unwrap_or(defaults.ip_ban_threshold),
            user_lock_threshold: parse_var(&lookup, ENV_USER_LOCK_THRESHOLD)?
                .unwrap_or(defaults.user_lock_threshold),
            cache_idle_ttl: parse_var::<u64>(&lookup, ENV_CACHE_IDLE_TTL_SECS)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_idle_ttl),
            warm_user_counters: parse_var(&lookup, ENV_WARM_USER_COUNTERS)?
                .unwrap_or(defaults.warm_user_counters),
        };

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, Error> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            ValidationError::InvalidField(format!("{name} has an invalid value: {raw:?}")).into()
        }),
    }
}
