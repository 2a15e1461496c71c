//! # Process configuration.
//!
//! Provides [`Config`], the centralized settings for the reminder runtime.
//!
//! Config is used in two ways:
//! 1. **Startup**: [`Config::from_env`] reads the process environment (and `.env`, if present);
//! 2. **Wiring**: [`Service`](crate::Service) hands the relevant fields to the supervisor,
//!    the dispatch cycle and the transport adapter.
//!
//! ## Sentinel values
//! - `send_concurrency = 0` → treated as 1 (sequential sends)
//! - `grace = 0s` → do not wait for an in-flight tick on shutdown

use std::time::Duration;

use crate::error::ConfigError;
use crate::policies::{BackoffPolicy, JitterPolicy};

/// Environment variable names.
pub mod keys {
    pub const STORE_URL: &str = "REMINDER_STORE_URL";
    pub const STORE_URL_FALLBACK: &str = "DATABASE_URL";
    pub const DISPATCH_INTERVAL: &str = "REMINDER_DISPATCH_INTERVAL_SECS";
    pub const COUNTRY_PREFIX: &str = "REMINDER_COUNTRY_PREFIX";
    pub const RECONNECT_BACKOFF: &str = "REMINDER_RECONNECT_BACKOFF_SECS";
    pub const RECONNECT_JITTER: &str = "REMINDER_RECONNECT_JITTER";
    pub const SEND_TIMEOUT: &str = "REMINDER_SEND_TIMEOUT_SECS";
    pub const CONNECT_TIMEOUT: &str = "REMINDER_CONNECT_TIMEOUT_SECS";
    pub const SEND_CONCURRENCY: &str = "REMINDER_SEND_CONCURRENCY";
    pub const SHUTDOWN_GRACE: &str = "REMINDER_SHUTDOWN_GRACE_SECS";
    pub const GATEWAY_URL: &str = "REMINDER_GATEWAY_URL";
    pub const GATEWAY_TOKEN: &str = "REMINDER_GATEWAY_TOKEN";
    pub const GATEWAY_SESSION: &str = "REMINDER_GATEWAY_SESSION";
    pub const HEARTBEAT: &str = "REMINDER_HEARTBEAT_SECS";
}

/// Settings for the messaging gateway adapter.
#[derive(Clone, Debug, PartialEq)]
pub struct GatewayConfig {
    /// Base URL of the gateway HTTP API (no trailing slash).
    pub base_url: String,
    /// Bearer token sent with every request (`""` = no auth header).
    pub token: String,
    /// Gateway-side session name.
    pub session: String,
    /// How often the session status is polled.
    pub heartbeat: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:21465".to_string(),
            token: String::new(),
            session: "reminder-session".to_string(),
            heartbeat: Duration::from_secs(30),
        }
    }
}

/// Global configuration for the reminder runtime.
///
/// ## Field semantics
/// - `store_url`: event store connection string (required, no default)
/// - `dispatch_interval`: time between two ticks
/// - `country_prefix`: prepended to local-format addresses
/// - `reconnect`: delay policy between connection attempts (constant by default)
/// - `send_timeout`: upper bound for one send (never zero)
/// - `connect_timeout`: upper bound for one connection attempt (never zero)
/// - `send_concurrency`: in-flight sends within one tick
/// - `grace`: how long shutdown waits for an in-flight tick
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct Config {
    /// Event store connection string.
    pub store_url: String,

    /// Fixed interval between dispatch ticks.
    pub dispatch_interval: Duration,

    /// Digits prepended to every local-format address.
    pub country_prefix: String,

    /// Reconnect delay policy.
    ///
    /// The default is a constant 5s delay (`factor = 1.0`, no jitter).
    pub reconnect: BackoffPolicy,

    /// Per-send timeout.
    ///
    /// One unresponsive recipient can hold a tick for at most this long.
    pub send_timeout: Duration,

    /// Per-attempt connect timeout.
    pub connect_timeout: Duration,

    /// Maximum number of sends in flight during one tick.
    pub send_concurrency: usize,

    /// Maximum time to wait for an in-flight tick when shutting down.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Messaging gateway settings.
    pub gateway: GatewayConfig,
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `store_url = ""` (must be provided)
    /// - `dispatch_interval = 60s`
    /// - `country_prefix = "91"`
    /// - `reconnect = 5s constant`
    /// - `send_timeout = 15s`, `connect_timeout = 60s`
    /// - `send_concurrency = 1`
    /// - `grace = 30s`, `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            store_url: String::new(),
            dispatch_interval: Duration::from_secs(60),
            country_prefix: "91".to_string(),
            reconnect: BackoffPolicy::constant(Duration::from_secs(5)),
            send_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(60),
            send_concurrency: 1,
            grace: Duration::from_secs(30),
            bus_capacity: 1024,
            gateway: GatewayConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// A `.env` file in the working directory is honored but never overrides
    /// variables that are already set. A missing `.env` is fine; an unreadable one is
    /// logged and skipped.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Some(e) = env_file_problem(dotenvy::dotenv().map(drop)) {
            tracing::warn!(error = %e, "ignoring unreadable .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Unset or blank keys fall back to [`Config::default`]; the store URL is required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut cfg = Config::default();

        cfg.store_url = get(keys::STORE_URL)
            .or_else(|| get(keys::STORE_URL_FALLBACK))
            .ok_or(ConfigError::Missing {
                key: keys::STORE_URL,
            })?;

        if let Some(v) = get(keys::DISPATCH_INTERVAL) {
            cfg.dispatch_interval = parse_nonzero_secs(keys::DISPATCH_INTERVAL, &v)?;
        }
        if let Some(v) = get(keys::COUNTRY_PREFIX) {
            let prefix = v.trim_start_matches('+');
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_digit()) {
                return Err(ConfigError::Invalid {
                    key: keys::COUNTRY_PREFIX,
                    reason: format!("{v:?} is not a digit-only prefix"),
                });
            }
            cfg.country_prefix = prefix.to_string();
        }
        if let Some(v) = get(keys::RECONNECT_BACKOFF) {
            let delay = parse_secs(keys::RECONNECT_BACKOFF, &v)?;
            cfg.reconnect = BackoffPolicy {
                jitter: cfg.reconnect.jitter,
                ..BackoffPolicy::constant(delay)
            };
        }
        if let Some(v) = get(keys::RECONNECT_JITTER) {
            cfg.reconnect.jitter =
                v.parse::<JitterPolicy>()
                    .map_err(|reason| ConfigError::Invalid {
                        key: keys::RECONNECT_JITTER,
                        reason,
                    })?;
        }
        if let Some(v) = get(keys::SEND_TIMEOUT) {
            cfg.send_timeout = parse_nonzero_secs(keys::SEND_TIMEOUT, &v)?;
        }
        if let Some(v) = get(keys::CONNECT_TIMEOUT) {
            cfg.connect_timeout = parse_nonzero_secs(keys::CONNECT_TIMEOUT, &v)?;
        }
        if let Some(v) = get(keys::SEND_CONCURRENCY) {
            cfg.send_concurrency = v.parse().map_err(|e| ConfigError::Invalid {
                key: keys::SEND_CONCURRENCY,
                reason: format!("{e}"),
            })?;
        }
        if let Some(v) = get(keys::SHUTDOWN_GRACE) {
            cfg.grace = parse_secs(keys::SHUTDOWN_GRACE, &v)?;
        }
        if let Some(v) = get(keys::GATEWAY_URL) {
            cfg.gateway.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get(keys::GATEWAY_TOKEN) {
            cfg.gateway.token = v;
        }
        if let Some(v) = get(keys::GATEWAY_SESSION) {
            cfg.gateway.session = v;
        }
        if let Some(v) = get(keys::HEARTBEAT) {
            cfg.gateway.heartbeat = parse_secs(keys::HEARTBEAT, &v)?;
        }

        Ok(cfg)
    }

    /// Returns the number of sends allowed in flight, clamped to a minimum of 1.
    #[inline]
    pub fn send_concurrency_clamped(&self) -> usize {
        self.send_concurrency.max(1)
    }

    /// Returns the shutdown grace as an `Option`.
    ///
    /// - `None` → do not wait
    /// - `Some(d)` → wait up to `d`
    #[inline]
    pub fn shutdown_grace(&self) -> Option<Duration> {
        if self.grace.is_zero() {
            None
        } else {
            Some(self.grace)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

fn parse_secs(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ConfigError::Invalid {
            key,
            reason: format!("{raw:?} is not a number of seconds: {e}"),
        })
}

/// A missing env file is not a problem; anything else is.
fn env_file_problem(loaded: Result<(), dotenvy::Error>) -> Option<dotenvy::Error> {
    match loaded {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}

fn parse_nonzero_secs(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let secs = parse_secs(key, raw)?;
    if secs.is_zero() {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_store_url_is_an_error() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing {
                key: keys::STORE_URL
            }
        );
        assert_eq!(err.as_label(), "config_missing");
    }

    #[test]
    fn test_defaults_apply_when_unset() {
        let cfg = Config::from_lookup(lookup(&[(keys::STORE_URL, "sqlite::memory:")])).unwrap();
        assert_eq!(cfg.store_url, "sqlite::memory:");
        assert_eq!(cfg.dispatch_interval, Duration::from_secs(60));
        assert_eq!(cfg.country_prefix, "91");
        assert_eq!(cfg.reconnect.next(0), Duration::from_secs(5));
        assert_eq!(cfg.reconnect.next(7), Duration::from_secs(5));
        assert_eq!(cfg.send_concurrency_clamped(), 1);
    }

    #[test]
    fn test_fallback_database_url() {
        let cfg = Config::from_lookup(lookup(&[(keys::STORE_URL_FALLBACK, "events.db")])).unwrap();
        assert_eq!(cfg.store_url, "events.db");
    }

    #[test]
    fn test_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            (keys::STORE_URL, "events.db"),
            (keys::DISPATCH_INTERVAL, "10"),
            (keys::COUNTRY_PREFIX, "+44"),
            (keys::RECONNECT_BACKOFF, "2"),
            (keys::RECONNECT_JITTER, "equal"),
            (keys::SEND_CONCURRENCY, "0"),
            (keys::GATEWAY_URL, "http://gw.local/"),
        ]))
        .unwrap();
        assert_eq!(cfg.dispatch_interval, Duration::from_secs(10));
        assert_eq!(cfg.country_prefix, "44");
        assert_eq!(cfg.reconnect.first, Duration::from_secs(2));
        assert_eq!(cfg.reconnect.jitter, JitterPolicy::Equal);
        assert_eq!(cfg.send_concurrency_clamped(), 1);
        assert_eq!(cfg.gateway.base_url, "http://gw.local");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for (key, value) in [
            (keys::DISPATCH_INTERVAL, "0"),
            (keys::DISPATCH_INTERVAL, "soon"),
            (keys::SEND_TIMEOUT, "0"),
            (keys::CONNECT_TIMEOUT, "0"),
            (keys::COUNTRY_PREFIX, "9a"),
            (keys::RECONNECT_JITTER, "chaotic"),
        ] {
            let err = Config::from_lookup(lookup(&[(keys::STORE_URL, "x.db"), (key, value)]))
                .unwrap_err();
            assert_eq!(err.as_label(), "config_invalid", "{key}={value}");
        }
    }

    #[test]
    fn test_send_timeout_cannot_be_disabled() {
        let err = Config::from_lookup(lookup(&[(keys::STORE_URL, "x.db"), (keys::SEND_TIMEOUT, "0")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: keys::SEND_TIMEOUT,
                reason: "must be greater than zero".into(),
            }
        );

        let cfg = Config::from_lookup(lookup(&[(keys::STORE_URL, "x.db"), (keys::SEND_TIMEOUT, "1")]))
            .unwrap();
        assert_eq!(cfg.send_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_env_file_problems() {
        let dir = tempfile::tempdir().unwrap();
        assert!(env_file_problem(dotenvy::from_path(dir.path().join("absent.env"))).is_none());

        let broken = dir.path().join("broken.env");
        std::fs::write(&broken, "REMINDVISOR_TEST_BROKEN=\"unterminated\n").unwrap();
        assert!(env_file_problem(dotenvy::from_path(&broken)).is_some());
    }
}
