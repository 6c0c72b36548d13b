// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the relay. Configuration is loaded from the environment at
//! startup into an explicit [`RelayConfig`] that is passed to the server.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8000` |
//! | `STORE_PATH` | Channel store location (redb file, `:memory:`, or `redis://` URL) | `/data/relay.redb` |
//! | `CHANNEL_TTL_SECS` | Channel lifetime in seconds | `3600` |
//! | `CORS_ORIGIN` | `*` or comma-separated allowed origins | `*` |
//! | `AUTH_KEY` | Shared secret required to authenticate a channel | `farcaster-connect-auth-key` |
//! | `IDENTITY_SOURCE` | `hub` or `embedded` (trusts the signed message, development only) | `hub` |
//! | `HUB_URL` | Hub HTTP API used to resolve account identities (required in `hub` mode) | unset |
//! | `CONNECT_URI_BASE` | Base of the deep link handed to wallets | `https://warpcast.com/~/sign-in-with-farcaster` |
//! | `LONG_POLL_TIMEOUT_SECS` | Max wait of a long-poll status request | `30` |
//! | `SWEEP_INTERVAL_SECS` | Period of the expired-channel sweep | `60` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the channel store location.
///
/// A filesystem path opens (or creates) a redb database there. The special
/// value [`IN_MEMORY_STORE`] keeps channels in process memory only. A
/// `redis://` or `rediss://` URL selects a Redis server shared by every relay
/// process pointing at it.
pub const STORE_PATH_ENV: &str = "STORE_PATH";
pub const CHANNEL_TTL_ENV: &str = "CHANNEL_TTL_SECS";
pub const CORS_ORIGIN_ENV: &str = "CORS_ORIGIN";
pub const AUTH_KEY_ENV: &str = "AUTH_KEY";
pub const IDENTITY_SOURCE_ENV: &str = "IDENTITY_SOURCE";
pub const HUB_URL_ENV: &str = "HUB_URL";
pub const CONNECT_URI_BASE_ENV: &str = "CONNECT_URI_BASE";
pub const LONG_POLL_TIMEOUT_ENV: &str = "LONG_POLL_TIMEOUT_SECS";
pub const SWEEP_INTERVAL_ENV: &str = "SWEEP_INTERVAL_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const IN_MEMORY_STORE: &str = ":memory:";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_STORE_PATH: &str = "/data/relay.redb";
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_AUTH_KEY: &str = "farcaster-connect-auth-key";
pub const DEFAULT_CONNECT_URI_BASE: &str = "https://warpcast.com/~/sign-in-with-farcaster";
pub const DEFAULT_LONG_POLL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Allowed browser origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigin {
    Any,
    List(Vec<String>),
}

impl CorsOrigin {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value == "*" {
            return CorsOrigin::Any;
        }
        CorsOrigin::List(
            value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect(),
        )
    }
}

/// Where channels are stored, as named by `STORE_PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    Redis(String),
    File(PathBuf),
}

impl StoreLocation {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value == IN_MEMORY_STORE {
            StoreLocation::Memory
        } else if value.starts_with("redis://") || value.starts_with("rediss://") {
            StoreLocation::Redis(value.to_string())
        } else {
            StoreLocation::File(PathBuf::from(value))
        }
    }
}

/// Redis URLs may carry credentials, so only the scheme is shown.
impl std::fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreLocation::Memory => f.write_str(IN_MEMORY_STORE),
            StoreLocation::Redis(_) => f.write_str("redis"),
            StoreLocation::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// How account identities (custody and verified addresses) are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentityMode {
    /// Ask the hub at `HUB_URL`.
    #[default]
    Hub,
    /// Trust the address inside the signed message. Fid ownership is not
    /// checked, so this is for local development only.
    Embedded,
}

impl IdentityMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hub" => Some(IdentityMode::Hub),
            "embedded" => Some(IdentityMode::Embedded),
            _ => None,
        }
    }
}

/// Relay server configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub store_path: String,
    pub ttl: Duration,
    pub cors_origin: CorsOrigin,
    pub auth_key: String,
    pub identity_mode: IdentityMode,
    pub hub_url: Option<String>,
    pub connect_uri_base: String,
    pub long_poll_timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            store_path: DEFAULT_STORE_PATH.to_string(),
            ttl: DEFAULT_TTL,
            cors_origin: CorsOrigin::Any,
            auth_key: DEFAULT_AUTH_KEY.to_string(),
            identity_mode: IdentityMode::Hub,
            hub_url: None,
            connect_uri_base: DEFAULT_CONNECT_URI_BASE.to_string(),
            long_poll_timeout: DEFAULT_LONG_POLL_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl RelayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .map(|raw| match raw.trim().parse::<u64>() {
                    Ok(secs) if secs > 0 => Duration::from_secs(secs),
                    _ => {
                        warn!(variable = key, value = %raw, "Invalid duration, using default");
                        default
                    }
                })
                .unwrap_or(default)
        };

        let port = lookup(PORT_ENV)
            .map(|raw| {
                raw.trim().parse().unwrap_or_else(|_| {
                    warn!(value = %raw, "Invalid PORT, using default");
                    DEFAULT_PORT
                })
            })
            .unwrap_or(defaults.port);

        let identity_mode = lookup(IDENTITY_SOURCE_ENV)
            .map(|raw| {
                IdentityMode::parse(&raw).unwrap_or_else(|| {
                    warn!(value = %raw, "Invalid IDENTITY_SOURCE, using hub");
                    IdentityMode::Hub
                })
            })
            .unwrap_or(defaults.identity_mode);

        Self {
            host: lookup(HOST_ENV).unwrap_or(defaults.host),
            port,
            store_path: lookup(STORE_PATH_ENV).unwrap_or(defaults.store_path),
            ttl: secs(CHANNEL_TTL_ENV, defaults.ttl),
            cors_origin: lookup(CORS_ORIGIN_ENV)
                .map(|raw| CorsOrigin::parse(&raw))
                .unwrap_or(defaults.cors_origin),
            auth_key: lookup(AUTH_KEY_ENV).unwrap_or(defaults.auth_key),
            identity_mode,
            hub_url: lookup(HUB_URL_ENV).filter(|url| !url.trim().is_empty()),
            connect_uri_base: lookup(CONNECT_URI_BASE_ENV).unwrap_or(defaults.connect_uri_base),
            long_poll_timeout: secs(LONG_POLL_TIMEOUT_ENV, defaults.long_poll_timeout),
            sweep_interval: secs(SWEEP_INTERVAL_ENV, defaults.sweep_interval),
        }
    }

    pub fn store_location(&self) -> StoreLocation {
        StoreLocation::parse(&self.store_path)
    }

    /// Configuration suited to tests: in-memory store, ephemeral port,
    /// message-embedded identities.
    pub fn ephemeral() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            store_path: IN_MEMORY_STORE.to_string(),
            identity_mode: IdentityMode::Embedded,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = RelayConfig::from_lookup(|_| None);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.ttl, DEFAULT_TTL);
        assert_eq!(config.cors_origin, CorsOrigin::Any);
        assert_eq!(config.auth_key, DEFAULT_AUTH_KEY);
        assert_eq!(config.identity_mode, IdentityMode::Hub);
        assert!(config.hub_url.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = RelayConfig::from_lookup(lookup_from(&[
            (PORT_ENV, "9100"),
            (STORE_PATH_ENV, ":memory:"),
            (CHANNEL_TTL_ENV, "120"),
            (CORS_ORIGIN_ENV, "https://a.example, https://b.example"),
            (HUB_URL_ENV, "https://hub.example.com:2281"),
        ]));
        assert_eq!(config.port, 9100);
        assert_eq!(config.store_path, IN_MEMORY_STORE);
        assert_eq!(config.ttl, Duration::from_secs(120));
        assert_eq!(
            config.cors_origin,
            CorsOrigin::List(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
        assert_eq!(config.hub_url.as_deref(), Some("https://hub.example.com:2281"));
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = RelayConfig::from_lookup(lookup_from(&[
            (PORT_ENV, "eighty"),
            (CHANNEL_TTL_ENV, "0"),
            (LONG_POLL_TIMEOUT_ENV, "-5"),
        ]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.ttl, DEFAULT_TTL);
        assert_eq!(config.long_poll_timeout, DEFAULT_LONG_POLL_TIMEOUT);
    }

    #[test]
    fn identity_source_is_opt_in_embedded() {
        let embedded = RelayConfig::from_lookup(lookup_from(&[(IDENTITY_SOURCE_ENV, "Embedded")]));
        assert_eq!(embedded.identity_mode, IdentityMode::Embedded);

        let typo = RelayConfig::from_lookup(lookup_from(&[(IDENTITY_SOURCE_ENV, "embeded")]));
        assert_eq!(typo.identity_mode, IdentityMode::Hub);
    }

    #[test]
    fn store_location_from_path() {
        assert_eq!(StoreLocation::parse(":memory:"), StoreLocation::Memory);
        assert_eq!(
            StoreLocation::parse("redis://cache:6379/2"),
            StoreLocation::Redis("redis://cache:6379/2".to_string())
        );
        assert_eq!(
            StoreLocation::parse("rediss://cache.example:6380"),
            StoreLocation::Redis("rediss://cache.example:6380".to_string())
        );
        assert_eq!(
            StoreLocation::parse("redis://:secret@cache:6379").to_string(),
            "redis"
        );
        assert_eq!(
            RelayConfig::default().store_location(),
            StoreLocation::File(PathBuf::from(DEFAULT_STORE_PATH))
        );
    }

    #[test]
    fn cors_wildcard_and_blank_mean_any() {
        assert_eq!(CorsOrigin::parse("*"), CorsOrigin::Any);
        assert_eq!(CorsOrigin::parse("  "), CorsOrigin::Any);
    }
}
