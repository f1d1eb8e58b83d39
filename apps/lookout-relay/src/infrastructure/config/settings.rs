//! Relay Configuration Settings
//!
//! Configuration types for the relay, loaded from environment variables.
//! The relay holds no upstream credentials: every request forwards the
//! browser session's own cookie, so configuration is all endpoints,
//! intervals, and capacities.

use std::time::Duration;

use crate::infrastructure::ratelimit::RateLimitSettings;
use crate::infrastructure::snapshot::SnapshotSettings;

/// Default upstream REST base URL.
const DEFAULT_API_URL: &str = "https://api.vrchat.cloud/api/1";

/// Default upstream pipeline WebSocket URL.
const DEFAULT_PIPELINE_URL: &str = "wss://pipeline.vrchat.cloud";

/// Upstream endpoint settings.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// REST API base URL.
    pub api_base_url: String,
    /// Pipeline WebSocket base URL.
    pub pipeline_base_url: String,
    /// User agent presented on every upstream call.
    pub user_agent: String,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            pipeline_base_url: DEFAULT_PIPELINE_URL.to_string(),
            user_agent: format!("lookout-relay/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// API server port (snapshot, stream, worlds).
    pub api_port: u16,
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            api_port: 8080,
            health_port: 8081,
        }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Upstream endpoint settings.
    pub upstream: UpstreamSettings,
    /// Server port settings.
    pub server: ServerSettings,
    /// Interval between browser-channel heartbeat pings.
    pub heartbeat_interval: Duration,
    /// Snapshot read settings.
    pub snapshot: SnapshotSettings,
    /// TTL for the in-memory world cache.
    pub world_cache_ttl: Duration,
    /// API rate limiter settings.
    pub rate_limit: RateLimitSettings,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            upstream: UpstreamSettings::default(),
            server: ServerSettings::default(),
            heartbeat_interval: Duration::from_secs(15),
            snapshot: SnapshotSettings::default(),
            world_cache_ttl: Duration::from_secs(24 * 60 * 60),
            rate_limit: RateLimitSettings::default(),
        }
    }
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an overridden endpoint value is empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let upstream = UpstreamSettings {
            api_base_url: parse_env_url("LOOKOUT_UPSTREAM_API_URL", defaults.upstream.api_base_url)?,
            pipeline_base_url: parse_env_url(
                "LOOKOUT_UPSTREAM_PIPELINE_URL",
                defaults.upstream.pipeline_base_url,
            )?,
            user_agent: parse_env_url("LOOKOUT_USER_AGENT", defaults.upstream.user_agent)?,
        };

        let server = ServerSettings {
            api_port: parse_env_u16("LOOKOUT_API_PORT", defaults.server.api_port),
            health_port: parse_env_u16("LOOKOUT_HEALTH_PORT", defaults.server.health_port),
        };

        let snapshot = SnapshotSettings {
            page_size: parse_env_usize("LOOKOUT_SNAPSHOT_PAGE_SIZE", defaults.snapshot.page_size),
            batch_size: parse_env_usize("LOOKOUT_SNAPSHOT_BATCH_SIZE", defaults.snapshot.batch_size),
            batch_delay: parse_env_duration_millis(
                "LOOKOUT_SNAPSHOT_BATCH_DELAY_MS",
                defaults.snapshot.batch_delay,
            ),
        };

        let rate_limit = RateLimitSettings {
            max_requests: parse_env_u32("LOOKOUT_RATE_LIMIT_MAX", defaults.rate_limit.max_requests),
            window: parse_env_duration_secs(
                "LOOKOUT_RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit.window,
            ),
        };

        Ok(Self {
            upstream,
            server,
            heartbeat_interval: parse_env_duration_secs(
                "LOOKOUT_HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat_interval,
            ),
            snapshot,
            world_cache_ttl: parse_env_duration_secs(
                "LOOKOUT_WORLD_CACHE_TTL_SECS",
                defaults.world_cache_ttl,
            ),
            rate_limit,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn parse_env_url(key: &str, default: String) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::EmptyValue(key.to_string())),
        Ok(value) => Ok(value),
        Err(_) => Ok(default),
    }
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = RelayConfig::default();
        assert_eq!(config.server.api_port, 8080);
        assert_eq!(config.server.health_port, 8081);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(config.snapshot.page_size, 100);
        assert_eq!(config.world_cache_ttl, Duration::from_secs(86_400));
        assert!(config.upstream.api_base_url.starts_with("https://"));
        assert!(config.upstream.pipeline_base_url.starts_with("wss://"));
    }

    #[test]
    fn heartbeat_default_within_channel_keepalive_range() {
        let config = RelayConfig::default();
        assert!(config.heartbeat_interval >= Duration::from_secs(10));
        assert!(config.heartbeat_interval <= Duration::from_secs(20));
    }
}
