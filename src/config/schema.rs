//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::load_balancer::ring::{DEFAULT_KEYSPACE, DEFAULT_VIRTUAL_NODES};

/// Root configuration for the ring proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration for proxied traffic.
    pub listener: ListenerConfig,

    /// Hash ring settings.
    pub ring: RingConfig,

    /// Request routing settings.
    pub routing: RoutingConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Administrative API settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Backends registered at startup and on config reload.
    pub backends: Vec<BackendConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
        }
    }
}

/// Hash ring configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RingConfig {
    /// Number of ring positions; keys and virtual nodes live in `[0, keyspace)`.
    pub keyspace: u64,

    /// Virtual nodes per backend unless overridden at registration.
    pub virtual_nodes: u32,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            keyspace: DEFAULT_KEYSPACE,
            virtual_nodes: DEFAULT_VIRTUAL_NODES,
        }
    }
}

/// How the router derives a ring key from a request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum KeyPolicy {
    /// Uniform random key per request, for even spreading without affinity.
    #[default]
    Random,
    /// Hash of the named request header, for session affinity.
    Header { name: String },
    /// Hash of the request path and query.
    Path,
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RoutingConfig {
    /// Key derivation policy.
    pub key: KeyPolicy,

    /// Upper bound on a single forward to a backend, in milliseconds.
    pub forward_timeout_ms: u64,
}

impl RoutingConfig {
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            key: KeyPolicy::Random,
            forward_timeout_ms: 10_000,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Time between probe cycles in milliseconds.
    pub interval_ms: u64,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Path to probe on each backend.
    pub path: String,

    /// Consecutive failed probes before a backend is evicted.
    pub failure_threshold: u32,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 5_000,
            timeout_ms: 2_000,
            path: "/health".to_string(),
            failure_threshold: 3,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API listener.
    pub enabled: bool,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A backend declared in the config file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BackendConfig {
    /// Backend identifier and address (e.g., "127.0.0.1:3000").
    pub id: String,

    /// Virtual node override for this backend.
    #[serde(default)]
    pub virtual_nodes: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config, ProxyConfig::default());
        assert_eq!(config.ring.virtual_nodes, 50);
        assert_eq!(config.ring.keyspace, 1 << 32);
        assert_eq!(config.routing.key, KeyPolicy::Random);
        assert_eq!(config.health_check.failure_threshold, 3);
    }

    #[test]
    fn test_full_config_parses() {
        let raw = r#"
            [listener]
            bind_address = "127.0.0.1:5000"

            [ring]
            keyspace = 65536
            virtual_nodes = 100

            [routing]
            forward_timeout_ms = 1500
            key = { policy = "header", name = "x-session-id" }

            [health_check]
            interval_ms = 1000
            timeout_ms = 250
            failure_threshold = 1

            [[backends]]
            id = "127.0.0.1:5001"

            [[backends]]
            id = "127.0.0.1:5002"
            virtual_nodes = 10
        "#;

        let config: ProxyConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.ring.keyspace, 65536);
        assert_eq!(
            config.routing.key,
            KeyPolicy::Header { name: "x-session-id".to_string() }
        );
        assert_eq!(config.routing.forward_timeout(), Duration::from_millis(1500));
        assert_eq!(config.health_check.path, "/health");
        assert_eq!(config.health_check.timeout(), Duration::from_millis(250));
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[1].virtual_nodes, Some(10));
    }

    #[test]
    fn test_path_policy_parses() {
        let config: ProxyConfig =
            toml::from_str("[routing]\nkey = { policy = \"path\" }\n").unwrap();
        assert_eq!(config.routing.key, KeyPolicy::Path);
    }
}
