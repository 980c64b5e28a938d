//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (keyspace, virtual nodes, timeouts > 0)
//! - Check backend ids are usable upstream authorities and unique
//! - Check bind addresses and the affinity header name
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderName;

use crate::config::schema::{KeyPolicy, ProxyConfig};
use crate::load_balancer::BackendId;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }
    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.ring.keyspace == 0 {
        errors.push(ValidationError::new("ring.keyspace", "must be at least 1"));
    }
    if config.ring.virtual_nodes == 0 {
        errors.push(ValidationError::new("ring.virtual_nodes", "must be at least 1"));
    }

    if config.routing.forward_timeout_ms == 0 {
        errors.push(ValidationError::new("routing.forward_timeout_ms", "must be greater than 0"));
    }
    if let KeyPolicy::Header { name } = &config.routing.key {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "routing.key.name",
                format!("{:?} is not a valid header name", name),
            ));
        }
    }

    let hc = &config.health_check;
    if hc.enabled {
        if hc.interval_ms == 0 {
            errors.push(ValidationError::new("health_check.interval_ms", "must be greater than 0"));
        }
        if hc.timeout_ms == 0 {
            errors.push(ValidationError::new("health_check.timeout_ms", "must be greater than 0"));
        }
        if hc.failure_threshold == 0 {
            errors.push(ValidationError::new(
                "health_check.failure_threshold",
                "must be at least 1",
            ));
        }
        if !hc.path.starts_with('/') {
            errors.push(ValidationError::new("health_check.path", "must start with '/'"));
        }
    }

    let mut seen = HashSet::new();
    for (i, backend) in config.backends.iter().enumerate() {
        let field = format!("backends[{}]", i);
        match BackendId::new(backend.id.as_str()) {
            Ok(id) => {
                if !seen.insert(id.clone()) {
                    errors.push(ValidationError::new(
                        field.clone(),
                        format!("duplicate backend {}", id),
                    ));
                }
            }
            Err(e) => errors.push(ValidationError::new(field.clone(), e.to_string())),
        }
        if backend.virtual_nodes == Some(0) {
            errors.push(ValidationError::new(
                format!("{}.virtual_nodes", field),
                "must be at least 1",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("{:?} is not a socket address", value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BackendConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ProxyConfig::default();
        config.ring.keyspace = 0;
        config.ring.virtual_nodes = 0;
        config.health_check.failure_threshold = 0;
        config.listener.bind_address = "nowhere".to_string();
        config.routing.key = KeyPolicy::Header { name: "bad header".to_string() };

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "ring.keyspace",
                "ring.virtual_nodes",
                "routing.key.name",
                "health_check.failure_threshold",
            ]
        );
    }

    #[test]
    fn test_rejects_bad_and_duplicate_backends() {
        let mut config = ProxyConfig::default();
        config.backends = vec![
            BackendConfig { id: "127.0.0.1:5001".into(), virtual_nodes: None },
            BackendConfig { id: "127.0.0.1:5001".into(), virtual_nodes: None },
            BackendConfig { id: "not a host".into(), virtual_nodes: Some(0) },
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].field, "backends[1]");
        assert!(errors[0].message.contains("duplicate"));
        assert_eq!(errors[1].field, "backends[2]");
        assert_eq!(errors[2].field, "backends[2].virtual_nodes");
    }

    #[test]
    fn test_disabled_health_check_skips_its_checks() {
        let mut config = ProxyConfig::default();
        config.health_check.enabled = false;
        config.health_check.interval_ms = 0;
        assert!(validate_config(&config).is_ok());
    }
}
