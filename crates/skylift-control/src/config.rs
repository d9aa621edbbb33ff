//! Control plane configuration.

use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;
use skylift_build::BuildConfig;

use crate::error::{ControlError, ControlResult};

/// Root configuration for the platform service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControlConfig {
    /// Workspace and image settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// Registry persistence settings.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Cluster settings.
    #[serde(default)]
    pub cluster: ClusterConfig,
}

impl ControlConfig {
    /// Load configuration from `skylift.toml` and the environment.
    pub fn load() -> ControlResult<Self> {
        Figment::new()
            .merge(Toml::file("skylift.toml"))
            .merge(Env::prefixed("SKYLIFT_").split("_"))
            .extract()
            .map_err(|e| ControlError::Validation(e.to_string()))
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &str) -> ControlResult<Self> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("SKYLIFT_").split("_"))
            .extract()
            .map_err(|e| ControlError::Validation(e.to_string()))
    }
}

/// Registry persistence settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Path of the registry file.
    #[serde(default = "default_registry_file")]
    pub file: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            file: default_registry_file(),
        }
    }
}

fn default_registry_file() -> PathBuf {
    PathBuf::from("/var/lib/skylift/registry.json")
}

/// Cluster settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// Address applications are exposed on (becomes part of their URLs).
    #[serde(default = "default_server_ip")]
    pub server_ip: String,

    /// Bounded wait for rollout readiness, in seconds.
    #[serde(default = "default_rollout_timeout_secs")]
    pub rollout_timeout_secs: u64,
}

impl ClusterConfig {
    /// The rollout wait as a [`Duration`].
    #[must_use]
    pub const fn rollout_timeout(&self) -> Duration {
        Duration::from_secs(self.rollout_timeout_secs)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            server_ip: default_server_ip(),
            rollout_timeout_secs: default_rollout_timeout_secs(),
        }
    }
}

fn default_server_ip() -> String {
    "127.0.0.1".to_owned()
}

fn default_rollout_timeout_secs() -> u64 {
    90
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ControlConfig::default();
        assert_eq!(config.cluster.server_ip, "127.0.0.1");
        assert_eq!(config.cluster.rollout_timeout(), Duration::from_secs(90));
        assert!(config.registry.file.is_absolute());
    }

    #[test]
    fn config_parses_from_toml() {
        let figment = Figment::new().merge(figment::providers::Toml::string(
            r#"
                [cluster]
                server_ip = "10.0.0.2"
                rollout_timeout_secs = 30

                [build]
                registry_host = "registry.internal:5000"
            "#,
        ));
        let config: ControlConfig = figment.extract().expect("parse");
        assert_eq!(config.cluster.server_ip, "10.0.0.2");
        assert_eq!(config.cluster.rollout_timeout_secs, 30);
        assert_eq!(config.build.registry_host, "registry.internal:5000");
    }
}
