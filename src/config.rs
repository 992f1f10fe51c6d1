//! The two JSON documents the harness is driven by.
//!
//! ```json
//! { "container_name": "grafana", "systemd_timeout": 10, "monit_timeout": 60, "docker_timeout": 30 }
//! { "host": "127.0.0.1", "port": 80, "default_user": "admin", "default_password": "admin" }
//! ```
//!
//! A key that is absent, `null`, empty or zero is reported as missing, before
//! any scenario runs.

use crate::error::{HarnessError, Result};
use serde::Deserialize;
use std::path::Path;

/// Target container and the timeouts (in seconds) used against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSettings {
    pub container_name: String,
    /// How long systemd may take to bring monit back.
    pub systemd_timeout: u64,
    /// How long monit may take to bring grafana-server or nginx back.
    pub monit_timeout: u64,
    /// How long a container may take to reach `running` or `exited`.
    pub docker_timeout: u64,
}

impl ContainerSettings {
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&read_config(path)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str::<ContainerConfigFile>(text)?.validate()
    }
}

/// Where Grafana listens and the credentials it was provisioned with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrafanaSettings {
    pub host: String,
    pub port: u16,
    pub default_user: String,
    pub default_password: String,
}

impl GrafanaSettings {
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&read_config(path)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str::<GrafanaConfigFile>(text)?.validate()
    }
}

/// A number written either as `30` or as `"30"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NumberSetting {
    Number(u64),
    Text(String),
}

/// The container document as written. Every key is optional here so that a
/// missing one can be reported by name.
#[derive(Debug, Deserialize)]
struct ContainerConfigFile {
    container_name: Option<String>,
    systemd_timeout: Option<NumberSetting>,
    monit_timeout: Option<NumberSetting>,
    docker_timeout: Option<NumberSetting>,
}

impl ContainerConfigFile {
    fn validate(self) -> Result<ContainerSettings> {
        Ok(ContainerSettings {
            container_name: require_string("container_name", self.container_name)?,
            systemd_timeout: require_u64("systemd_timeout", self.systemd_timeout)?,
            monit_timeout: require_u64("monit_timeout", self.monit_timeout)?,
            docker_timeout: require_u64("docker_timeout", self.docker_timeout)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GrafanaConfigFile {
    host: Option<String>,
    port: Option<NumberSetting>,
    default_user: Option<String>,
    default_password: Option<String>,
}

impl GrafanaConfigFile {
    fn validate(self) -> Result<GrafanaSettings> {
        let port = require_u64("port", self.port)?;
        let port = u16::try_from(port).map_err(|_| HarnessError::ConfigurationType {
            key: "port".to_string(),
            expected: "a TCP port",
        })?;

        Ok(GrafanaSettings {
            host: require_string("host", self.host)?,
            port,
            default_user: require_string("default_user", self.default_user)?,
            default_password: require_string("default_password", self.default_password)?,
        })
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| HarnessError::ConfigurationUnreadable {
        path: path.to_path_buf(),
        source,
    })
}

fn require_string(key: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(missing(key)),
    }
}

/// Zero counts as missing.
fn require_u64(key: &str, value: Option<NumberSetting>) -> Result<u64> {
    let parsed = match value {
        None => return Err(missing(key)),
        Some(NumberSetting::Number(n)) => Some(n),
        Some(NumberSetting::Text(s)) if s.trim().is_empty() => return Err(missing(key)),
        Some(NumberSetting::Text(s)) => s.trim().parse().ok(),
    };

    match parsed {
        Some(0) => Err(missing(key)),
        Some(v) => Ok(v),
        None => Err(HarnessError::ConfigurationType {
            key: key.to_string(),
            expected: "a positive integer",
        }),
    }
}

fn missing(key: &str) -> HarnessError {
    HarnessError::ConfigurationMissing(key.to_string())
}
