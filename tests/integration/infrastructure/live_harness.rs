use anyhow::{Context, Result};
use grafana_check::config::{ContainerSettings, GrafanaSettings};
use grafana_check::executor::{Docker, ProcessRunner};
use grafana_check::poll::Poller;
use grafana_check::verify::RestartVerifier;
use std::path::PathBuf;

pub const CONTAINER_CONFIG_ENV: &str = "GRAFANA_CHECK_CONFIG";
pub const GRAFANA_CONFIG_ENV: &str = "GRAFANA_CHECK_HTTP_CONFIG";

fn config_path(var: &str) -> Result<PathBuf> {
    std::env::var(var)
        .map(PathBuf::from)
        .with_context(|| format!("{var} must point at a JSON config file"))
}

/// A real container reachable through the local docker CLI.
pub struct LiveContainer {
    pub settings: ContainerSettings,
    pub verifier: RestartVerifier<ProcessRunner>,
}

impl LiveContainer {
    pub fn from_env() -> Result<Self> {
        let settings = ContainerSettings::load(&config_path(CONTAINER_CONFIG_ENV)?)?;
        let verifier = RestartVerifier::new(Docker::new(ProcessRunner), Poller::default());
        Ok(Self { settings, verifier })
    }
}

pub fn live_grafana_settings() -> Result<GrafanaSettings> {
    Ok(GrafanaSettings::load(&config_path(GRAFANA_CONFIG_ENV)?)?)
}
