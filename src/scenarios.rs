//! End-to-end checks of a Grafana container.
//!
//! Container scenarios disrupt the container and its units in place, so they
//! run strictly in sequence; each one leaves the target running.

use crate::config::{ContainerSettings, GrafanaSettings};
use crate::container::ContainerState;
use crate::error::{HarnessError, Result};
use crate::executor::CommandRunner;
use crate::grafana::{expect_status, DatasourceUpdate, GrafanaClient, NewDatasource, ADMIN_SETTINGS, ADMIN_STATS};
use crate::systemd::ManagedService;
use crate::verify::{ContainerDisruption, RestartVerifier, ServiceDisruption};
use reqwest::StatusCode;
use tracing::{info, warn};

pub const GRAFANA_SERVER: &str = "grafana-server.service";
pub const MONIT: &str = "monit.service";
pub const NGINX: &str = "nginx.service";

/// Units restarted by monit when they go down.
pub const MONIT_WATCHED: [&str; 2] = [GRAFANA_SERVER, NGINX];

const ADMIN_ENDPOINTS: [&str; 2] = [ADMIN_SETTINGS, ADMIN_STATS];

/// Outcome of one named scenario.
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub outcome: Result<()>,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct SuiteReport {
    pub results: Vec<ScenarioResult>,
}

impl SuiteReport {
    fn record(&mut self, name: impl Into<String>, outcome: Result<()>) {
        let name = name.into();
        match &outcome {
            Ok(()) => info!("PASS {}", name),
            Err(e) if e.is_assertion() => warn!("FAIL {}: {}", name, e),
            Err(e) => warn!("ERROR {}: {}", name, e),
        }
        self.results.push(ScenarioResult { name, outcome });
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

/// Scenarios that drive the container through docker and systemd.
pub struct ContainerScenarios<'a, R> {
    verifier: &'a RestartVerifier<R>,
    settings: &'a ContainerSettings,
}

impl<'a, R: CommandRunner + Clone> ContainerScenarios<'a, R> {
    pub fn new(verifier: &'a RestartVerifier<R>, settings: &'a ContainerSettings) -> Self {
        Self { verifier, settings }
    }

    fn service(&self, unit: &str) -> ManagedService {
        ManagedService::new(&self.settings.container_name, unit)
    }

    /// Starts the container if a previous run left it stopped.
    pub async fn ensure_running(&self) -> Result<()> {
        let name = &self.settings.container_name;
        let containers = self.verifier.containers();
        if containers.state(name).await? != ContainerState::Running {
            warn!("container {} is not running, starting it", name);
            containers.start(name, self.settings.docker_timeout).await?.into_result()?;
        }
        Ok(())
    }

    pub async fn container_running(&self) -> Result<()> {
        let name = &self.settings.container_name;
        let status = self.verifier.containers().status(name).await?;
        if !status.contains("running") {
            return Err(HarnessError::Assertion(format!(
                "container {} is {}",
                name,
                status.trim()
            )));
        }
        Ok(())
    }

    pub async fn services_running(&self) -> Result<()> {
        for unit in [GRAFANA_SERVER, MONIT, NGINX] {
            if !self.verifier.prober().is_running(&self.service(unit)).await? {
                return Err(HarnessError::Assertion(format!("{unit} is not active")));
            }
        }
        Ok(())
    }

    /// monit must bring `unit` back after it was stopped or killed.
    pub async fn restart_with_monit(&self, unit: &str, disruption: ServiceDisruption) -> Result<()> {
        self.verifier
            .verify_service_restart(&self.service(unit), disruption, self.settings.monit_timeout)
            .await?;
        Ok(())
    }

    /// systemd must bring monit back after it was killed. systemd restarts
    /// quickly, so only the new activation timestamp proves anything.
    pub async fn restart_monit_with_systemd(&self) -> Result<()> {
        self.verifier
            .verify_service_restart(
                &self.service(MONIT),
                ServiceDisruption::Kill,
                self.settings.systemd_timeout,
            )
            .await?;
        Ok(())
    }

    /// After stopping and starting the container, grafana-server must come up
    /// without monit logging an error.
    pub async fn clean_monit_logs_after_container_restart(&self) -> Result<()> {
        let report = self
            .verifier
            .verify_container_restart(
                &self.settings.container_name,
                ContainerDisruption::Stop,
                self.settings.docker_timeout,
            )
            .await?;

        self.verifier
            .await_service(&self.service(GRAFANA_SERVER), self.settings.monit_timeout)
            .await?;

        // journalctl matches "monit" and "monit.service" alike
        self.verifier
            .assert_no_errors_since(&self.service("monit"), &report.after)
            .await
    }

    pub async fn run(&self, report: &mut SuiteReport) {
        if let Err(e) = self.ensure_running().await {
            report.record("ensure_running", Err(e));
            return;
        }

        report.record("container_running", self.container_running().await);
        report.record("services_running", self.services_running().await);

        for unit in MONIT_WATCHED {
            for disruption in [ServiceDisruption::Stop, ServiceDisruption::Kill] {
                report.record(
                    format!("restart_with_monit[{unit}-{disruption}]"),
                    self.restart_with_monit(unit, disruption).await,
                );
            }
        }

        report.record("restart_monit_with_systemd", self.restart_monit_with_systemd().await);
        report.record(
            "clean_monit_logs_after_container_restart",
            self.clean_monit_logs_after_container_restart().await,
        );
    }
}

/// Scenarios against the Grafana HTTP API.
pub struct ApiScenarios {
    client: GrafanaClient,
}

impl ApiScenarios {
    pub fn new(settings: &GrafanaSettings) -> Result<Self> {
        Ok(Self {
            client: GrafanaClient::from_settings(settings)?,
        })
    }

    pub fn from_client(client: GrafanaClient) -> Self {
        Self { client }
    }

    pub async fn admin_api_requires_credentials(&self, path: &str) -> Result<()> {
        let status = self.client.anonymous().get_status(path).await?;
        expect_status("GET", path, StatusCode::UNAUTHORIZED, status)
    }

    pub async fn admin_api_with_credentials(&self, path: &str) -> Result<()> {
        let status = self.client.get_status(path).await?;
        expect_status("GET", path, StatusCode::OK, status)
    }

    /// Creates, updates and deletes a uniquely named datasource.
    pub async fn datasource_round_trip(&self) -> Result<()> {
        let datasource = NewDatasource::graphite(uuid::Uuid::new_v4().to_string(), "http://mydatasource.com");

        let created = self.client.create_datasource(&datasource).await?;
        info!("Data source created with id {} in org {}", created.id, created.org_id);

        let update = DatasourceUpdate::enable_basic_auth(created, &datasource, "basicuser", "basicuser");
        self.client.update_datasource(&update).await?;
        info!("Data source {} updated", created.id);

        self.client.delete_datasource(created.id).await?;
        info!("Data source {} deleted", created.id);
        Ok(())
    }

    pub async fn run(&self, report: &mut SuiteReport) {
        for path in ADMIN_ENDPOINTS {
            report.record(
                format!("admin_api_requires_credentials[{path}]"),
                self.admin_api_requires_credentials(path).await,
            );
        }
        for path in ADMIN_ENDPOINTS {
            report.record(
                format!("admin_api_with_credentials[{path}]"),
                self.admin_api_with_credentials(path).await,
            );
        }
        report.record("datasource_round_trip", self.datasource_round_trip().await);
    }
}
