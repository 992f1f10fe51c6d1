use crate::error::Result;
use crate::executor::{CommandRunner, Docker};
use crate::poll::{PollOutcome, Poller};
use crate::timestamp::{decode_iso8601_instant, TimestampPair};
use tracing::{debug, info};

const STATUS_FORMAT: &str = "--format='{{.State.Status}}'";
const STARTED_AT_FORMAT: &str = "--format='{{.State.StartedAt}}'";

/// Lifecycle state of a container as reported by `docker inspect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Exited,
    Unknown,
}

impl ContainerState {
    pub fn from_status(status: &str) -> Self {
        if status.contains("running") {
            ContainerState::Running
        } else if status.contains("exited") {
            ContainerState::Exited
        } else {
            ContainerState::Unknown
        }
    }
}

/// Start, stop and inspect containers with the docker CLI.
#[derive(Debug, Clone)]
pub struct ContainerControl<R> {
    docker: Docker<R>,
    poller: Poller,
}

impl<R: CommandRunner> ContainerControl<R> {
    pub fn new(docker: Docker<R>, poller: Poller) -> Self {
        Self { docker, poller }
    }

    /// Raw status text, quotes and newline included.
    pub async fn status(&self, name: &str) -> Result<String> {
        self.docker.docker(&["inspect", name, STATUS_FORMAT]).await
    }

    pub async fn state(&self, name: &str) -> Result<ContainerState> {
        Ok(ContainerState::from_status(&self.status(name).await?))
    }

    pub async fn started_at(&self, name: &str) -> Result<TimestampPair> {
        let raw = self.docker.docker(&["inspect", name, STARTED_AT_FORMAT]).await?;
        decode_iso8601_instant(&raw)
    }

    pub async fn start(&self, name: &str, timeout: u64) -> Result<PollOutcome> {
        info!("starting container {}", name);
        self.docker.docker(&["start", name]).await?;
        self.wait_until(name, "running", timeout).await
    }

    pub async fn stop(&self, name: &str, timeout: u64) -> Result<PollOutcome> {
        info!("stopping container {}", name);
        self.docker.docker(&["stop", name]).await?;
        self.wait_until(name, "exited", timeout).await
    }

    pub async fn restart(&self, name: &str, timeout: u64) -> Result<PollOutcome> {
        info!("restarting container {}", name);
        self.docker.docker(&["restart", name]).await?;
        self.wait_until(name, "running", timeout).await
    }

    /// Polls until the status text contains `status`.
    pub async fn wait_until(&self, name: &str, status: &str, timeout: u64) -> Result<PollOutcome> {
        debug!("waiting up to {}s for {} to be {}", timeout, name, status);
        self.poller
            .poll_until(
                || async move { self.status(name).await.map(|s| s.contains(status)) },
                timeout,
            )
            .await
    }
}
