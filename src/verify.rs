//! Restart verification.
//!
//! A restart only counts when the activation timestamp strictly increases: a
//! unit that was never really stopped can still read as `active`, but it
//! cannot fake a new `ActiveEnterTimestamp`. Every scenario goes through the
//! same phases:
//!
//! ```text
//! Baseline -> Disrupted -> AwaitingRecovery -> Recovered | Failed
//! ```

use crate::container::ContainerControl;
use crate::error::{HarnessError, Result};
use crate::executor::{CommandRunner, Docker};
use crate::journal::Journal;
use crate::poll::{PollOutcome, Poller};
use crate::systemd::{ManagedService, SystemdProber};
use crate::timestamp::TimestampPair;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Baseline,
    Disrupted,
    AwaitingRecovery,
    Recovered,
    Failed,
}

/// Service-manager level disruption, sent with `systemctl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceDisruption {
    Stop,
    Kill,
}

impl ServiceDisruption {
    pub fn systemctl_command(&self) -> &'static str {
        match self {
            ServiceDisruption::Stop => "stop",
            ServiceDisruption::Kill => "kill",
        }
    }
}

impl fmt::Display for ServiceDisruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.systemctl_command())
    }
}

/// Container level disruption, sent with the docker CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerDisruption {
    /// `docker stop`, wait for `exited`, then `docker start`.
    Stop,
    Restart,
}

impl fmt::Display for ContainerDisruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerDisruption::Stop => f.write_str("stop"),
            ContainerDisruption::Restart => f.write_str("restart"),
        }
    }
}

/// Evidence of a verified restart.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartReport {
    pub target: String,
    pub before: TimestampPair,
    pub after: TimestampPair,
    /// Poll ticks until the target was back.
    pub ticks: u64,
}

/// Drives a disruption and proves the target came back with a fresh start.
#[derive(Debug, Clone)]
pub struct RestartVerifier<R> {
    prober: SystemdProber<R>,
    containers: ContainerControl<R>,
    journal: Journal<R>,
    poller: Poller,
}

impl<R: CommandRunner + Clone> RestartVerifier<R> {
    pub fn new(docker: Docker<R>, poller: Poller) -> Self {
        Self {
            prober: SystemdProber::new(docker.clone()),
            containers: ContainerControl::new(docker.clone(), poller),
            journal: Journal::new(docker),
            poller,
        }
    }

    pub fn prober(&self) -> &SystemdProber<R> {
        &self.prober
    }

    pub fn containers(&self) -> &ContainerControl<R> {
        &self.containers
    }

    pub fn journal(&self) -> &Journal<R> {
        &self.journal
    }

    /// Stops or kills a unit and verifies its supervisor brings it back
    /// within `timeout` seconds with a newer activation timestamp, and that
    /// the unit logged no error since then.
    pub async fn verify_service_restart(
        &self,
        service: &ManagedService,
        disruption: ServiceDisruption,
        timeout: u64,
    ) -> Result<RestartReport> {
        let target = service.to_string();

        enter(&target, Phase::Baseline);
        let before = self.prober.get_active_enter_timestamp(service).await?;
        info!("Service {} running since {}. Let's {} it.", service.unit, before, disruption);

        enter(&target, Phase::Disrupted);
        self.prober.systemctl(service, disruption.systemctl_command()).await?;

        let ticks = self.await_service(service, timeout).await?;

        let after = self.prober.get_active_enter_timestamp(service).await?;
        let report = confirm_restart(target, before, after, ticks)?;
        info!("Service {} restarted at {}", service.unit, report.after);

        self.assert_no_errors_since(service, &report.after).await?;
        Ok(report)
    }

    /// Waits until `service` is active again. A timeout becomes
    /// [`HarnessError::RecoveryTimedOut`].
    pub async fn await_service(&self, service: &ManagedService, timeout: u64) -> Result<u64> {
        let target = service.to_string();
        enter(&target, Phase::AwaitingRecovery);

        let outcome = self
            .poller
            .poll_until(|| self.prober.is_running(service), timeout)
            .await?;
        recovered(target, outcome, timeout)
    }

    /// Stops or restarts a container and verifies it is running again with a
    /// newer start time.
    pub async fn verify_container_restart(
        &self,
        container: &str,
        disruption: ContainerDisruption,
        timeout: u64,
    ) -> Result<RestartReport> {
        let target = format!("container {container}");

        enter(&target, Phase::Baseline);
        let before = self.containers.started_at(container).await?;
        info!("Container {} running since {}. Let's {} it.", container, before, disruption);

        enter(&target, Phase::Disrupted);
        let outcome = match disruption {
            ContainerDisruption::Stop => {
                let stopped = self.containers.stop(container, timeout).await?;
                if let PollOutcome::TimedOut { .. } = stopped {
                    enter(&target, Phase::Failed);
                    return Err(HarnessError::RecoveryTimedOut {
                        target: format!("{target} (stop)"),
                        timeout,
                    });
                }
                enter(&target, Phase::AwaitingRecovery);
                self.containers.start(container, timeout).await?
            }
            ContainerDisruption::Restart => {
                enter(&target, Phase::AwaitingRecovery);
                self.containers.restart(container, timeout).await?
            }
        };
        let ticks = recovered(target.clone(), outcome, timeout)?;

        let after = self.containers.started_at(container).await?;
        let report = confirm_restart(target, before, after, ticks)?;
        info!("Container {} restarted at {}", container, report.after);
        Ok(report)
    }

    /// Fails with [`HarnessError::ErrorLogsPresent`] if the unit logged any
    /// error since `floor`.
    pub async fn assert_no_errors_since(&self, service: &ManagedService, floor: &TimestampPair) -> Result<()> {
        let tail = self.journal.errors_since(service, floor).await?;
        if tail.has_no_entries() {
            debug!("no errors for {} since {}", service.unit, floor);
            return Ok(());
        }

        let entries: Vec<String> = tail.entries().into_iter().map(str::to_string).collect();
        warn!("{} logged errors since {}", service.unit, floor);
        Err(HarnessError::ErrorLogsPresent {
            unit: service.unit.clone(),
            entries,
        })
    }
}

fn enter(target: &str, phase: Phase) {
    debug!("{}: {:?}", target, phase);
}

fn recovered(target: String, outcome: PollOutcome, timeout: u64) -> Result<u64> {
    match outcome {
        PollOutcome::Succeeded { ticks } => Ok(ticks),
        PollOutcome::TimedOut { elapsed } => {
            enter(&target, Phase::Failed);
            warn!("{} still down after {:?}", target, elapsed);
            Err(HarnessError::RecoveryTimedOut { target, timeout })
        }
    }
}

/// Final step of the protocol: `after` must be strictly later than `before`.
pub fn confirm_restart(
    target: String,
    before: TimestampPair,
    after: TimestampPair,
    ticks: u64,
) -> Result<RestartReport> {
    if !after.is_after(&before) {
        enter(&target, Phase::Failed);
        return Err(HarnessError::TimestampDidNotIncrease { target, before, after });
    }

    enter(&target, Phase::Recovered);
    Ok(RestartReport {
        target,
        before,
        after,
        ticks,
    })
}
