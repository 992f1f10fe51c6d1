//! Observation of systemd units running inside the container.
//!
//! Unit properties are read with `busctl get-property` through
//! `docker exec`, and disruptions go through `systemctl`. Units are addressed
//! by their human-readable name; the D-Bus object path escaping happens here
//! and nowhere else.

use crate::error::Result;
use crate::executor::{CommandRunner, Docker};
use crate::timestamp::{decode_epoch_micros_property, TimestampPair};
use std::fmt;
use tracing::debug;

const BUS_SERVICE: &str = "org.freedesktop.systemd1";
const UNIT_PATH_PREFIX: &str = "/org/freedesktop/systemd1/unit/";
const UNIT_INTERFACE: &str = "org.freedesktop.systemd1.Unit";

/// A systemd unit inside a named container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedService {
    pub container: String,
    pub unit: String,
}

impl ManagedService {
    pub fn new(container: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            unit: unit.into(),
        }
    }

    /// D-Bus object path of the unit.
    pub fn object_path(&self) -> String {
        format!("{}{}", UNIT_PATH_PREFIX, escape_unit_name(&self.unit))
    }
}

impl fmt::Display for ManagedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.unit, self.container)
    }
}

/// The part of systemd's `ActiveState` this harness cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveState {
    Active,
    Inactive,
    /// failed, activating, deactivating, reloading, or unparseable output
    Unknown,
}

impl ActiveState {
    /// Maps a busctl reply such as `s "active"` to a state.
    pub fn from_property(reply: &str) -> Self {
        let value = reply
            .split_whitespace()
            .nth(1)
            .map(|token| token.trim_matches('"'));
        match value {
            Some("active") => ActiveState::Active,
            Some("inactive") => ActiveState::Inactive,
            _ => ActiveState::Unknown,
        }
    }
}

/// Escapes a unit name into a D-Bus object path label.
///
/// Bytes outside `[A-Za-z0-9]` become `_xx`. A leading digit is escaped as
/// well and the empty name becomes `_`.
pub fn escape_unit_name(unit: &str) -> String {
    if unit.is_empty() {
        return "_".to_string();
    }

    let mut escaped = String::with_capacity(unit.len() * 3);
    for (i, byte) in unit.bytes().enumerate() {
        let keep = byte.is_ascii_alphabetic() || (i > 0 && byte.is_ascii_digit());
        if keep {
            escaped.push(char::from(byte));
        } else {
            escaped.push_str(&format!("_{:02x}", byte));
        }
    }
    escaped
}

/// Queries unit state over busctl and drives units with systemctl.
#[derive(Debug, Clone)]
pub struct SystemdProber<R> {
    docker: Docker<R>,
}

impl<R: CommandRunner> SystemdProber<R> {
    pub fn new(docker: Docker<R>) -> Self {
        Self { docker }
    }

    /// Raw `busctl get-property` reply for one `org.freedesktop.systemd1.Unit`
    /// property.
    pub async fn get_property(&self, service: &ManagedService, property: &str) -> Result<String> {
        let path = service.object_path();
        self.docker
            .exec(
                &service.container,
                &["busctl", "get-property", BUS_SERVICE, path.as_str(), UNIT_INTERFACE, property],
            )
            .await
    }

    pub async fn get_active_state(&self, service: &ManagedService) -> Result<ActiveState> {
        let reply = self.get_property(service, "ActiveState").await?;
        let state = ActiveState::from_property(&reply);
        debug!("{} is {:?} ({})", service.unit, state, reply.trim());
        Ok(state)
    }

    pub async fn get_active_enter_timestamp(&self, service: &ManagedService) -> Result<TimestampPair> {
        let reply = self.get_property(service, "ActiveEnterTimestamp").await?;
        decode_epoch_micros_property(&reply)
    }

    pub async fn is_running(&self, service: &ManagedService) -> Result<bool> {
        Ok(self.get_active_state(service).await? == ActiveState::Active)
    }

    /// `systemctl <command> <unit>` inside the container.
    pub async fn systemctl(&self, service: &ManagedService, command: &str) -> Result<()> {
        self.docker
            .exec(&service.container, &["systemctl", command, service.unit.as_str()])
            .await?;
        Ok(())
    }
}
