use crate::error::Result;
use crate::executor::{CommandRunner, Docker};
use crate::systemd::ManagedService;
use crate::timestamp::TimestampPair;

/// Output of a `journalctl -p err` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTail {
    raw: String,
}

impl LogTail {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Log lines, without blank lines and `-- ... --` banners.
    pub fn entries(&self) -> Vec<&str> {
        self.raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("--"))
            .collect()
    }

    /// True when only banners remain. journalctl answers an empty query with
    /// `-- No entries --`, or on some versions with just `-- Logs begin at`.
    pub fn has_no_entries(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Reads error-level journal entries of a unit inside its container.
#[derive(Debug, Clone)]
pub struct Journal<R> {
    docker: Docker<R>,
}

impl<R: CommandRunner> Journal<R> {
    pub fn new(docker: Docker<R>) -> Self {
        Self { docker }
    }

    /// Entries of priority `err` or worse logged during the current boot at or
    /// after `floor`.
    pub async fn errors_since(&self, service: &ManagedService, floor: &TimestampPair) -> Result<LogTail> {
        let raw = self
            .docker
            .exec(
                &service.container,
                &[
                    "journalctl",
                    "-u",
                    service.unit.as_str(),
                    "--since",
                    floor.display.as_str(),
                    "-p",
                    "err",
                    "-b",
                ],
            )
            .await?;
        Ok(LogTail::new(raw))
    }
}
