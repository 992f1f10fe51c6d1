use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::timestamp::TimestampPair;

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Everything that can go wrong while probing or disrupting the deployment.
///
/// The variants split in two groups: harness faults (the command could not be
/// run, the output could not be read, the configuration is incomplete) and
/// assertion failures, which mean the deployment itself misbehaved.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("command `{command}` failed (status {status:?}): {stderr}")]
    ExecutionFailure {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("cannot parse '{input}': {reason}")]
    ParseFailure { input: String, reason: String },
    #[error("timed out after {elapsed:?}")]
    TimedOut { elapsed: Duration },
    #[error("property '{0}' not found")]
    ConfigurationMissing(String),
    #[error("property '{key}' must be {expected}")]
    ConfigurationType { key: String, expected: &'static str },
    #[error("config file {path:?} not found: {source}")]
    ConfigurationUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file is not valid JSON: {0}")]
    ConfigurationInvalid(#[from] serde_json::Error),
    #[error("{target} did not recover after {timeout} second(s)")]
    RecoveryTimedOut { target: String, timeout: u64 },
    #[error("{target} did not restart: timestamp did not increase ({before} -> {after})")]
    TimestampDidNotIncrease {
        target: String,
        before: TimestampPair,
        after: TimestampPair,
    },
    #[error("{unit} logged {} error(s): {}", entries.len(), entries.join(" | "))]
    ErrorLogsPresent { unit: String, entries: Vec<String> },
    #[error("{method} {path} returned {actual}, expected {expected}")]
    UnexpectedStatus {
        method: String,
        path: String,
        expected: u16,
        actual: u16,
    },
    #[error("assertion failed: {0}")]
    Assertion(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl HarnessError {
    pub(crate) fn parse(input: impl Into<String>, reason: impl ToString) -> Self {
        HarnessError::ParseFailure {
            input: input.into(),
            reason: reason.to_string(),
        }
    }

    /// True when the deployment violated an expectation, as opposed to the
    /// harness failing to observe it.
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            HarnessError::RecoveryTimedOut { .. }
                | HarnessError::TimestampDidNotIncrease { .. }
                | HarnessError::ErrorLogsPresent { .. }
                | HarnessError::UnexpectedStatus { .. }
                | HarnessError::Assertion(_)
        )
    }
}
