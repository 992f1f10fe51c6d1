use crate::error::{HarnessError, Result};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// Capability to run an external control command and capture its stdout.
///
/// A non-zero exit, or a program that cannot be spawned at all, is an
/// [`HarnessError::ExecutionFailure`]. Implementations never retry.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<String>;
}

impl<T: CommandRunner> CommandRunner for Arc<T> {
    async fn run(&self, program: &str, args: &[String]) -> Result<String> {
        (**self).run(program, args).await
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<String> {
        let command = command_line(program, args);
        debug!("running: {}", command);

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| HarnessError::ExecutionFailure {
                command: command.clone(),
                status: None,
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(HarnessError::ExecutionFailure {
                command,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("output: {}", stdout.trim_end());
        Ok(stdout)
    }
}

fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The `docker` CLI, either against the daemon or inside a container.
#[derive(Debug, Clone)]
pub struct Docker<R> {
    runner: R,
}

impl<R: CommandRunner> Docker<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// `docker <args>`
    pub async fn docker(&self, args: &[&str]) -> Result<String> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.runner.run("docker", &args).await
    }

    /// `docker exec <container> <args>`
    pub async fn exec(&self, container: &str, args: &[&str]) -> Result<String> {
        let mut full = Vec::with_capacity(args.len() + 2);
        full.push("exec");
        full.push(container);
        full.extend_from_slice(args);
        self.docker(&full).await
    }
}
