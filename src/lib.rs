//! Integration checks for a containerized Grafana deployment.
//!
//! The harness drives a running container through the `docker` CLI, probes
//! the units inside it over `busctl`, reads their journal, and exercises the
//! Grafana HTTP admin API. Restart verification is the core: take a
//! timestamp, disrupt the target, wait for it to recover, take the timestamp
//! again and require it to have moved forward.

pub mod config;
pub mod container;
pub mod error;
pub mod executor;
pub mod grafana;
pub mod journal;
pub mod logging;
pub mod poll;
pub mod scenarios;
pub mod systemd;
pub mod timestamp;
pub mod verify;

pub use error::{HarnessError, Result};
