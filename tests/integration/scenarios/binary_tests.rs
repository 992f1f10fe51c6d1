use crate::infrastructure::{BinaryHarness, FakeGrafana, GRAFANA_CHECK, RESET_ADMIN_PASSWORD};
use anyhow::Result;
use std::time::Duration;

const LIMIT: Duration = Duration::from_secs(30);

/// A config error must stop the run before any docker command is issued.
#[tokio::test]
async fn test_missing_key_aborts_before_scenarios() -> Result<()> {
    let harness = BinaryHarness::new()?;
    let config = harness.write_config(
        "container.json",
        r#"{"container_name": "grafana", "systemd_timeout": 10, "monit_timeout": 60}"#,
    )?;

    let run = harness
        .run(GRAFANA_CHECK, &["--config-file", config.to_str().unwrap()], LIMIT)
        .await?;

    assert_ne!(run.code(), Some(0));
    assert!(run.stderr().contains("docker_timeout"), "stderr: {}", run.stderr());
    assert!(!run.stdout().contains("PASS"));
    Ok(())
}

#[tokio::test]
async fn test_unreadable_config_file() -> Result<()> {
    let harness = BinaryHarness::new()?;
    let missing = harness.temp_path().join("absent.json");

    let run = harness
        .run(GRAFANA_CHECK, &["--config-file", missing.to_str().unwrap()], LIMIT)
        .await?;

    assert_ne!(run.code(), Some(0));
    assert!(run.stderr().contains("absent.json"), "stderr: {}", run.stderr());
    Ok(())
}

#[tokio::test]
async fn test_api_suite_needs_grafana_config() -> Result<()> {
    let harness = BinaryHarness::new()?;
    let config = harness.write_config(
        "container.json",
        r#"{"container_name": "grafana", "systemd_timeout": 10, "monit_timeout": 60, "docker_timeout": 30}"#,
    )?;

    let run = harness
        .run(
            GRAFANA_CHECK,
            &["--config-file", config.to_str().unwrap(), "--suite", "api"],
            LIMIT,
        )
        .await?;

    assert_ne!(run.code(), Some(0));
    assert!(run.stderr().contains("--grafana-config"), "stderr: {}", run.stderr());
    Ok(())
}

#[tokio::test]
async fn test_api_suite_against_fake_grafana() -> Result<()> {
    let grafana = FakeGrafana::start("admin", "admin").await?;
    let harness = BinaryHarness::new()?;
    let container = harness.write_config(
        "container.json",
        r#"{"container_name": "grafana", "systemd_timeout": 10, "monit_timeout": 60, "docker_timeout": 30}"#,
    )?;
    let http = harness.write_config(
        "grafana.json",
        &format!(
            r#"{{"host": "127.0.0.1", "port": {}, "default_user": "admin", "default_password": "admin"}}"#,
            grafana.port()
        ),
    )?;

    let run = harness
        .run(
            GRAFANA_CHECK,
            &[
                "--config-file",
                container.to_str().unwrap(),
                "--grafana-config",
                http.to_str().unwrap(),
                "--suite",
                "api",
            ],
            LIMIT,
        )
        .await?;

    assert_eq!(run.code(), Some(0), "output: {}", run.combined());
    assert!(run.stdout().contains("5 passed, 0 failed"));
    Ok(())
}

#[tokio::test]
async fn test_reset_password_connection_refused() -> Result<()> {
    let harness = BinaryHarness::new()?;

    let run = harness
        .run(
            RESET_ADMIN_PASSWORD,
            &["--port", "1", "--password", "admin", "--newpassword", "s3cret"],
            LIMIT,
        )
        .await?;

    assert_eq!(run.code(), Some(1));
    assert!(
        run.combined().contains("Failed to establish a new connection (127.0.0.1)"),
        "output: {}",
        run.combined()
    );
    assert!(!run.combined().contains("panicked"));
    Ok(())
}

#[tokio::test]
async fn test_reset_password_success() -> Result<()> {
    let grafana = FakeGrafana::start("admin", "admin").await?;
    let harness = BinaryHarness::new()?;
    let port = grafana.port().to_string();

    let run = harness
        .run(
            RESET_ADMIN_PASSWORD,
            &["--port", &port, "--password", "admin", "--newpassword", "s3cret"],
            LIMIT,
        )
        .await?;

    assert_eq!(run.code(), Some(0), "output: {}", run.combined());
    assert_eq!(grafana.password(), "s3cret");
    assert_eq!(grafana.request_lines(), vec!["PUT /api/user/password"]);
    Ok(())
}

#[tokio::test]
async fn test_reset_password_rejected() -> Result<()> {
    let grafana = FakeGrafana::start("admin", "admin").await?;
    let harness = BinaryHarness::new()?;
    let port = grafana.port().to_string();

    let run = harness
        .run(
            RESET_ADMIN_PASSWORD,
            &["--port", &port, "--password", "wrong", "--newpassword", "s3cret"],
            LIMIT,
        )
        .await?;

    assert_eq!(run.code(), Some(1));
    assert!(run.combined().contains("Unauthorized"), "output: {}", run.combined());
    assert_eq!(grafana.password(), "admin");
    Ok(())
}
