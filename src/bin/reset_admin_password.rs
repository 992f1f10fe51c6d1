//! Changes the Grafana admin password through `PUT /api/user/password`.

type Result<T> = color_eyre::eyre::Result<T>;

use clap::Parser;
use reqwest::StatusCode;
use std::process::ExitCode;
use tracing::{debug, error, info};

use grafana_check::grafana::GrafanaClient;
use grafana_check::logging::LogContext;
use grafana_check::HarnessError;

const ADMIN_USER: &str = "admin";

/// Reset the Grafana admin password
#[derive(Parser, Debug)]
#[command(name = "reset-admin-password")]
#[command(about = "Reset the Grafana admin password")]
#[command(version)]
struct ResetPasswordCli {
    /// Log at debug level
    #[arg(long)]
    debug: bool,

    /// Grafana host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Grafana port
    #[arg(long, default_value = "80")]
    port: u16,

    /// Current admin password
    #[arg(long)]
    password: String,

    /// New admin password
    #[arg(long)]
    newpassword: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = ResetPasswordCli::parse();
    let _logs = LogContext::new(cli.debug);

    let client = GrafanaClient::new(&cli.host, cli.port)?.with_credentials(ADMIN_USER, &cli.password);

    match client.change_password(&cli.password, &cli.newpassword).await {
        Ok((StatusCode::OK, _)) => {
            info!("Admin password updated on {}:{}", cli.host, cli.port);
            Ok(ExitCode::SUCCESS)
        }
        Ok((status, body)) => {
            error!("Password change rejected with status {}", status);
            info!("{}", body);
            Ok(ExitCode::FAILURE)
        }
        Err(HarnessError::Http(e)) if e.is_connect() => {
            error!("Failed to establish a new connection ({})", cli.host);
            debug!("{:?}", e);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
