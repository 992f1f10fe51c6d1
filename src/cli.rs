use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Checks a running Grafana container end to end
#[derive(Parser, Debug)]
#[command(name = "grafana-check")]
#[command(about = "Checks a running Grafana container end to end")]
#[command(version)]
pub struct Cli {
    /// JSON file with container_name and the systemd, monit and docker timeouts
    #[arg(long)]
    pub config_file: PathBuf,

    /// JSON file with the Grafana host, port and default credentials
    #[arg(long)]
    pub grafana_config: Option<PathBuf>,

    /// Which scenarios to run
    #[arg(long, value_enum, default_value_t = Suite::All)]
    pub suite: Suite,

    /// Log at debug level
    #[arg(long)]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Suite {
    /// Restart and log scenarios driven through docker
    Container,
    /// Grafana HTTP API scenarios
    Api,
    All,
}

impl Suite {
    pub fn includes_container(self) -> bool {
        matches!(self, Suite::Container | Suite::All)
    }

    pub fn includes_api(self) -> bool {
        matches!(self, Suite::Api | Suite::All)
    }
}
