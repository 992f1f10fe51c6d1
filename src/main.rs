type Result<T> = color_eyre::eyre::Result<T>;

mod cli;

use clap::Parser;
use eyre::eyre;
use tracing::{debug, info};

use cli::{Cli, Suite};
use grafana_check::config::{ContainerSettings, GrafanaSettings};
use grafana_check::executor::{Docker, ProcessRunner};
use grafana_check::logging::LogContext;
use grafana_check::poll::Poller;
use grafana_check::scenarios::{ApiScenarios, ContainerScenarios, SuiteReport};
use grafana_check::verify::RestartVerifier;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let _logs = LogContext::new(cli.debug);

    info!("grafana-check starting");

    // Every document is validated before the container is touched
    let container = ContainerSettings::load(&cli.config_file)?;
    let grafana = match &cli.grafana_config {
        Some(path) => Some(GrafanaSettings::load(path)?),
        None if cli.suite.includes_api() && cli.suite != Suite::All => {
            return Err(eyre!("--grafana-config is required for the api suite"));
        }
        None => None,
    };
    debug!("container settings: {:?}", container);

    let mut report = SuiteReport::default();

    if cli.suite.includes_container() {
        let verifier = RestartVerifier::new(Docker::new(ProcessRunner), Poller::default());
        ContainerScenarios::new(&verifier, &container).run(&mut report).await;
    }

    match grafana {
        Some(settings) if cli.suite.includes_api() => {
            ApiScenarios::new(&settings)?.run(&mut report).await;
        }
        _ if cli.suite.includes_api() => info!("no --grafana-config given, skipping API scenarios"),
        _ => {}
    }

    print_summary(&report);

    if !report.all_passed() {
        return Err(eyre!("{} of {} scenario(s) failed", report.failed(), report.results.len()));
    }

    info!("grafana-check finished");
    Ok(())
}

fn print_summary(report: &SuiteReport) {
    for result in &report.results {
        match &result.outcome {
            Ok(()) => println!("PASS  {}", result.name),
            Err(e) if e.is_assertion() => println!("FAIL  {}: {}", result.name, e),
            Err(e) => println!("ERROR {}: {}", result.name, e),
        }
    }
    println!("{} passed, {} failed", report.passed(), report.failed());
}
