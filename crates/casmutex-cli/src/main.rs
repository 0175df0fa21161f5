use casmutex_cli::command::{run_contend, run_scenario};
use casmutex_cli::model::{Cli, Command, Configuration};
use casmutex_cli::startup::{cancel_on_shutdown, init_logging};
use casmutex_core::{CancelSignal, describe_metrics};
use clap::Parser;
use tracing::error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let configuration = Configuration::load(&cli)?;

    let _logging_guard = init_logging(&configuration.logging_config())?;
    describe_metrics();

    let coordinator_config = configuration.coordinator_config()?;

    let cancel = CancelSignal::new();
    cancel_on_shutdown(cancel.clone());

    match &cli.command {
        Command::Contend(args) => {
            let report = run_contend(&coordinator_config, args, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.overlaps > 0 {
                error!(overlaps = report.overlaps, "Mutual exclusion violated");
                anyhow::bail!("{} overlapping critical sections detected", report.overlaps);
            }
        }
        Command::Scenario(args) => {
            let report = run_scenario(&coordinator_config, args, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.passed {
                anyhow::bail!("scenario steps did not match expectations");
            }
        }
    }

    Ok(())
}
