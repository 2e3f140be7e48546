use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, bail};
use serde::Serialize;
use tracing::info;

use ward::landing::{LandingService, use_landing};
use ward::patients::{PatientsService, use_patient, use_patients};
use ward::query::QueryClient;
use ward::settings::{self, CliArgs, Command};
use ward::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let settings = settings::load(&args)?;
    telemetry::init(&settings.logging)?;
    info!(mode = ?settings.mode, "starting");

    let transport = settings.transport();
    let client = QueryClient::new();

    let error = match &args.command {
        Command::Dashboard => {
            let mut hook = use_landing(&client, Arc::new(LandingService::new(transport)));
            let view = hook.settled().await;
            print_json(&view)?;
            view.error
        }
        Command::Patients { search } => {
            let mut hook = use_patients(&client, Arc::new(PatientsService::new(transport)));
            let view = hook.settled(search).await;
            print_json(&view)?;
            if let Some(message) = view.empty_message() {
                info!("{message}");
            }
            view.error
        }
        Command::Patient { id } => {
            let mut hook = use_patient(&client, Arc::new(PatientsService::new(transport)), id);
            let view = hook.settled().await;
            print_json(&view)?;
            view.error
        }
    };

    if let Some(error) = error {
        bail!(error);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
