use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use docket_core::input::PipelineInput;
use docket_core::security::env_vars;
use docket_core::settings::{load_settings, DocketSettings};
use docket_engine::{demo_snapshot, PipelineOrchestrator};
use docket_server::{AppState, ServerConfig};
use docket_telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser)]
#[command(name = "docket", version, about = "Legal-marketing lead generation pipeline")]
struct Cli {
    /// JSON settings file, deep-merged over the defaults.
    #[arg(long, global = true, env = env_vars::DOCKET_CONFIG)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one pipeline and print the run record as JSON.
    Run {
        #[arg(long)]
        keyword: String,
        #[arg(long)]
        jurisdiction: String,
        #[arg(long)]
        practice_area: String,
        #[arg(long)]
        firm_id: Option<String>,
    },
    /// Print the deterministic demo run.
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(cli.config.as_deref()).context("failed to load settings")?;
    let telemetry = init_telemetry(TelemetryConfig::from_level_name(
        &settings.app.log_level,
        settings.app.log_json,
    ));
    for warning in settings.validate() {
        tracing::warn!(%warning, "configuration warning");
    }

    match cli.command {
        Command::Serve { port } => serve(settings, port, telemetry.metrics()).await,
        Command::Run {
            keyword,
            jurisdiction,
            practice_area,
            firm_id,
        } => {
            let mut input = PipelineInput::new(keyword, jurisdiction, practice_area);
            input.firm_id = firm_id;
            input.validate()?;

            let orchestrator = PipelineOrchestrator::from_settings(&settings, telemetry.metrics());
            let run = orchestrator.run(&input).await;
            println!("{}", serde_json::to_string_pretty(&run)?);
            if let Some(failure) = &run.error {
                anyhow::bail!("pipeline failed: {}", failure.message);
            }
            Ok(())
        }
        Command::Demo => {
            println!("{}", serde_json::to_string_pretty(&demo_snapshot())?);
            Ok(())
        }
    }
}

async fn serve(
    settings: DocketSettings,
    port: Option<u16>,
    metrics: Arc<docket_telemetry::MetricsRecorder>,
) -> anyhow::Result<()> {
    let mut config = ServerConfig::from_settings(&settings.server);
    if let Some(port) = port {
        config.port = port;
    }

    let state = AppState::from_settings(&settings, metrics);
    let handle = docket_server::start(config, state)
        .await
        .context("failed to start server")?;

    handle
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl+c");
            }
        })
        .await;
    Ok(())
}
