use anyhow::{Context, Result};
use clap::Parser;
use edgescout_agent::cli::Args;
use edgescout_agent::config::Config;
use edgescout_agent::container::DockerCli;
use edgescout_agent::detect::HostLayout;
use edgescout_agent::inventory::HttpInventoryClient;
use edgescout_agent::publisher::PeripheralPublisher;
use edgescout_agent::signals::shutdown_signal;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load configuration
    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    edgescout_common::logging::setup_logging(&config.log_level, args.tracing.into());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        api_base_url = %config.api_base_url,
        orchestrator = ?config.orchestrator,
        identifier = %config.identifier,
        "starting edgescout-agent"
    );

    match run(&args, &config).await {
        Ok(()) => {
            info!("stopped gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = ?e, "agent failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args, config: &Config) -> Result<()> {
    let layout = HostLayout::from_config(config);
    info!(machine = %layout.machine, "host layout resolved");

    let runtime = Arc::new(DockerCli::new(config.docker_bin.clone(), config.probe_timeout));
    let inventory =
        Arc::new(HttpInventoryClient::from_config(config).context("failed to create inventory client")?);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    tokio::select! {
        _ = inventory.wait_bootstrap(config.bootstrap_retry) => {}
        _ = &mut shutdown => {
            info!("shutdown before the inventory API became ready");
            return Ok(());
        }
    }

    let publisher = PeripheralPublisher::new(config, layout, runtime, inventory);

    if args.once {
        let outcome = publisher.run_cycle().await;
        info!(?outcome, "single cycle complete");
        return Ok(());
    }

    publisher.run(shutdown).await;
    Ok(())
}
