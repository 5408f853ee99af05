//! Main entry point for the launcher binary
//!
//! Wires the real service implementations into the orchestrator and maps the
//! run outcome onto the process exit code.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;

use launcher::cli::{Args, Mode};
use launcher::services::{
    RealCapabilityProbe, RealHealthClient, RealProcessSupervisor, SqliteDatabaseCheck, TokioClock,
};
use launcher::{StartupOrchestrator, StatusReporter};
use shared::{logging, process_debug, ComponentId};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional .env next to the working directory
    dotenv::dotenv().ok();

    let args = Args::parse();
    let mode = args.mode();
    logging::init_tracing(Some(&args.log_level));

    let config = args.into_config().context("building configuration")?;
    config.validate().context("validating configuration")?;
    process_debug!(ComponentId::Launcher, "{:?} mode, project root {}", mode, config.project_root.display());

    // Initialize services
    let supervisor = RealProcessSupervisor::new().with_kill_timeout(config.kill_timeout);
    let database = SqliteDatabaseCheck::new(config.database.clone());

    let mut orchestrator = StartupOrchestrator::new(
        config,
        Arc::new(RealHealthClient::new()),
        Arc::new(TokioClock),
        Arc::new(supervisor),
        RealCapabilityProbe::new(),
        database,
    )
    .context("creating orchestrator")?;

    let summary = match mode {
        Mode::Start => {
            // Set up graceful shutdown
            let shutdown_sender = orchestrator.get_shutdown_sender();
            tokio::spawn(async move {
                match signal::ctrl_c().await {
                    Ok(()) => {
                        logging::log_shutdown(ComponentId::Launcher, "Received Ctrl+C signal");
                        let _ = shutdown_sender.send(()).await;
                    }
                    Err(err) => {
                        logging::log_error(ComponentId::Launcher, "Signal handling", &err);
                    }
                }
            });

            orchestrator.run().await
        }
        Mode::Check => orchestrator.verify().await,
    };

    println!("{}", StatusReporter::render_text(&summary.report));

    let code = summary.outcome.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
