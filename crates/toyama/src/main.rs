mod cli;
mod commands;
mod error;

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use toyama_core::{GatewayConfig, GatewayHandler, ListenerConfig};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "toyama", &mut std::io::stdout());
            Ok(())
        }

        // Everything else talks to a gateway
        cmd => {
            let config = build_gateway_config(&cmd, &cli.global)?;
            let handler = GatewayHandler::new(config)?;

            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &handler, &cli.global).await
        }
    }
}

/// Build a `GatewayConfig` from CLI flags and environment.
///
/// Only `listen` may run without a gateway address; it then receives
/// updates passively and skips status polling.
fn build_gateway_config(cmd: &Command, global: &GlobalOpts) -> Result<GatewayConfig, CliError> {
    let address = global
        .gateway
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_owned);

    let mut config = GatewayConfig {
        address,
        command_timeout: Duration::from_secs(global.timeout),
        // One-shot commands have no use for background polling.
        liveness_interval: Duration::ZERO,
        ..GatewayConfig::default()
    };

    match cmd {
        Command::Listen(args) => {
            config.listener = ListenerConfig {
                bind_addr: args.bind,
                ..ListenerConfig::default()
            };
            if config.address.is_some() {
                config.liveness_interval = GatewayConfig::default().liveness_interval;
            }
        }
        _ if config.address.is_none() => return Err(CliError::NoGateway),
        _ => {}
    }

    Ok(config)
}
