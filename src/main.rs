// ABOUTME: Entry point for the hopgate CLI application.
// ABOUTME: Parses arguments, loads configuration, and dispatches to subcommands.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use hopgate::broker::{Broker, ExecArgs};
use hopgate::config::{Config, ConfigSource};
use hopgate::error::{Error, Result};
use hopgate::gateway;
use hopgate::ssh::{ConnectorOptions, RusshConnector};
use rmcp::ServiceExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries tool responses, so logs go to stderr
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let source = match cli.config {
        Some(path) => ConfigSource::File(path),
        None => ConfigSource::Env,
    };
    let config = source.load()?;

    match cli.command {
        Commands::Serve => serve(config, source).await,
        Commands::Exec {
            host,
            user,
            command,
        } => {
            let broker = new_broker(config, source);
            let args = ExecArgs {
                host,
                user,
                command: command.join(" "),
            };
            let response = broker.exec(&args).await;
            broker.session().disconnect().await;

            if response.is_error {
                eprintln!("{}", response.text);
                std::process::exit(1);
            }
            println!("{}", response.text);
            Ok(())
        }
        Commands::Check { host, command } => {
            if let Some(host) = host {
                if !config.hosts.is_allowed(&host) {
                    return Err(gateway::Error::HostNotAllowed {
                        host,
                        allowed: config.hosts.describe(),
                    }
                    .into());
                }
            }
            config.commands.validate(&command.join(" "))?;
            println!("allowed");
            Ok(())
        }
        Commands::Config => {
            let broker = new_broker(config, source);
            println!("{}", broker.get_config().text);
            Ok(())
        }
    }
}

fn new_broker(config: Config, source: ConfigSource) -> Broker<RusshConnector> {
    let connector = RusshConnector::new(
        ConnectorOptions::default().trust_on_first_use(config.trust_first_connection),
    );
    Broker::new(connector, config, source)
}

async fn serve(config: Config, source: ConfigSource) -> Result<()> {
    tracing::info!("gateway: {}", config.gateway);
    tracing::info!("allowed hosts: {}", config.hosts.describe());
    if !config.server_info.is_empty() {
        tracing::info!("server info loaded");
    }

    let broker = new_broker(config, source);
    let session = broker.session().clone();

    let service = broker
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| Error::Mcp(e.to_string()))?;

    let result = tokio::select! {
        quit = service.waiting() => match quit {
            Ok(reason) => {
                tracing::debug!("MCP session ended: {:?}", reason);
                Ok(())
            }
            Err(e) => Err(Error::Mcp(e.to_string())),
        },
        _ = wait_for_shutdown_signal() => Ok(()),
    };

    session.disconnect().await;
    result
}

/// Wait for Ctrl+C or SIGTERM.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
