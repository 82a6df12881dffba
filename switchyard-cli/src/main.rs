//! Switchyard CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use switchyard_config::{load_config, LoggingConfig};
use switchyard_router::RouteTable;
use switchyard_runtime::{ServerBuilder, SignalHandler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "Path-prefix reverse proxy", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "switchyard.yaml")]
        config: PathBuf,

        /// Log level (trace, debug, info, warn, error); overrides logging.level
        #[arg(short, long)]
        log_level: Option<String>,

        /// Listen address; overrides server.listen
        #[arg(long)]
        listen: Option<SocketAddr>,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "switchyard.yaml")]
        config: PathBuf,
    },

    /// Print the resolved route table
    Routes {
        /// Path to configuration file
        #[arg(short, long, default_value = "switchyard.yaml")]
        config: PathBuf,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config: path,
            log_level,
            listen,
        } => {
            let mut config = load_config(&path, true)
                .with_context(|| format!("failed to load {}", path.display()))?;

            if let Some(listen) = listen {
                config.server.listen = listen;
            }
            if let Some(level) = log_level {
                config.logging.level = level;
            }

            init_tracing(&config.logging)?;

            tracing::info!(
                config = %path.display(),
                listen = %config.server.listen,
                routes = config.routes.len(),
                "Starting Switchyard"
            );

            let server = ServerBuilder::new().config(config).build()?;

            let shutdown_signal = server.shutdown_signal();
            tokio::spawn(SignalHandler::new(shutdown_signal).run());

            server.run().await?;

            tracing::info!("Server stopped");
            Ok(())
        }

        Commands::Validate { config: path } => {
            tracing_subscriber::fmt().with_target(false).init();

            match load_config(&path, true) {
                Ok(config) => {
                    println!("Configuration is valid: {}", path.display());
                    println!("  Listen: {}", config.server.listen);
                    println!("  Routes: {}", config.routes.len());
                    println!(
                        "  Health checks: {}",
                        if config.health.enabled { "enabled" } else { "disabled" }
                    );
                    if let Some(root) = &config.server.static_root {
                        println!("  Static root: {}", root.display());
                    }
                    Ok(())
                }
                Err(e) => {
                    eprintln!("Configuration is invalid: {e}");
                    std::process::exit(1);
                }
            }
        }

        Commands::Routes { config: path } => {
            let config = load_config(&path, true)
                .with_context(|| format!("failed to load {}", path.display()))?;
            let table = RouteTable::load(&config.routes, config.server.request_timeout)?;

            println!("{:<24} {:<28} {:<16} FLAGS", "PREFIX", "UPSTREAM", "REWRITE");
            for route in table.routes() {
                let mut flags = Vec::new();
                if route.allow_upgrade {
                    flags.push("upgrade".to_string());
                }
                if route.preserve_host {
                    flags.push("preserve-host".to_string());
                }
                if let Some(timeout) = route.timeout {
                    flags.push(format!("timeout={}ms", timeout.as_millis()));
                }

                println!(
                    "{:<24} {:<28} {:<16} {}",
                    route.prefix,
                    route.target.to_string(),
                    route.rewrite_base,
                    flags.join(",")
                );
            }

            if table.catch_all().is_none() {
                println!("(no catch-all route: unmatched paths return 404)");
            }
            Ok(())
        }

        Commands::Version => {
            println!("Switchyard");
            println!("Version: {}", switchyard_runtime::VERSION);
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("invalid log level '{}'", logging.level))?,
    };

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_level(true),
            )
            .init();
    }

    Ok(())
}
