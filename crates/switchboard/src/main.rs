// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Switchboard - real-time relay for chat, call and QR-login events.
//!
//! This is the binary entry point.

mod serve;
mod shutdown;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use switchboard_config::SwitchboardConfig;
use tracing::error;

/// Switchboard - real-time relay for chat, call and QR-login events.
#[derive(Parser, Debug)]
#[command(name = "switchboard", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the relay server.
    Serve {
        /// Read configuration from this file instead of the search path.
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
    /// Validate configuration and exit.
    CheckConfig {
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

fn load(path: Option<&Path>) -> Option<SwitchboardConfig> {
    match switchboard_config::load_and_validate(path) {
        Ok(config) => Some(config),
        Err(errors) => {
            switchboard_config::render_errors(&errors);
            None
        }
    }
}

/// Initializes the tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("switchboard={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckConfig { config } => match load(config.as_deref()) {
            Some(_) => {
                println!("config ok");
                ExitCode::SUCCESS
            }
            None => ExitCode::FAILURE,
        },
        Commands::Serve { config } => {
            let Some(config) = load(config.as_deref()) else {
                return ExitCode::FAILURE;
            };
            init_tracing(&config.logging.level);
            shutdown::install_panic_hook();

            match serve::run_serve(config).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(error = %e, "switchboard serve failed");
                    eprintln!("error: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
