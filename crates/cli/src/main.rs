//! Perfumeria CLI - session store migration and diagnostics.
//!
//! # Usage
//!
//! ```bash
//! # Create the session table
//! perfumeria-cli migrate
//!
//! # Validate environment configuration
//! perfumeria-cli check-config
//!
//! # Check that the remote API answers
//! perfumeria-cli ping-api
//!
//! # Warm product images and report failures
//! perfumeria-cli preload-images --limit 100
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "perfumeria-cli")]
#[command(author, version, about = "Perfumeria CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the `tower_sessions` table
    Migrate,
    /// Load and validate the storefront configuration
    CheckConfig,
    /// Fetch the maintenance flag from the remote API
    PingApi,
    /// Preload product images through the image cache
    PreloadImages {
        /// Maximum number of images to load
        #[arg(short, long, default_value_t = 200)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::sessions().await?,
        Commands::CheckConfig => commands::diagnose::check_config()?,
        Commands::PingApi => commands::diagnose::ping_api().await?,
        Commands::PreloadImages { limit } => commands::diagnose::preload_images(limit).await?,
    }
    Ok(())
}
