//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments and dispatches into the gateway
//! server or the catalog inspection commands.

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::GatewayConfig;
use crate::server::{AppState, GatewayServer};

#[derive(Parser)]
#[command(name = "dramatis")]
#[command(about = "A character role-play chat gateway streaming LLM responses over SSE")]
#[command(
    long_about = "Dramatis serves the HTTP API for a character role-play chat product: model,\n\
character, and scenario catalogs backed by JSON files, and a chat endpoint that\n\
relays upstream LLM token streams as Server-Sent Events.\n\n\
Environment Variables:\n\
  OPENROUTER_API_KEY    API key for the OpenRouter provider\n\
  OPENROUTER_BASE_URL   Custom OpenRouter base URL (optional)\n\
  GOOGLE_PROJECT_ID     Project id for the Vertex AI provider\n\
  VERTEX_LOCATION       Vertex AI region\n\
  VERTEX_ENDPOINT_ID    Vertex AI endpoint id\n\
  VERTEX_ACCESS_TOKEN   OAuth access token for Vertex AI\n\
  DRAMATIS_DATA_DIR     Override the catalog directory"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to a config.toml (defaults to the platform config directory)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP gateway (default)
    Serve {
        /// Socket address to bind, overriding the config file
        #[arg(short = 'b', long)]
        bind: Option<String>,
    },
    /// Print the model catalog
    Models,
    /// Print the character catalog
    Characters,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn load_config(args: &Args) -> Result<GatewayConfig, Box<dyn Error>> {
    match &args.config {
        Some(path) => GatewayConfig::load_from_path(path),
        None => GatewayConfig::load(),
    }
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    init_tracing();
    let config = load_config(&args)?;
    let command = args.command.unwrap_or(Commands::Serve { bind: None });

    match command {
        Commands::Models => {
            let store = crate::catalog::models::ModelStore::new(&config.data_dir());
            for model in store.load()? {
                let marker = if model.is_active { "*" } else { " " };
                println!(
                    "{marker} {}  [{}]  {}",
                    model.config_id, model.model_id, model.name
                );
            }
            Ok(())
        }
        Commands::Characters => {
            let store = crate::catalog::characters::CharacterStore::new(&config.data_dir());
            for character in store.list()? {
                println!(
                    "{}  {}  {}",
                    character.id, character.name, character.display_description
                );
            }
            Ok(())
        }
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.bind());
            serve(&bind, &config).await
        }
    }
}

async fn serve(bind: &str, config: &GatewayConfig) -> Result<(), Box<dyn Error>> {
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!(
        provider = %config.provider(),
        data_dir = %data_dir.display(),
        "starting gateway"
    );

    let state = AppState::new(config.provider(), &data_dir);
    let mut server = GatewayServer::start(bind, state).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    server.stop();
    Ok(())
}
