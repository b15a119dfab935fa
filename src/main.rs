use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use prodyo::config::CONFIG_FILE;
use prodyo::logging;

mod cmd;

#[derive(Parser)]
#[command(name = "prodyo")]
#[command(version, about = "Project tracking backend with productivity indicators")]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve(ServeArgs),
    /// Create the database file and schema, then exit
    InitDb {
        /// Database path (overrides config)
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Database path
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Enable dev mode (CORS permissive for a local frontend)
    #[arg(long)]
    pub dev: bool,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default config file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve(args) => {
            let config = cmd::load_config(&cli.config)?;
            logging::init_tracing(&config.logging);
            cmd::cmd_serve(&config, args).await?;
        }
        Commands::InitDb { db_path } => {
            let config = cmd::load_config(&cli.config)?;
            logging::init_tracing(&config.logging);
            let db_path = db_path.clone().unwrap_or(config.database.path);
            cmd::cmd_init_db(&db_path)?;
        }
        Commands::Config { command } => cmd::cmd_config(&cli.config, command.clone())?,
    }

    Ok(())
}
