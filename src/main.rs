use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldsync::config::Config;
use fieldsync::db::{init_db, SqliteStore};

mod commands;

use commands::{ConfigCommand, RecordCommand, SyncCommand, WatchCommand};

#[derive(Parser)]
#[command(name = "fieldsync")]
#[command(version)]
#[command(about = "Offline field audit records with server sync", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and list local records
    Record(RecordCommand),

    /// Push pending records to the server
    Sync(SyncCommand),

    /// Sync automatically whenever the server is reachable
    Watch(WatchCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so command output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldsync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Save config path for init command
    let cli_config_path = cli.config.clone();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Record(cmd)) => {
            let pool = init_db(&config.database_path.value).await?;
            let store = SqliteStore::new(pool);
            cmd.run(store.records()).await?;
        }
        Some(Commands::Sync(cmd)) => {
            let pool = init_db(&config.database_path.value).await?;
            cmd.run(Arc::new(SqliteStore::new(pool)), &config).await?;
        }
        Some(Commands::Watch(cmd)) => {
            let pool = init_db(&config.database_path.value).await?;
            cmd.run(Arc::new(SqliteStore::new(pool)), &config).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config, cli_config_path)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
