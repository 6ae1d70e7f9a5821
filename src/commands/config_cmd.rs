use clap::{Args, Subcommand, ValueEnum};
use serde_json::json;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use fieldsync::config::Config;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

const DEFAULT_CONFIG: &str = r#"# fieldsync configuration

# Path to SQLite database (default: platform data dir, fieldsync/fieldsync.db)
# database_path: fieldsync.db

sync:
  # API root of the audit backend
  # server_url: "http://localhost:8000/api"

  # Bearer token issued by the backend
  # access_token: "your-token"

  # Seconds before a remote call is abandoned
  request_timeout_secs: 10

  # Milliseconds to wait after reconnecting before syncing
  settle_delay_ms: 2000

  # Seconds between reachability checks in `fieldsync watch`
  probe_interval_secs: 15

  # Child records whose parent has no remote id yet:
  #   fallback - push with the local parent id
  #   skip     - keep pending until the parent is synced
  missing_parent: fallback
"#;

impl ConfigCommand {
    pub fn run(
        &self,
        config: &Config,
        cli_config_path: Option<PathBuf>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                let sync = config.sync.redacted();
                match format {
                    OutputFormat::Json => {
                        let shown = json!({
                            "database_path": config.database_path,
                            "config_file": config.config_file,
                            "sync": sync,
                        });
                        println!("{}", serde_json::to_string_pretty(&shown)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("database_path: {}", config.database_path.value.display());
                        println!("  source: {}", config.database_path.source);
                        println!();

                        println!("sync:");
                        println!(
                            "  server_url: {}",
                            sync.server_url.as_deref().unwrap_or("(not set)")
                        );
                        println!(
                            "  access_token: {}",
                            sync.access_token.as_deref().unwrap_or("(not set)")
                        );
                        println!("  request_timeout_secs: {}", sync.request_timeout_secs);
                        println!("  settle_delay_ms: {}", sync.settle_delay_ms);
                        println!("  probe_interval_secs: {}", sync.probe_interval_secs);
                        println!("  missing_parent: {}", sync.missing_parent);
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = cli_config_path.unwrap_or_else(Config::default_config_path);

                // Check if config already exists
                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'fieldsync config show' to view current configuration.");
                    return Ok(());
                }

                // Create parent directory
                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let mut file = fs::File::create(&config_path)?;
                file.write_all(DEFAULT_CONFIG.as_bytes())?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}
