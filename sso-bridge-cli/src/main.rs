use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;

/// sso-bridge - OAuth2/OIDC single-sign-on bridge
#[derive(Parser)]
#[command(name = "sso-bridge")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Configuration file
        #[arg(short, long, env = "SSO_BRIDGE_CONFIG", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Load the configuration and report which providers are enabled
    CheckConfig {
        /// Configuration file
        #[arg(short, long, env = "SSO_BRIDGE_CONFIG", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { config } => commands::serve::execute(&config).await,
        Commands::CheckConfig { config } => commands::check_config::execute(&config),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);

            if let Some(source) = e.source() {
                eprintln!("\n{} {}", "Caused by:".yellow(), source);
            }

            std::process::exit(1);
        }
    }
}
