//! Nimbus CLI - database migrations and operator tasks.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations
//! nimbus-cli migrate
//!
//! # Run one refresh pass over every stored location
//! nimbus-cli refresh
//! ```
//!
//! Both commands read the same environment (and `.env`) as the server.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "nimbus-cli")]
#[command(author, version, about = "Nimbus CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Refresh stored weather for every favorite location once
    Refresh,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Refresh => commands::refresh::run().await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        assert!(matches!(
            Cli::try_parse_from(["nimbus-cli", "migrate"]).map(|c| c.command),
            Ok(Commands::Migrate)
        ));
        assert!(matches!(
            Cli::try_parse_from(["nimbus-cli", "refresh"]).map(|c| c.command),
            Ok(Commands::Refresh)
        ));
        assert!(Cli::try_parse_from(["nimbus-cli", "seed"]).is_err());
    }
}
