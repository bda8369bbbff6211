//! planbot CLI — the main entry point.
//!
//! Commands:
//! - `chat`      — Interactive chat or single-message mode
//! - `languages` — Show the configured translation languages
//! - `config`    — Show the effective configuration or write a default one

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "planbot",
    about = "planbot — a planning chat bot over pluggable capabilities",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the bot
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show supported translation languages
    Languages,

    /// Show the effective configuration (secrets redacted)
    Config {
        /// Write a default config file instead
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Chat { message } => commands::chat::run(message).await?,
        Commands::Languages => commands::languages::run()?,
        Commands::Config { init: true } => commands::config_cmd::init()?,
        Commands::Config { init: false } => commands::config_cmd::show()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_single_message_chat() {
        let cli = Cli::parse_from(["planbot", "-v", "chat", "--message", "Show languages"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Chat { message: Some(ref m) } if m == "Show languages"));
    }

    #[test]
    fn parses_config_init() {
        let cli = Cli::parse_from(["planbot", "config", "--init"]);
        assert!(matches!(cli.command, Commands::Config { init: true }));
    }
}
