//! Sidekick CLI: the main entry point.
//!
//! Commands:
//! - `chat`: Interactive chat or single-message mode
//! - `prompts`: List or show registered prompt templates
//! - `tools`: List the tool catalogue
//! - `config`: Show, locate, initialise or validate configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "sidekick",
    about = "Sidekick — an on-device conversational agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file to use instead of ~/.sidekick/config.toml
    #[arg(short, long, global = true, env = "SIDEKICK_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Index a text file into knowledge memory before chatting
        #[arg(short, long)]
        knowledge: Vec<PathBuf>,

        /// Restrict tools to these capabilities (comma-separated)
        #[arg(long, value_delimiter = ',')]
        allow: Vec<String>,

        /// Print the run report as JSON after each answer
        #[arg(long)]
        report: bool,
    },

    /// Inspect the prompt registry
    Prompts {
        #[command(subcommand)]
        action: PromptsAction,
    },

    /// List available tools
    Tools {
        /// Only tools carrying one of these capabilities (comma-separated)
        #[arg(long, value_delimiter = ',')]
        capability: Vec<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum PromptsAction {
    /// List every registered prompt
    List,
    /// Print one prompt template
    Show {
        id: String,
        /// Defaults to the highest registered version
        #[arg(long)]
        version: Option<u32>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file if none exists
    Init,
    /// Validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Chat {
            message,
            knowledge,
            allow,
            report,
        } => {
            let options = commands::chat::ChatOptions {
                message,
                knowledge,
                allow,
                report,
            };
            commands::chat::run(config_path, options).await?
        }
        Commands::Prompts { action } => match action {
            PromptsAction::List => commands::prompts::list(config_path)?,
            PromptsAction::Show { id, version } => commands::prompts::show(config_path, &id, version)?,
        },
        Commands::Tools { capability } => commands::tools::list(&capability)?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path)?,
            ConfigAction::Path => commands::config_cmd::path(config_path),
            ConfigAction::Init => commands::config_cmd::init(config_path)?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path)?,
        },
    }

    Ok(())
}
