use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use automata::automata_config::AutomataConfig;
use automata::errors::OrderError;

mod cmd;

#[derive(Parser)]
#[command(name = "automata")]
#[command(version, about = "Storybook order pipeline control center")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip every simulated service delay
    #[arg(long, global = true)]
    pub instant: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the sample orders, newest first
    Orders,
    /// Print one sample order as JSON
    Show { id: String },
    /// Create an order and walk it through every stage
    Demo {
        /// Name of the child the story is about
        #[arg(long, default_value = "Mia")]
        customer: String,

        /// What the story should be about
        #[arg(long, default_value = "A brave journey to find the lost star of the north")]
        summary: String,

        /// Where the finished story is sent
        #[arg(long, default_value = "family@example.com")]
        email: String,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default automata.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let config = AutomataConfig::with_cli_args(project_dir, cli.verbose, cli.instant)?;
    let log_dir = config.log_dir();
    let _log_guard = automata::logging::init_logging(
        &config.log_level(),
        config.toml.logging.json,
        log_dir.as_deref(),
    )?;
    for warning in &config.env_warnings {
        tracing::warn!("{}", warning);
    }

    let result = match &cli.command {
        Commands::Orders => cmd::cmd_orders(&config).await,
        Commands::Show { id } => cmd::cmd_show(&config, id).await,
        Commands::Demo {
            customer,
            summary,
            email,
        } => cmd::cmd_demo(&config, customer, summary, email).await,
        Commands::Config { command } => cmd::cmd_config(&config, command.clone()),
    };

    if let Err(e) = &result
        && let Some(order_error) = e.downcast_ref::<OrderError>()
    {
        tracing::error!(kind = order_error.kind(), "{}", order_error);
    }
    result
}
