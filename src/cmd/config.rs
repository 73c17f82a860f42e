//! Configuration view and validation commands: `automata config`.

use anyhow::{Context, Result};
use automata::automata_config::{AutomataConfig, AutomataToml};

use super::super::ConfigCommands;

fn print_sections(toml: &AutomataToml) {
    println!("[pipeline]");
    println!("  page_count = {}", toml.pipeline.page_count);
    println!("  default_language = \"{}\"", toml.pipeline.default_language);
    println!("  asset_base_url = \"{}\"", toml.pipeline.asset_base_url);
    println!();

    let latency = &toml.latency;
    println!("[latency]");
    println!("  request_ms = {}", latency.request_ms);
    println!("  regeneration_ms = {}", latency.regeneration_ms);
    println!("  api_call_ms = {}", latency.api_call_ms);
    println!("  webhook_ms = {}", latency.webhook_ms);
    println!("  character_sheet_ms = {}", latency.character_sheet_ms);
    println!("  assembly_ms = {}", latency.assembly_ms);
    println!("  delivery_ms = {}", latency.delivery_ms);
    println!();

    let text = &toml.text_generation;
    println!("[text_generation]");
    println!("  provider = \"{}\"", text.provider);
    if let Some(endpoint) = &text.endpoint {
        println!("  endpoint = \"{}\"", endpoint);
    }
    println!("  timeout_secs = {}", text.timeout_secs);
    println!("  temperature = {}", text.temperature);
    println!();

    println!("[logging]");
    println!("  level = \"{}\"", toml.logging.level);
    println!("  json = {}", toml.logging.json);
    if let Some(dir) = &toml.logging.dir {
        println!("  dir = \"{}\"", dir.display());
    }
    println!();
}

pub fn cmd_config(config: &AutomataConfig, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config.config_file();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Automata Configuration");
            println!("======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No automata.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();
            println!("Effective values (with env/CLI overrides):");
            println!();
            print_sections(&config.toml);

            if config.instant {
                println!("--instant: all simulated latency disabled");
            }
            println!("log level: {}", config.log_level());
            println!();

            if !config_path.exists() {
                println!("Run 'automata config init' to create an automata.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No automata.toml found. Using defaults (valid).");
            }

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("automata.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&config.automata_dir).with_context(|| {
                format!("Failed to create {}", config.automata_dir.display())
            })?;
            AutomataToml::default().save(&config_path)?;

            println!("Created automata.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [pipeline] page_count, default_language, asset_base_url");
            println!("  - [latency] simulated service delays in milliseconds");
            println!("  - [text_generation] provider (template|http), endpoint");
            println!("  - [logging] level, json, dir");
            println!();
        }
    }

    Ok(())
}
