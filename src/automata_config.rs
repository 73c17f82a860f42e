//! Configuration for the Automata control center.
//!
//! Settings are read from `.automata/automata.toml` and layered
//! file → environment → CLI, the same way for every command.
//!
//! # Configuration File Format
//!
//! ```toml
//! [pipeline]
//! page_count = 5
//! default_language = "English"
//! asset_base_url = "https://assets.automata.local"
//!
//! [latency]
//! request_ms = 500
//! regeneration_ms = 3000
//! api_call_ms = 2000
//! webhook_ms = 5000
//! character_sheet_ms = 7000
//! assembly_ms = 2500
//! delivery_ms = 1000
//!
//! [text_generation]
//! provider = "template"
//! endpoint = "http://localhost:3400/generateStoryPage"
//! timeout_secs = 60
//! temperature = 0.8
//!
//! [logging]
//! level = "info"
//! json = false
//! dir = ".automata/logs"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable selecting the text generation provider.
pub const ENV_TEXT_PROVIDER: &str = "AUTOMATA_TEXT_PROVIDER";
/// Environment variable with the text generation endpoint.
pub const ENV_TEXT_ENDPOINT: &str = "AUTOMATA_TEXT_ENDPOINT";
/// Environment variable with the log level.
pub const ENV_LOG_LEVEL: &str = "AUTOMATA_LOG_LEVEL";

/// Pipeline shape and generated asset locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Blank pages created when the character sheet is accepted
    #[serde(default = "default_page_count")]
    pub page_count: u32,
    /// Language used when an order does not name one
    #[serde(default = "default_language")]
    pub default_language: String,
    /// Base URL for simulated generated assets
    #[serde(default = "default_asset_base_url")]
    pub asset_base_url: String,
}

fn default_page_count() -> u32 {
    5
}

fn default_language() -> String {
    "English".to_string()
}

fn default_asset_base_url() -> String {
    "https://assets.automata.local".to_string()
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            page_count: default_page_count(),
            default_language: default_language(),
            asset_base_url: default_asset_base_url(),
        }
    }
}

/// Simulated latency of each external collaborator, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyConfig {
    #[serde(default = "default_request_ms")]
    pub request_ms: u64,
    #[serde(default = "default_regeneration_ms")]
    pub regeneration_ms: u64,
    #[serde(default = "default_api_call_ms")]
    pub api_call_ms: u64,
    #[serde(default = "default_webhook_ms")]
    pub webhook_ms: u64,
    #[serde(default = "default_character_sheet_ms")]
    pub character_sheet_ms: u64,
    #[serde(default = "default_assembly_ms")]
    pub assembly_ms: u64,
    #[serde(default = "default_delivery_ms")]
    pub delivery_ms: u64,
}

fn default_request_ms() -> u64 {
    500
}

fn default_regeneration_ms() -> u64 {
    3000
}

fn default_api_call_ms() -> u64 {
    2000
}

fn default_webhook_ms() -> u64 {
    5000
}

fn default_character_sheet_ms() -> u64 {
    7000
}

fn default_assembly_ms() -> u64 {
    2500
}

fn default_delivery_ms() -> u64 {
    1000
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            request_ms: default_request_ms(),
            regeneration_ms: default_regeneration_ms(),
            api_call_ms: default_api_call_ms(),
            webhook_ms: default_webhook_ms(),
            character_sheet_ms: default_character_sheet_ms(),
            assembly_ms: default_assembly_ms(),
            delivery_ms: default_delivery_ms(),
        }
    }
}

impl LatencyConfig {
    /// No simulated latency at all. Used by tests and `--instant`.
    pub fn instant() -> Self {
        Self {
            request_ms: 0,
            regeneration_ms: 0,
            api_call_ms: 0,
            webhook_ms: 0,
            character_sheet_ms: 0,
            assembly_ms: 0,
            delivery_ms: 0,
        }
    }

    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn regeneration(&self) -> Duration {
        Duration::from_millis(self.regeneration_ms)
    }

    pub fn api_call(&self) -> Duration {
        Duration::from_millis(self.api_call_ms)
    }

    pub fn webhook(&self) -> Duration {
        Duration::from_millis(self.webhook_ms)
    }

    pub fn character_sheet(&self) -> Duration {
        Duration::from_millis(self.character_sheet_ms)
    }

    pub fn assembly(&self) -> Duration {
        Duration::from_millis(self.assembly_ms)
    }

    pub fn delivery(&self) -> Duration {
        Duration::from_millis(self.delivery_ms)
    }
}

/// Which story text generator backs page regeneration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextProvider {
    /// Offline generator that writes pages from the order details
    #[default]
    Template,
    /// Remote text-generation service reached over HTTP
    Http,
}

impl std::fmt::Display for TextProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextProvider::Template => write!(f, "template"),
            TextProvider::Http => write!(f, "http"),
        }
    }
}

impl std::str::FromStr for TextProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "template" => Ok(TextProvider::Template),
            "http" => Ok(TextProvider::Http),
            _ => anyhow::bail!(
                "Invalid text provider '{}'. Valid values: template, http",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextGenerationSection {
    #[serde(default)]
    pub provider: TextProvider,
    /// Endpoint of the text-generation service (required for `http`)
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.8
}

impl Default for TextGenerationSection {
    fn default() -> Self {
        Self {
            provider: TextProvider::default(),
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Directory for daily-rotated log files; console only when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

/// The complete automata.toml configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AutomataToml {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub latency: LatencyConfig,
    #[serde(default)]
    pub text_generation: TextGenerationSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl AutomataToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse automata.toml")
    }

    /// Load `automata.toml` from the given directory, or defaults if it doesn't exist.
    pub fn load_or_default(automata_dir: &Path) -> Result<Self> {
        let config_path = automata_dir.join("automata.toml");
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize automata.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// Invalid values are reported as warnings and leave the file setting in place.
    pub fn apply_env<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();

        if let Some(provider) = lookup(ENV_TEXT_PROVIDER) {
            match provider.parse::<TextProvider>() {
                Ok(p) => self.text_generation.provider = p,
                Err(e) => warnings.push(format!("{}: {}", ENV_TEXT_PROVIDER, e)),
            }
        }
        if let Some(endpoint) = lookup(ENV_TEXT_ENDPOINT).filter(|e| !e.trim().is_empty()) {
            self.text_generation.endpoint = Some(endpoint);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|l| !l.trim().is_empty()) {
            self.logging.level = level;
        }

        warnings
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.pipeline.page_count == 0 {
            warnings.push(
                "pipeline.page_count is 0: orders cannot be processed until it is at least 1"
                    .to_string(),
            );
        } else if self.pipeline.page_count > 40 {
            warnings.push(format!(
                "pipeline.page_count {} is unusually large for a storybook",
                self.pipeline.page_count
            ));
        }

        if self.pipeline.asset_base_url.trim().is_empty() {
            warnings.push("pipeline.asset_base_url is empty".to_string());
        }

        if self.text_generation.provider == TextProvider::Http
            && self
                .text_generation
                .endpoint
                .as_deref()
                .is_none_or(|e| e.trim().is_empty())
        {
            warnings.push(
                "text_generation.provider is 'http' but no endpoint is configured".to_string(),
            );
        }

        if !(0.0..=2.0).contains(&self.text_generation.temperature) {
            warnings.push(format!(
                "text_generation.temperature {} is outside 0.0..=2.0",
                self.text_generation.temperature
            ));
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            warnings.push(format!("Invalid logging.level '{}'", self.logging.level));
        }

        warnings
    }
}

/// Resolved configuration combining automata.toml with runtime overrides.
///
/// Settings are merged from:
/// 1. automata.toml file
/// 2. Environment variables
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct AutomataConfig {
    pub project_dir: PathBuf,
    pub automata_dir: PathBuf,
    pub toml: AutomataToml,
    /// Warnings collected while applying environment overrides
    pub env_warnings: Vec<String>,
    /// CLI override: debug logging
    pub verbose: bool,
    /// CLI override: skip all simulated latency
    pub instant: bool,
}

impl AutomataConfig {
    /// Load configuration for a project directory, applying process environment overrides.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let automata_dir = project_dir.join(".automata");
        let mut toml = AutomataToml::load_or_default(&automata_dir)?;
        let env_warnings = toml.apply_env(|key| std::env::var(key).ok());

        Ok(Self {
            project_dir,
            automata_dir,
            toml,
            env_warnings,
            verbose: false,
            instant: false,
        })
    }

    /// Create AutomataConfig with CLI overrides.
    pub fn with_cli_args(project_dir: PathBuf, verbose: bool, instant: bool) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        config.instant = instant;
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.automata_dir.join("automata.toml")
    }

    /// Latency (CLI `--instant` → file → default).
    pub fn latency(&self) -> LatencyConfig {
        if self.instant {
            LatencyConfig::instant()
        } else {
            self.toml.latency
        }
    }

    /// Log level (CLI `--verbose` → env → file → default).
    pub fn log_level(&self) -> String {
        if self.verbose {
            "debug".to_string()
        } else {
            self.toml.logging.level.clone()
        }
    }

    /// Log directory, resolved against the project directory.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.toml.logging.dir.as_ref().map(|dir| {
            if dir.is_absolute() {
                dir.clone()
            } else {
                self.project_dir.join(dir)
            }
        })
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.env_warnings.clone();
        warnings.extend(self.toml.validate());
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let toml = AutomataToml::default();
        assert_eq!(toml.pipeline.page_count, 5);
        assert_eq!(toml.pipeline.default_language, "English");
        assert_eq!(toml.latency.request_ms, 500);
        assert_eq!(toml.latency.character_sheet_ms, 7000);
        assert_eq!(toml.latency.webhook_ms, 5000);
        assert_eq!(toml.text_generation.provider, TextProvider::Template);
        assert_eq!(toml.logging.level, "info");
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let toml = AutomataToml::parse(
            r#"
            [pipeline]
            page_count = 8

            [latency]
            webhook_ms = 10
            "#,
        )
        .unwrap();
        assert_eq!(toml.pipeline.page_count, 8);
        assert_eq!(toml.pipeline.default_language, "English");
        assert_eq!(toml.latency.webhook_ms, 10);
        assert_eq!(toml.latency.api_call_ms, 2000);
    }

    #[test]
    fn test_parse_rejects_unknown_provider() {
        let result = AutomataToml::parse(
            r#"
            [text_generation]
            provider = "carrier-pigeon"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut toml = AutomataToml::default();
        let warnings = toml.apply_env(env_from(&[
            (ENV_TEXT_PROVIDER, "http"),
            (ENV_TEXT_ENDPOINT, "http://localhost:3400/story"),
            (ENV_LOG_LEVEL, "debug"),
        ]));
        assert!(warnings.is_empty());
        assert_eq!(toml.text_generation.provider, TextProvider::Http);
        assert_eq!(
            toml.text_generation.endpoint.as_deref(),
            Some("http://localhost:3400/story")
        );
        assert_eq!(toml.logging.level, "debug");
    }

    #[test]
    fn test_invalid_env_provider_is_a_warning() {
        let mut toml = AutomataToml::default();
        let warnings = toml.apply_env(env_from(&[(ENV_TEXT_PROVIDER, "fax")]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Invalid text provider"));
        assert_eq!(toml.text_generation.provider, TextProvider::Template);
    }

    #[test]
    fn test_validate_flags_http_without_endpoint() {
        let mut toml = AutomataToml::default();
        toml.text_generation.provider = TextProvider::Http;
        let warnings = toml.validate();
        assert!(warnings.iter().any(|w| w.contains("no endpoint")));
    }

    #[test]
    fn test_validate_flags_zero_pages_and_bad_level() {
        let mut toml = AutomataToml::default();
        toml.pipeline.page_count = 0;
        toml.logging.level = "chatty".to_string();
        let warnings = toml.validate();
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(AutomataToml::default().validate().is_empty());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("automata.toml");
        let mut toml = AutomataToml::default();
        toml.pipeline.page_count = 12;
        toml.logging.json = true;
        toml.save(&path).unwrap();

        let loaded = AutomataToml::load(&path).unwrap();
        assert_eq!(loaded.pipeline.page_count, 12);
        assert!(loaded.logging.json);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let toml = AutomataToml::load_or_default(dir.path()).unwrap();
        assert_eq!(toml.pipeline.page_count, 5);
    }

    #[test]
    fn test_cli_overrides_latency_and_level() {
        let dir = tempdir().unwrap();
        let config = AutomataConfig::with_cli_args(dir.path().to_path_buf(), true, true).unwrap();
        assert_eq!(config.latency(), LatencyConfig::instant());
        assert_eq!(config.log_level(), "debug");
        assert!(config.config_file().ends_with(".automata/automata.toml"));
    }

    #[test]
    fn test_relative_log_dir_resolves_against_project() {
        let dir = tempdir().unwrap();
        let mut config = AutomataConfig::new(dir.path().to_path_buf()).unwrap();
        config.toml.logging.dir = Some(PathBuf::from("logs"));
        let resolved = config.log_dir().unwrap();
        assert!(resolved.starts_with(&config.project_dir));
        assert!(resolved.ends_with("logs"));
    }

    #[test]
    fn test_latency_durations() {
        let latency = LatencyConfig::default();
        assert_eq!(latency.api_call(), Duration::from_millis(2000));
        assert_eq!(latency.assembly(), Duration::from_millis(2500));
        assert_eq!(LatencyConfig::instant().webhook(), Duration::ZERO);
    }
}
