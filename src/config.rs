//! Configuration management for Courier
//!
//! This module defines the main `Config` struct and its sub-structs. It uses
//! the `figment` crate to layer defaults, a `courier.toml` file, environment
//! variables and command-line arguments.

use crate::cli::Cli;
use crate::dispatcher::FanOut;
use crate::transport::slack::DEFAULT_API_URL;
use crate::user::User;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_FILE: &str = "courier.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Whether transports are pushed one after another or all at once.
    #[serde(default)]
    pub fan_out: FanOut,
    /// Run transport validation hooks before sending.
    #[serde(default)]
    pub validate_on_startup: bool,
    /// Configuration for the available transports.
    #[serde(default)]
    pub transports: TransportsConfig,
    /// Known recipients and their preferences.
    #[serde(default)]
    pub users: Vec<User>,
}

/// Configuration for the available transports. Absent sections are disabled.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TransportsConfig {
    pub writer: Option<WriterConfig>,
    pub slack: Option<SlackConfig>,
}

/// Where the writer transport sends its lines.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WriterTarget {
    #[default]
    Stdout,
    Stderr,
    File(PathBuf),
}

/// Configuration for the writer transport.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WriterConfig {
    /// Transport key used for preferences and message overrides.
    #[serde(default = "default_writer_key")]
    pub key: String,
    #[serde(default)]
    pub target: WriterTarget,
}

/// Configuration for the Slack transport.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SlackConfig {
    /// Transport key used for preferences and message overrides.
    #[serde(default = "default_slack_key")]
    pub key: String,
    /// The bot token (`xoxb-...`).
    pub token: String,
    /// Base URL of the Slack Web API.
    #[serde(default = "default_slack_api_url")]
    pub api_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_slack_timeout")]
    pub timeout_seconds: u64,
}

fn default_writer_key() -> String {
    "writer".to_string()
}

fn default_slack_key() -> String {
    "slack".to_string()
}

fn default_slack_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_slack_timeout() -> u64 {
    10
}

impl Config {
    /// Loads the configuration by layering defaults, the TOML file,
    /// `COURIER_`-prefixed environment variables and the CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // e.g. COURIER_TRANSPORTS__SLACK__TOKEN=xoxb-...
            .merge(Env::prefixed("COURIER_").split("__"))
            .merge(cli)
            .extract()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            fan_out: FanOut::Sequential,
            validate_on_startup: false,
            transports: TransportsConfig::default(),
            users: Vec::new(),
        }
    }
}
