//! Command-Line Interface (CLI) argument parsing.
//!
//! The arguments are parsed with `clap` and double as a `figment` provider,
//! so flags like `--log-level` override `courier.toml` and the environment.

use crate::identifier::Identity;
use clap::{Parser, Subcommand};
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Routes notifications to the transports each recipient opted into.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Logging level, e.g. `debug` or `courier=trace`.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Push to all eligible transports at once instead of one by one.
    #[arg(long)]
    pub concurrent: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Send a single notification.
    Send {
        /// Event type of the notification.
        #[arg(short, long)]
        event: String,
        /// Recipient identity as `key=value`, e.g. `email=a@b.com`. Repeatable.
        #[arg(long = "to", value_name = "KEY=VALUE", value_parser = parse_identity, required = true)]
        to: Vec<Identity>,
        /// Initiator identity as `key=value`. Repeatable.
        #[arg(long = "from", value_name = "KEY=VALUE", value_parser = parse_identity)]
        from: Vec<Identity>,
        /// Default message text.
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Run every transport's validation hook.
    Validate,
}

/// Parses `key=value` into an [`Identity`].
pub fn parse_identity(raw: &str) -> Result<Identity, String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    Identity::new(key, value).map_err(|e| e.to_string())
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        // Only an explicit flag overrides the file.
        if self.concurrent {
            dict.insert("fan_out".into(), Value::from("concurrent"));
        }

        if matches!(self.command, Some(Command::Validate)) {
            dict.insert("validate_on_startup".into(), Value::from(true));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
