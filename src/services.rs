//! Builds the transports, user store and dispatcher described by a [`Config`].

use crate::{
    config::{Config, SlackConfig, WriterConfig, WriterTarget},
    dispatcher::Dispatcher,
    transport::{SlackTransport, Transport, WriterTransport},
    user::InMemoryUserStore,
};
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Instantiates every configured transport, writer first, then Slack.
pub fn build_transports(config: &Config) -> Result<Vec<Arc<dyn Transport>>> {
    let mut transports: Vec<Arc<dyn Transport>> = Vec::new();

    if let Some(writer) = &config.transports.writer {
        transports.push(Arc::new(build_writer(writer)?));
    }

    if let Some(slack) = &config.transports.slack {
        match build_slack(slack)? {
            Some(transport) => transports.push(Arc::new(transport)),
            None => warn!(
                "Slack transport is configured, but no token was provided. Slack notifications will be disabled."
            ),
        }
    }

    if transports.is_empty() {
        warn!("No transports configured; notifications will not be delivered anywhere.");
    }

    Ok(transports)
}

fn build_writer(config: &WriterConfig) -> Result<WriterTransport> {
    let transport = match &config.target {
        WriterTarget::Stdout => WriterTransport::stdout(config.key.as_str()),
        WriterTarget::Stderr => WriterTransport::stderr(config.key.as_str()),
        WriterTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open writer output {}", path.display()))?;
            WriterTransport::new(config.key.as_str(), file)
        }
    };
    info!(transport = %config.key, target = ?config.target, "Writer transport enabled.");
    Ok(transport)
}

fn build_slack(config: &SlackConfig) -> Result<Option<SlackTransport>> {
    if config.token.is_empty() {
        return Ok(None);
    }
    let transport =
        SlackTransport::with_api_url(config.key.as_str(), config.token.clone(), config.api_url.clone())
            .with_timeout(Duration::from_secs(config.timeout_seconds))
            .context("failed to build Slack HTTP client")?;
    info!(transport = %config.key, "Slack transport enabled.");
    Ok(Some(transport))
}

/// Wires the configured users and transports into a [`Dispatcher`].
pub fn build_dispatcher(config: &Config) -> Result<Dispatcher> {
    let store = Arc::new(InMemoryUserStore::new(config.users.clone()));
    info!(users = store.len(), "User store loaded.");

    let transports = build_transports(config)?;
    Ok(Dispatcher::new(store, transports).with_fan_out(config.fan_out))
}
