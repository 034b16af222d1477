//! Courier - notification router
//!
//! Loads users and transports from configuration and either validates the
//! transports or sends a single notification.

use anyhow::{bail, Result};
use clap::Parser;
use courier::{
    cli::{Cli, Command},
    config::Config,
    services::build_dispatcher,
    NotificationBuilder,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        // Initialize a default subscriber just to report this error.
        tracing_subscriber::fmt().init();
        error!("Failed to load configuration: {}", err);
        std::process::exit(1);
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Courier starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Fan-out: {:?}", config.fan_out);
    info!("Users: {}", config.users.len());
    info!(
        "Writer Transport: {}",
        if config.transports.writer.is_some() { "Enabled" } else { "Disabled" }
    );
    info!(
        "Slack Transport: {}",
        if config.transports.slack.is_some() { "Enabled" } else { "Disabled" }
    );
    info!("-------------------------------------------------------");

    let dispatcher = build_dispatcher(&config)?;

    // Ctrl-C cancels whatever is still in flight.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl-C, cancelling dispatch.");
                cancel.cancel();
            }
        });
    }

    if config.validate_on_startup {
        if let Err(err) = dispatcher.validate_transports(&cancel).await {
            error!("Transport validation failed:\n{}", err);
            bail!("{} transport(s) failed validation", err.len());
        }
        info!("All transports validated.");
    }

    match cli.command {
        Some(Command::Send {
            event,
            to,
            from,
            message,
        }) => {
            let mut builder = NotificationBuilder::new(event).with_recipient(to);
            if !from.is_empty() {
                builder = builder.with_initiator(from);
            }
            if let Some(message) = message {
                builder = builder.with_default_message(message);
            }
            let notification = builder.build();

            if let Err(err) = dispatcher.push(&cancel, &notification).await {
                error!("{}", err);
                return Err(err.into());
            }
            info!("Notification dispatched.");
        }
        Some(Command::Validate) => {}
        None => bail!("no command given; run with --help for usage"),
    }

    Ok(())
}
