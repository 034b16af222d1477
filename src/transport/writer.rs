//! A transport that writes one line per notification to any `Write` sink.
//!
//! Mostly useful for debugging and for running without external services.

use crate::identifier::IdentitySet;
use crate::notification::Notification;
use crate::transport::Transport;
use crate::types::TransportKey;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct WriterTransport {
    key: TransportKey,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl WriterTransport {
    pub fn new(key: impl Into<TransportKey>, writer: impl Write + Send + 'static) -> Self {
        Self {
            key: key.into(),
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout(key: impl Into<TransportKey>) -> Self {
        Self::new(key, std::io::stdout())
    }

    pub fn stderr(key: impl Into<TransportKey>) -> Self {
        Self::new(key, std::io::stderr())
    }

    fn format_line(&self, notification: &dyn Notification) -> String {
        let nobody = IdentitySet::new();
        format!(
            "notification: type={}, from={}, to={}, message={}\n",
            notification.event_type(),
            notification.initiator().unwrap_or(&nobody),
            notification.recipient(),
            notification.render(&self.key),
        )
    }
}

#[async_trait]
impl Transport for WriterTransport {
    fn key(&self) -> &TransportKey {
        &self.key
    }

    async fn push(&self, _cancel: &CancellationToken, notification: &dyn Notification) -> Result<()> {
        let line = self.format_line(notification);
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("writer lock poisoned"))?;
        writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.flush())
            .with_context(|| format!("failed to write notification for transport {}", self.key))?;
        debug!(transport = %self.key, "Wrote notification");
        Ok(())
    }
}
