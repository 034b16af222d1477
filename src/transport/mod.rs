//! The contract every delivery channel implements.
//!
//! A transport owns a stable [`TransportKey`] and knows which identity it
//! needs out of the recipient's set. When that identity is missing, `push`
//! must fail with a [`permanent`](crate::error::permanent) error.

pub mod slack;
pub mod writer;

use crate::notification::Notification;
use crate::types::TransportKey;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use slack::SlackTransport;
pub use writer::WriterTransport;

/// A pluggable delivery channel.
///
/// Implementations must be safe to call concurrently; the dispatcher may
/// push to every transport at once.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stable identity used for preference lookups and message rendering.
    fn key(&self) -> &TransportKey;

    /// Delivers `notification` to its recipient.
    ///
    /// # Returns
    /// * `Ok(())` once the remote side accepted the message
    /// * `Err` wrapped with [`permanent`](crate::error::permanent) when retrying cannot help
    /// * any other `Err` for failures that may be transient
    async fn push(
        &self,
        cancel: &CancellationToken,
        notification: &dyn Notification,
    ) -> anyhow::Result<()>;

    /// Probes for the startup validation capability.
    fn as_validator(&self) -> Option<&dyn Validator> {
        None
    }
}

/// Optional capability: a health check run before any notification is pushed.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Checks the transport's configuration, e.g. by authenticating.
    async fn validate(&self, cancel: &CancellationToken) -> anyhow::Result<()>;
}
