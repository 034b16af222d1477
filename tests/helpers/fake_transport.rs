#![allow(dead_code)]
use async_trait::async_trait;
use courier::{
    identifier::NamespacedKey, permanent, EventType, Notification, Transport, TransportKey,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("some transport error occurred ({0})")]
pub struct SomethingFailed(pub &'static str);

#[derive(Debug, Error)]
#[error("recipient has no {0} identity")]
pub struct MissingAddress(pub NamespacedKey);

/// A transport that records which events it was pushed.
pub struct FakeTransport {
    key: TransportKey,
    pub sent: Mutex<Vec<EventType>>,
    pub calls: AtomicUsize,
    returns: Option<SomethingFailed>,
}

impl FakeTransport {
    pub fn new(key: &str) -> Arc<Self> {
        Arc::new(Self {
            key: key.into(),
            sent: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            returns: None,
        })
    }

    /// A transport whose every push fails with `error`.
    pub fn failing(key: &str, error: SomethingFailed) -> Arc<Self> {
        Arc::new(Self {
            key: key.into(),
            sent: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            returns: Some(error),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<EventType> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn key(&self) -> &TransportKey {
        &self.key
    }

    async fn push(
        &self,
        _cancel: &CancellationToken,
        notification: &dyn Notification,
    ) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.returns {
            return Err(err.clone().into());
        }
        self.sent
            .lock()
            .unwrap()
            .push(notification.event_type().clone());
        Ok(())
    }
}

/// A transport that needs one specific identity, like an email transport
/// needs an `email` address.
pub struct AddressedTransport {
    key: TransportKey,
    address: NamespacedKey,
    pub delivered_to: Mutex<Vec<String>>,
}

impl AddressedTransport {
    pub fn new(key: &str, address: NamespacedKey) -> Arc<Self> {
        Arc::new(Self {
            key: key.into(),
            address,
            delivered_to: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Transport for AddressedTransport {
    fn key(&self) -> &TransportKey {
        &self.key
    }

    async fn push(
        &self,
        _cancel: &CancellationToken,
        notification: &dyn Notification,
    ) -> anyhow::Result<()> {
        let Some(address) = notification.recipient().get(&self.address) else {
            return Err(permanent(MissingAddress(self.address.clone())));
        };
        self.delivered_to.lock().unwrap().push(address.to_string());
        Ok(())
    }
}

#[derive(Debug, Error)]
#[error("push aborted: context cancelled")]
pub struct ContextCancelled;

/// A transport that blocks until the dispatch is cancelled.
pub struct BlockingTransport {
    key: TransportKey,
    pub started: Arc<Notify>,
}

impl BlockingTransport {
    pub fn new(key: &str) -> Arc<Self> {
        Arc::new(Self {
            key: key.into(),
            started: Arc::new(Notify::new()),
        })
    }
}

#[async_trait]
impl Transport for BlockingTransport {
    fn key(&self) -> &TransportKey {
        &self.key
    }

    async fn push(
        &self,
        cancel: &CancellationToken,
        _notification: &dyn Notification,
    ) -> anyhow::Result<()> {
        self.started.notify_one();
        cancel.cancelled().await;
        Err(ContextCancelled.into())
    }
}
