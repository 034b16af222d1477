//! Routes a notification to every transport its recipient opted into.
//!
//! `push` resolves the recipient first and stops there if nobody matches.
//! Every eligible transport is then attempted regardless of what happened to
//! the others, and their failures are collected into one [`AggregateError`].

use crate::error::{is_permanent, permanent, AggregateError, Cancelled, DeliveryFailure};
use crate::notification::Notification;
use crate::transport::Transport;
use crate::types::TransportKey;
use crate::user::{User, UserStore, UserStoreError};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// How eligible transports are invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanOut {
    /// One after another, in registration order.
    #[default]
    Sequential,
    /// All at once on the calling task. Failures keep registration order.
    Concurrent,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The recipient could not be resolved; no transport was invoked.
    #[error("failed to find recipient user: {0}")]
    Recipient(#[source] UserStoreError),
    /// At least one eligible transport failed.
    #[error("failed to deliver notification:\n{0}")]
    Delivery(#[from] AggregateError),
}

impl DispatchError {
    pub fn is_recipient_not_found(&self) -> bool {
        matches!(self, DispatchError::Recipient(UserStoreError::NotFound))
    }

    /// The per-transport failures, if this was a delivery error.
    pub fn delivery(&self) -> Option<&AggregateError> {
        match self {
            DispatchError::Delivery(aggregate) => Some(aggregate),
            DispatchError::Recipient(_) => None,
        }
    }
}

/// The preference-gated fan-out over a fixed list of transports.
pub struct Dispatcher {
    store: Arc<dyn UserStore>,
    transports: Vec<Arc<dyn Transport>>,
    fan_out: FanOut,
}

impl Dispatcher {
    /// Creates a new `Dispatcher`. Transports keep the order given here.
    pub fn new(store: Arc<dyn UserStore>, transports: Vec<Arc<dyn Transport>>) -> Self {
        Self {
            store,
            transports,
            fan_out: FanOut::default(),
        }
    }

    pub fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub fn register(&mut self, transport: Arc<dyn Transport>) {
        info!(transport = %transport.key(), "Registering transport");
        self.transports.push(transport);
    }

    pub fn transport_keys(&self) -> Vec<&TransportKey> {
        self.transports.iter().map(|t| t.key()).collect()
    }

    /// Delivers `notification` through every transport the recipient wants.
    ///
    /// # Returns
    /// * `Ok(())` if every eligible transport succeeded, including when none was eligible
    /// * `Err(DispatchError::Recipient)` if the recipient could not be resolved
    /// * `Err(DispatchError::Delivery)` holding every transport failure otherwise
    #[instrument(skip_all, fields(event = %notification.event_type()))]
    pub async fn push(
        &self,
        cancel: &CancellationToken,
        notification: &dyn Notification,
    ) -> Result<(), DispatchError> {
        let user = self
            .store
            .find(notification.recipient())
            .await
            .map_err(|err| {
                debug!(recipient = %notification.recipient(), error = %err, "Failed to find user");
                DispatchError::Recipient(err)
            })?;

        let eligible: Vec<&Arc<dyn Transport>> = self
            .transports
            .iter()
            .filter(|transport| {
                let wanted = user.wants(notification.event_type(), transport.key());
                if !wanted {
                    debug!(
                        user = %user.key,
                        transport = %transport.key(),
                        "User does not want this notification this way"
                    );
                }
                wanted
            })
            .collect();

        let failures: Vec<DeliveryFailure> = match self.fan_out {
            FanOut::Sequential => {
                let mut failures = Vec::new();
                for transport in eligible {
                    if let Some(failure) =
                        push_one(transport.as_ref(), cancel, notification, &user).await
                    {
                        failures.push(failure);
                    }
                }
                failures
            }
            FanOut::Concurrent => join_all(
                eligible
                    .into_iter()
                    .map(|transport| push_one(transport.as_ref(), cancel, notification, &user)),
            )
            .await
            .into_iter()
            .flatten()
            .collect(),
        };

        AggregateError::into_result(failures).map_err(DispatchError::from)
    }

    /// Runs every transport that exposes the [`Validator`](crate::transport::Validator)
    /// capability. All failures come back classified as permanent.
    pub async fn validate_transports(&self, cancel: &CancellationToken) -> Result<(), AggregateError> {
        let mut failures = Vec::new();

        for transport in &self.transports {
            let Some(validator) = transport.as_validator() else {
                debug!(transport = %transport.key(), "Transport has no validation hook");
                continue;
            };

            match validator.validate(cancel).await {
                Ok(()) => info!(transport = %transport.key(), "Transport validated"),
                Err(err) => {
                    error!(transport = %transport.key(), error = %err, "Transport validation failed");
                    let err = if is_permanent(&err) { err } else { permanent(err) };
                    failures.push(DeliveryFailure::new(transport.key().clone(), err));
                }
            }
        }

        AggregateError::into_result(failures)
    }
}

async fn push_one(
    transport: &dyn Transport,
    cancel: &CancellationToken,
    notification: &dyn Notification,
    user: &User,
) -> Option<DeliveryFailure> {
    let key = transport.key();

    if cancel.is_cancelled() {
        warn!(user = %user.key, transport = %key, "Dispatch cancelled, skipping transport");
        return Some(DeliveryFailure::new(key.clone(), anyhow::Error::new(Cancelled)));
    }

    info!(user = %user.key, transport = %key, "Pushing notification");
    // TODO: decorate transports with a retry policy that skips permanent failures.
    match transport.push(cancel, notification).await {
        Ok(()) => None,
        Err(err) => {
            error!(
                user = %user.key,
                transport = %key,
                permanent = is_permanent(&err),
                error = %err,
                "Failed to push notification"
            );
            Some(DeliveryFailure::new(key.clone(), err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::Identity;
    use crate::notification::NotificationBuilder;
    use crate::transport::Validator;
    use crate::user::InMemoryUserStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTransport {
        key: TransportKey,
        calls: AtomicUsize,
        fails: bool,
    }

    impl CountingTransport {
        fn new(key: &str, fails: bool) -> Arc<Self> {
            Arc::new(Self {
                key: key.into(),
                calls: AtomicUsize::new(0),
                fails,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for CountingTransport {
        fn key(&self) -> &TransportKey {
            &self.key
        }

        async fn push(
            &self,
            _cancel: &CancellationToken,
            _notification: &dyn Notification,
        ) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fails {
                Err(anyhow!("{} is down", self.key))
            } else {
                Ok(())
            }
        }
    }

    struct FlakyValidator {
        key: TransportKey,
    }

    #[async_trait]
    impl Transport for FlakyValidator {
        fn key(&self) -> &TransportKey {
            &self.key
        }

        async fn push(&self, _: &CancellationToken, _: &dyn Notification) -> anyhow::Result<()> {
            Ok(())
        }

        fn as_validator(&self) -> Option<&dyn Validator> {
            Some(self)
        }
    }

    #[async_trait]
    impl Validator for FlakyValidator {
        async fn validate(&self, _: &CancellationToken) -> anyhow::Result<()> {
            Err(anyhow!("bad credentials"))
        }
    }

    fn store() -> Arc<InMemoryUserStore> {
        Arc::new(InMemoryUserStore::new([User::new("rufus")
            .with_identity(Identity::new("username", "rufus").unwrap())
            .with_preference("com.example.one", "email", true)
            .with_preference("com.example.one", "slack", true)]))
    }

    fn notification(event: &str, username: &str) -> crate::notification::BuiltNotification {
        NotificationBuilder::new(event)
            .with_recipient([Identity::new("username", username).unwrap()])
            .with_default_message("hello world")
            .build()
    }

    #[tokio::test]
    async fn test_cancelled_dispatch_skips_transports() {
        let email = CountingTransport::new("email", false);
        let slack = CountingTransport::new("slack", false);
        let dispatcher = Dispatcher::new(store(), vec![email.clone(), slack.clone()]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = dispatcher
            .push(&cancel, &notification("com.example.one", "rufus"))
            .await
            .unwrap_err();

        let aggregate = err.delivery().expect("delivery error");
        assert_eq!(aggregate.len(), 2);
        assert!(aggregate.contains::<Cancelled>());
        assert_eq!(email.calls(), 0);
        assert_eq!(slack.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_fan_out_keeps_registration_order() {
        let email = CountingTransport::new("email", true);
        let slack = CountingTransport::new("slack", true);
        let dispatcher = Dispatcher::new(store(), vec![email.clone(), slack.clone()])
            .with_fan_out(FanOut::Concurrent);

        let err = dispatcher
            .push(&CancellationToken::new(), &notification("com.example.one", "rufus"))
            .await
            .unwrap_err();

        let keys: Vec<&str> = err
            .delivery()
            .unwrap()
            .failures()
            .iter()
            .map(|f| f.transport.as_str())
            .collect();
        assert_eq!(keys, vec!["email", "slack"]);
        assert_eq!(email.calls(), 1);
        assert_eq!(slack.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_recipient_error_chain() {
        let dispatcher = Dispatcher::new(store(), Vec::new());
        let err = dispatcher
            .push(&CancellationToken::new(), &notification("com.example.one", "nobody"))
            .await
            .unwrap_err();

        assert!(err.is_recipient_not_found());
        let source = std::error::Error::source(&err).unwrap();
        assert!(matches!(
            source.downcast_ref::<UserStoreError>(),
            Some(UserStoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_register_appends_in_order() {
        let mut dispatcher = Dispatcher::new(store(), Vec::new());
        dispatcher.register(CountingTransport::new("email", false));
        dispatcher.register(CountingTransport::new("slack", false));

        let keys: Vec<&str> = dispatcher.transport_keys().iter().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["email", "slack"]);
    }

    #[tokio::test]
    async fn test_validate_transports_classifies_permanent() {
        let dispatcher = Dispatcher::new(
            Arc::new(InMemoryUserStore::default()),
            vec![
                CountingTransport::new("email", false),
                Arc::new(FlakyValidator { key: "slack".into() }),
            ],
        );

        let err = dispatcher
            .validate_transports(&CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.len(), 1);
        let failure = err.for_transport(&"slack".into()).unwrap();
        assert!(failure.is_permanent());
    }

    #[tokio::test]
    async fn test_validate_without_validators_is_ok() {
        let dispatcher = Dispatcher::new(
            Arc::new(InMemoryUserStore::default()),
            vec![CountingTransport::new("email", false)],
        );
        assert!(dispatcher
            .validate_transports(&CancellationToken::new())
            .await
            .is_ok());
    }
}
