//! Recipients, their delivery preferences, and how they are looked up.

use crate::identifier::{Identity, IdentitySet};
use crate::types::{EventType, TransportKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Errors returned by a [`UserStore`].
#[derive(Debug, Error)]
pub enum UserStoreError {
    /// No stored user matches any of the supplied identities.
    #[error("user not found")]
    NotFound,
    /// The backing store itself failed.
    #[error("user store failure: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Opt-in flags per event type and transport.
///
/// A pair with no entry means "does not want"; there is no implicit opt-in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preferences(HashMap<EventType, HashMap<TransportKey, bool>>);

impl Preferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, event: impl Into<EventType>, transport: impl Into<TransportKey>, wants: bool) {
        self.0
            .entry(event.into())
            .or_default()
            .insert(transport.into(), wants);
    }

    pub fn wants(&self, event: &EventType, transport: &TransportKey) -> bool {
        self.0
            .get(event)
            .and_then(|by_transport| by_transport.get(transport))
            .copied()
            .unwrap_or(false)
    }
}

/// A person (or bot) that can receive notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub key: String,
    #[serde(default)]
    pub identities: IdentitySet,
    #[serde(default)]
    pub preferences: Preferences,
}

impl User {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            identities: IdentitySet::new(),
            preferences: Preferences::new(),
        }
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identities.insert(identity);
        self
    }

    pub fn with_preference(
        mut self,
        event: impl Into<EventType>,
        transport: impl Into<TransportKey>,
        wants: bool,
    ) -> Self {
        self.preferences.set(event, transport, wants);
        self
    }

    /// Whether this user opted into `event` over `transport`.
    pub fn wants(&self, event: &EventType, transport: &TransportKey) -> bool {
        self.preferences.wants(event, transport)
    }
}

/// Resolves a set of identities to the stored user they belong to.
///
/// The matching policy belongs to the implementation; it must fail with
/// [`UserStoreError::NotFound`] when nothing matches.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, identities: &IdentitySet) -> Result<User, UserStoreError>;
}

/// A store backed by a fixed list of users.
///
/// A user matches when any of its identities equals one in the query.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    users: Vec<User>,
}

impl InMemoryUserStore {
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: users.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find(&self, identities: &IdentitySet) -> Result<User, UserStoreError> {
        self.users
            .iter()
            .find(|user| {
                identities
                    .iter()
                    .any(|(key, value)| user.identities.get(key) == Some(value))
            })
            .cloned()
            .ok_or_else(|| {
                debug!(identities = %identities, "No user matches the given identities");
                UserStoreError::NotFound
            })
    }
}
