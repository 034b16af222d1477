//! Notifications and the builder used to author them.
//!
//! A [`Notification`] carries an event type, the identities of its recipient
//! and a message that each transport can render differently. Transports that
//! understand structured payloads probe for the [`RichNotification`]
//! capability through [`Notification::as_rich`].

use crate::identifier::{Identity, IdentitySet};
use crate::types::{EventType, TransportKey};
use serde_json::Value;
use std::collections::HashMap;

/// An event addressed to a single recipient.
pub trait Notification: Send + Sync {
    fn event_type(&self) -> &EventType;

    /// The merged identities used to find the recipient.
    fn recipient(&self) -> &IdentitySet;

    /// Who caused the event, if known.
    fn initiator(&self) -> Option<&IdentitySet> {
        None
    }

    /// Text for `transport`: its override if present, else the default message, else empty.
    fn render(&self, transport: &TransportKey) -> String;

    /// Probes for the rich payload capability.
    fn as_rich(&self) -> Option<&dyn RichNotification> {
        None
    }
}

/// Optional capability: transport-specific structured data, such as Slack blocks.
pub trait RichNotification: Send + Sync {
    fn payload(&self, transport: &TransportKey) -> Option<&Value>;
}

/// Accumulates the parts of a notification. [`NotificationBuilder::build`]
/// is the only way to obtain a [`BuiltNotification`].
#[derive(Debug, Clone)]
pub struct NotificationBuilder {
    event_type: EventType,
    recipient: IdentitySet,
    initiator: Option<IdentitySet>,
    default_message: Option<String>,
    overrides: HashMap<TransportKey, String>,
    payloads: HashMap<TransportKey, Value>,
}

impl NotificationBuilder {
    pub fn new(event_type: impl Into<EventType>) -> Self {
        Self {
            event_type: event_type.into(),
            recipient: IdentitySet::new(),
            initiator: None,
            default_message: None,
            overrides: HashMap::new(),
            payloads: HashMap::new(),
        }
    }

    /// Adds recipient identities, overwriting keys already present.
    pub fn with_recipient(mut self, identities: impl IntoIterator<Item = Identity>) -> Self {
        self.recipient.extend(identities);
        self
    }

    /// Merges a whole identity set into the recipient.
    pub fn with_recipient_set(mut self, identities: &IdentitySet) -> Self {
        self.recipient.merge(identities);
        self
    }

    pub fn with_initiator(mut self, identities: impl IntoIterator<Item = Identity>) -> Self {
        self.initiator
            .get_or_insert_with(IdentitySet::new)
            .extend(identities);
        self
    }

    pub fn with_default_message(mut self, message: impl Into<String>) -> Self {
        self.default_message = Some(message.into());
        self
    }

    /// Overrides the text rendered for one transport.
    pub fn with_message_for(
        mut self,
        transport: impl Into<TransportKey>,
        message: impl Into<String>,
    ) -> Self {
        self.overrides.insert(transport.into(), message.into());
        self
    }

    /// Attaches structured data for one transport, enabling [`RichNotification`].
    pub fn with_payload(mut self, transport: impl Into<TransportKey>, payload: Value) -> Self {
        self.payloads.insert(transport.into(), payload);
        self
    }

    pub fn build(self) -> BuiltNotification {
        BuiltNotification {
            event_type: self.event_type,
            recipient: self.recipient,
            initiator: self.initiator,
            default_message: self.default_message,
            overrides: self.overrides,
            payloads: self.payloads,
        }
    }
}

/// The immutable notification produced by [`NotificationBuilder`].
#[derive(Debug, Clone)]
pub struct BuiltNotification {
    event_type: EventType,
    recipient: IdentitySet,
    initiator: Option<IdentitySet>,
    default_message: Option<String>,
    overrides: HashMap<TransportKey, String>,
    payloads: HashMap<TransportKey, Value>,
}

impl Notification for BuiltNotification {
    fn event_type(&self) -> &EventType {
        &self.event_type
    }

    fn recipient(&self) -> &IdentitySet {
        &self.recipient
    }

    fn initiator(&self) -> Option<&IdentitySet> {
        self.initiator.as_ref()
    }

    fn render(&self, transport: &TransportKey) -> String {
        self.overrides
            .get(transport)
            .or(self.default_message.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    fn as_rich(&self) -> Option<&dyn RichNotification> {
        if self.payloads.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl RichNotification for BuiltNotification {
    fn payload(&self, transport: &TransportKey) -> Option<&Value> {
        self.payloads.get(transport)
    }
}
