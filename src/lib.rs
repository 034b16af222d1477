//! Courier - preference-gated notification routing
//!
//! This library resolves a notification's recipient, checks which transports
//! that recipient opted into for the event, and pushes to each of them
//! independently, reporting every failure in one classified error.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod identifier;
pub mod notification;
pub mod services;
pub mod transport;
pub mod types;
pub mod user;

// Re-export core types for convenience
pub use dispatcher::{DispatchError, Dispatcher, FanOut};
pub use error::{is_permanent, permanent, AggregateError, DeliveryFailure, Permanent};
pub use identifier::{Identity, IdentitySet, NamespacedKey};
pub use notification::{Notification, NotificationBuilder, RichNotification};
pub use transport::{Transport, Validator};
pub use types::{EventType, TransportKey};
pub use user::{InMemoryUserStore, User, UserStore, UserStoreError};
