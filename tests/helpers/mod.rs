#![allow(dead_code)]
pub mod fake_transport;

use courier::{
    identifier::{Identity, IdentitySet},
    notification::BuiltNotification,
    InMemoryUserStore, NotificationBuilder, User,
};
use std::sync::Arc;

/// The recipient used by most dispatcher tests.
///
/// Wants `com.example.one` over email and slack, and `com.example.two`
/// over email only.
pub fn rufus() -> User {
    User::new("rufus")
        .with_identity(Identity::new("username", "rufus").unwrap())
        .with_preference("com.example.one", "email", true)
        .with_preference("com.example.one", "slack", true)
        .with_preference("com.example.two", "email", true)
        .with_preference("com.example.two", "slack", false)
}

pub fn store_with(users: impl IntoIterator<Item = User>) -> Arc<InMemoryUserStore> {
    Arc::new(InMemoryUserStore::new(users))
}

pub fn notification_for(event: &str, identities: &IdentitySet) -> BuiltNotification {
    NotificationBuilder::new(event)
        .with_recipient(identities.to_list())
        .with_default_message("hello world")
        .build()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
