//! Namespaced identities used to address a recipient across systems.
//!
//! A recipient can be reachable in many places at once: an email address, a
//! chat user ID, an internal username. Each of those is an [`Identity`] whose
//! [`NamespacedKey`] says which system the value belongs to, and an
//! [`IdentitySet`] gathers all of them for a single recipient.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separates the namespace from the kind in the string form of a key.
pub const SEPARATOR: char = '/';

/// Well-known kinds. Transports agree on these by convention only.
pub const KIND_EMAIL: &str = "email";
pub const KIND_USERNAME: &str = "username";
pub const KIND_ID: &str = "id";

/// Errors raised while constructing identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Every key needs a kind; only the namespace may be empty.
    #[error("identifier kind must not be empty (namespace: {namespace:?})")]
    EmptyKind { namespace: String },
    /// The namespace ends at the first separator, so it cannot contain one.
    #[error("identifier namespace must not contain '/' (namespace: {namespace:?})")]
    SeparatorInNamespace { namespace: String },
}

/// The address type of an identity, e.g. `email` or `slack.com/id`.
///
/// Construction rejects an empty kind, so every key in circulation can be
/// split back into the `(namespace, kind)` pair it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamespacedKey {
    namespace: String,
    kind: String,
}

impl NamespacedKey {
    /// Builds a key from its parts. `namespace` may be empty, `kind` may not.
    ///
    /// A bare kind that itself contains a separator is re-split, so the key
    /// always equals the one parsed from its string form.
    pub fn new(
        namespace: impl Into<String>,
        kind: impl Into<String>,
    ) -> Result<Self, IdentifierError> {
        let namespace = namespace.into();
        let kind = kind.into();
        if namespace.contains(SEPARATOR) {
            return Err(IdentifierError::SeparatorInNamespace { namespace });
        }
        if namespace.is_empty() && kind.contains(SEPARATOR) {
            return Self::parse(&kind);
        }
        if kind.is_empty() {
            return Err(IdentifierError::EmptyKind { namespace });
        }
        Ok(Self { namespace, kind })
    }

    /// Builds a key with no namespace.
    pub fn kind_only(kind: impl Into<String>) -> Result<Self, IdentifierError> {
        Self::new(String::new(), kind)
    }

    /// Parses `namespace/kind` (or a bare `kind`), splitting on the first separator.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        match raw.split_once(SEPARATOR) {
            Some((namespace, kind)) => Self::new(namespace, kind),
            None => Self::kind_only(raw),
        }
    }

    pub fn split(&self) -> (&str, &str) {
        (&self.namespace, &self.kind)
    }

    pub fn namespace(&self) -> &str {
        self.split().0
    }

    pub fn kind(&self) -> &str {
        self.split().1
    }

    /// The generic `email` key.
    pub fn email() -> Self {
        Self::well_known(KIND_EMAIL)
    }

    /// The generic `username` key.
    pub fn username() -> Self {
        Self::well_known(KIND_USERNAME)
    }

    /// The generic `id` key.
    pub fn id() -> Self {
        Self::well_known(KIND_ID)
    }

    fn well_known(kind: &'static str) -> Self {
        Self::from_static("", kind)
    }

    /// For keys spelled out in source; `kind` is never empty there.
    pub(crate) fn from_static(namespace: &'static str, kind: &'static str) -> Self {
        debug_assert!(!kind.is_empty());
        Self {
            namespace: namespace.to_string(),
            kind: kind.to_string(),
        }
    }
}

impl fmt::Display for NamespacedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}{}{}", self.namespace, SEPARATOR, self.kind)
        }
    }
}

impl FromStr for NamespacedKey {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NamespacedKey {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NamespacedKey> for String {
    fn from(key: NamespacedKey) -> Self {
        key.to_string()
    }
}

/// Anything that can name the key of an identity: a typed key or its string form.
pub trait IntoNamespacedKey {
    fn into_namespaced_key(self) -> Result<NamespacedKey, IdentifierError>;
}

impl IntoNamespacedKey for NamespacedKey {
    fn into_namespaced_key(self) -> Result<NamespacedKey, IdentifierError> {
        Ok(self)
    }
}

impl IntoNamespacedKey for &NamespacedKey {
    fn into_namespaced_key(self) -> Result<NamespacedKey, IdentifierError> {
        Ok(self.clone())
    }
}

impl IntoNamespacedKey for &str {
    fn into_namespaced_key(self) -> Result<NamespacedKey, IdentifierError> {
        NamespacedKey::parse(self)
    }
}

impl IntoNamespacedKey for String {
    fn into_namespaced_key(self) -> Result<NamespacedKey, IdentifierError> {
        NamespacedKey::parse(&self)
    }
}

/// The raw value of an identity before it is normalized to a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityValue {
    Text(String),
    Integer(i128),
}

impl fmt::Display for IdentityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityValue::Text(text) => f.write_str(text),
            // Base 10, no grouping.
            IdentityValue::Integer(n) => write!(f, "{n}"),
        }
    }
}

impl From<String> for IdentityValue {
    fn from(value: String) -> Self {
        IdentityValue::Text(value)
    }
}

impl From<&str> for IdentityValue {
    fn from(value: &str) -> Self {
        IdentityValue::Text(value.to_string())
    }
}

impl From<&String> for IdentityValue {
    fn from(value: &String) -> Self {
        IdentityValue::Text(value.clone())
    }
}

macro_rules! integer_identity_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for IdentityValue {
                fn from(value: $ty) -> Self {
                    IdentityValue::Integer(i128::from(value))
                }
            }
        )*
    };
}

integer_identity_value!(i8, i16, i32, i64, i128, u8, u16, u32, u64);

/// One way of addressing a recipient in some external system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub key: NamespacedKey,
    pub value: String,
}

impl Identity {
    /// Creates an identity, normalizing integer values to their decimal form.
    ///
    /// ```
    /// use courier::identifier::Identity;
    ///
    /// let id = Identity::new("gitlab.com/id", 123456_i64).unwrap();
    /// assert_eq!(id.key.namespace(), "gitlab.com");
    /// assert_eq!(id.value, "123456");
    /// ```
    pub fn new(
        key: impl IntoNamespacedKey,
        value: impl Into<IdentityValue>,
    ) -> Result<Self, IdentifierError> {
        Ok(Self {
            key: key.into_namespaced_key()?,
            value: value.into().to_string(),
        })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// All known identities of one recipient, at most one value per key.
///
/// Iteration order is unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    into = "HashMap<NamespacedKey, String>",
    from = "HashMap<NamespacedKey, RawIdentityValue>"
)]
pub struct IdentitySet {
    entries: HashMap<NamespacedKey, String>,
}

impl IdentitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from a list; later entries win over earlier ones with the same key.
    pub fn from_identities(identities: impl IntoIterator<Item = Identity>) -> Self {
        identities.into_iter().collect()
    }

    /// Inserts or overwrites a single identity, returning the previous value.
    pub fn insert(&mut self, identity: Identity) -> Option<String> {
        self.entries.insert(identity.key, identity.value)
    }

    /// Overwrites every key present in `other`; keys absent from `other` are untouched.
    pub fn merge(&mut self, other: &IdentitySet) {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &NamespacedKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &NamespacedKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NamespacedKey, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// An unordered snapshot of the set.
    pub fn to_list(&self) -> Vec<Identity> {
        self.entries
            .iter()
            .map(|(key, value)| Identity {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }
}

/// Values as they appear in configuration files: strings or bare integers.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum RawIdentityValue {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl From<RawIdentityValue> for IdentityValue {
    fn from(raw: RawIdentityValue) -> Self {
        match raw {
            RawIdentityValue::Text(text) => text.into(),
            RawIdentityValue::Signed(n) => n.into(),
            RawIdentityValue::Unsigned(n) => n.into(),
        }
    }
}

impl From<HashMap<NamespacedKey, RawIdentityValue>> for IdentitySet {
    fn from(raw: HashMap<NamespacedKey, RawIdentityValue>) -> Self {
        let entries = raw
            .into_iter()
            .map(|(key, value)| (key, IdentityValue::from(value).to_string()))
            .collect();
        Self { entries }
    }
}

impl From<IdentitySet> for HashMap<NamespacedKey, String> {
    fn from(set: IdentitySet) -> Self {
        set.entries
    }
}

impl FromIterator<Identity> for IdentitySet {
    fn from_iter<I: IntoIterator<Item = Identity>>(iter: I) -> Self {
        let mut set = IdentitySet::new();
        set.extend(iter);
        set
    }
}

impl Extend<Identity> for IdentitySet {
    fn extend<I: IntoIterator<Item = Identity>>(&mut self, iter: I) {
        for identity in iter {
            self.insert(identity);
        }
    }
}

impl fmt::Display for IdentitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pairs: Vec<String> = self.iter().map(|(k, v)| format!("{k}={v}")).collect();
        pairs.sort();
        write!(f, "[{}]", pairs.join(", "))
    }
}

/// Merges a possibly absent set into a possibly absent receiver.
///
/// Two absent sets stay absent. An absent receiver takes a copy of `other`.
pub fn merge_into(target: &mut Option<IdentitySet>, other: Option<&IdentitySet>) {
    let Some(other) = other else {
        return;
    };
    target.get_or_insert_with(IdentitySet::new).merge(other);
}
