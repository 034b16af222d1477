//! Error classification shared by the dispatcher and transports.
//!
//! Transports report failures as [`anyhow::Error`]. A failure that retrying
//! cannot fix (a missing address, bad credentials) is wrapped with
//! [`permanent`], and anything else is left unclassified. The dispatcher
//! collects the failures of one fan-out into an [`AggregateError`].

use crate::types::TransportKey;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Marks the wrapped error as not worth retrying.
#[derive(Debug, Error)]
#[error("permanent failure: {source}")]
pub struct Permanent {
    #[source]
    source: anyhow::Error,
}

impl Permanent {
    /// The error this marker wraps.
    pub fn cause(&self) -> &anyhow::Error {
        &self.source
    }

    pub fn into_cause(self) -> anyhow::Error {
        self.source
    }
}

/// Wraps `err` so that [`is_permanent`] recognizes it.
pub fn permanent(err: impl Into<anyhow::Error>) -> anyhow::Error {
    anyhow::Error::new(Permanent { source: err.into() })
}

/// Returns true if any error in the chain of `err` was marked [`Permanent`].
pub fn is_permanent(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<Permanent>())
}

/// Recorded for a transport that was never started because the dispatch
/// was cancelled first.
#[derive(Debug, Error)]
#[error("dispatch cancelled before transport started")]
pub struct Cancelled;

/// One transport's failure inside an [`AggregateError`].
#[derive(Debug)]
pub struct DeliveryFailure {
    pub transport: TransportKey,
    pub error: anyhow::Error,
}

impl DeliveryFailure {
    pub fn new(transport: TransportKey, error: anyhow::Error) -> Self {
        Self { transport, error }
    }

    pub fn is_permanent(&self) -> bool {
        is_permanent(&self.error)
    }
}

impl fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.transport, self.error)
    }
}

/// The failures collected from one fan-out.
///
/// Never empty: [`AggregateError::from_failures`] returns `None` when there
/// is nothing to report.
#[derive(Debug)]
pub struct AggregateError {
    failures: Vec<DeliveryFailure>,
}

impl AggregateError {
    pub fn from_failures(failures: Vec<DeliveryFailure>) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self { failures })
        }
    }

    /// `Ok(())` for no failures, otherwise the aggregate.
    pub fn into_result(failures: Vec<DeliveryFailure>) -> Result<(), Self> {
        match Self::from_failures(failures) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn failures(&self) -> &[DeliveryFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<DeliveryFailure> {
        self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// The failure reported by `transport`, if any.
    pub fn for_transport(&self, transport: &TransportKey) -> Option<&DeliveryFailure> {
        self.failures.iter().find(|f| &f.transport == transport)
    }

    /// Tests every member's full source chain with `predicate`.
    pub fn any<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&(dyn StdError + 'static)) -> bool,
    {
        self.failures
            .iter()
            .any(|failure| failure.error.chain().any(&mut predicate))
    }

    /// Finds the first error of type `E` in any member's chain.
    pub fn find<E: StdError + 'static>(&self) -> Option<&E> {
        self.failures
            .iter()
            .flat_map(|failure| failure.error.chain())
            .find_map(|cause| cause.downcast_ref::<E>())
    }

    pub fn contains<E: StdError + 'static>(&self) -> bool {
        self.find::<E>().is_some()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.failures.iter().map(ToString::to_string).collect();
        f.write_str(&lines.join("\n"))
    }
}

impl StdError for AggregateError {}
