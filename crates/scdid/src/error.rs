//! Error types for ID allocation.
//!
//! Every fallible operation in this crate returns [`Error`]. The allocator
//! never recovers from an error on its own; the only local recovery lives in
//! [`BufferedProxy`], which retries a bounded number of times before giving
//! up with [`Error::Exhausted`].
//!
//! [`BufferedProxy`]: crate::BufferedProxy

use thiserror::Error;

/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Boxed error produced by a [`CounterStore`] backend.
///
/// [`CounterStore`]: crate::CounterStore
pub type StoreError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// All errors that `scdid` can produce.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The allocator or proxy was constructed with invalid parameters.
    ///
    /// Raised at construction only and never retried.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// Every second in the overflow cascade was already saturated.
    ///
    /// `start` is the wall-clock second of the allocation and `attempts` the
    /// number of counter increments issued before giving up. An allocator
    /// whose earlier cascades already ran [`MAX_CASCADE`] seconds ahead of
    /// the clock fails with zero attempts.
    ///
    /// [`MAX_CASCADE`]: crate::MAX_CASCADE
    #[error(
        "tick space exhausted within {max} seconds of {start} after {attempts} attempts",
        max = crate::MAX_CASCADE
    )]
    CapacityOverflow { start: u64, attempts: u32 },

    /// The counter store failed to increment a key or refresh its TTL.
    #[error("counter store failure: {0}")]
    Store(#[source] StoreError),

    /// The requested block can never fit inside a single second.
    #[error("batch size {requested} is outside 1..{max}", max = crate::MAX_TICK)]
    InvalidBatchSize { requested: u32 },

    /// The reference time's calendar year cannot be encoded in the year field.
    #[error("reference time {ts} has no encodable calendar year")]
    InvalidReferenceTime { ts: u64 },

    /// The current second no longer fits in the 32-bit timestamp field.
    #[error("timestamp {ts} does not fit in 32 bits")]
    TimestampOutOfRange { ts: u64 },

    /// The buffered proxy failed to refill its queue.
    ///
    /// Carries the error from the final attempt. Callers may retry at their
    /// own cadence.
    #[error("failed to load identifiers after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Wraps any backend error as [`Error::Store`].
    pub fn store<E>(err: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        Self::Store(Box::new(err))
    }

    /// Returns `true` if the error happened at construction time.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}
