use core::future::Future;
use std::sync::Arc;

use crate::StoreError;

/// Prefix of every counter key. The full key is the prefix followed by the
/// decimal second, with no padding.
pub const KEY_PREFIX: &str = "idgen-scd-ts-";

/// Returns the counter key for `secs`.
///
/// ```
/// assert_eq!(scdid::counter_key(1_700_000_000), "idgen-scd-ts-1700000000");
/// ```
pub fn counter_key(secs: u64) -> String {
    format!("{KEY_PREFIX}{secs}")
}

/// An external key/value service with atomic increment and TTL expiry.
///
/// The allocator relies on `increment_by` being atomic across every producer
/// sharing the store: it is the only point where concurrent producers are
/// ordered.
pub trait CounterStore {
    /// Atomically adds `delta` to `key` and returns the post-increment value.
    /// An absent key is created with value `delta`.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the increment could not be applied.
    fn increment_by(
        &self,
        key: &str,
        delta: u64,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Extends the lifetime of `key` to `seconds` from now. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the TTL could not be updated.
    fn set_ttl(&self, key: &str, seconds: u64)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Checks that the backend is usable. Called once when an allocator is
    /// built.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the store cannot serve requests.
    fn validate(&self) -> impl Future<Output = Result<(), StoreError>> + Send {
        async { Ok(()) }
    }
}

impl<S> CounterStore for Arc<S>
where
    S: CounterStore + Send + Sync,
{
    fn increment_by(
        &self,
        key: &str,
        delta: u64,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send {
        (**self).increment_by(key, delta)
    }

    fn set_ttl(
        &self,
        key: &str,
        seconds: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).set_ttl(key, seconds)
    }

    fn validate(&self) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).validate()
    }
}
