use core::future::Future;
use std::sync::Arc;

use crate::{Result, ScdId};

/// A minimal interface for reserving blocks of identifiers.
///
/// [`BufferedProxy`] is generic over this trait, so it can sit in front of a
/// [`SequenceAllocator`] directly, an `Arc` shared between many proxies, or
/// any other source of contiguous identifier blocks.
///
/// [`BufferedProxy`]: crate::BufferedProxy
/// [`SequenceAllocator`]: crate::SequenceAllocator
pub trait Allocate {
    /// Reserves `n` consecutive identifiers and returns the first one.
    ///
    /// `ts_ref` selects the year and month embedded in the identifiers; `0`
    /// leaves the biz, year and month fields empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the block could not be reserved.
    fn allocate(&self, n: u32, ts_ref: u64) -> impl Future<Output = Result<ScdId>> + Send;
}

impl<A> Allocate for Arc<A>
where
    A: Allocate + Send + Sync,
{
    fn allocate(&self, n: u32, ts_ref: u64) -> impl Future<Output = Result<ScdId>> + Send {
        (**self).allocate(n, ts_ref)
    }
}

impl<A> Allocate for &A
where
    A: Allocate + Sync,
{
    fn allocate(&self, n: u32, ts_ref: u64) -> impl Future<Output = Result<ScdId>> + Send {
        (**self).allocate(n, ts_ref)
    }
}
