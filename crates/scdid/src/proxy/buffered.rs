use core::{marker::PhantomData, time::Duration};
use std::collections::VecDeque;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{Allocate, Error, MAX_TICK, Result, ScdId, SleepProvider};

/// Largest block a proxy requests once it has warmed up.
pub const DEFAULT_MAX_BATCH: u32 = 1000;

/// Number of refill attempts before [`BufferedProxy::next`] gives up.
pub const LOAD_ATTEMPTS: u32 = 3;

/// Pause between two failed refill attempts.
pub const RETRY_DELAY: Duration = Duration::from_millis(200);

/// Block size for the `call`-th refill (1-based), capped at `max_batch`.
///
/// The first refill asks for a single identifier so that short-lived callers
/// waste at most one; later refills grow to 50, 200 and then `max_batch`.
///
/// ```
/// use scdid::batch_size;
///
/// let sizes: Vec<_> = (1..=5).map(|call| batch_size(call, 1000)).collect();
/// assert_eq!(sizes, [1, 50, 200, 1000, 1000]);
/// ```
pub const fn batch_size(call: u64, max_batch: u32) -> u32 {
    let size = match call {
        0 | 1 => 1,
        2 => 50,
        3 => 200,
        _ => max_batch,
    };
    if size < max_batch { size } else { max_batch }
}

/// A per-caller prefetch queue in front of an [`Allocate`] implementation.
///
/// Identifiers are handed out from a local FIFO queue; only an empty queue
/// triggers a round-trip to the allocator. Block sizes follow
/// [`batch_size`], so a busy caller settles at one round-trip per
/// `max_batch` identifiers.
///
/// `next` takes `&mut self`: a proxy belongs to one caller. Share the
/// allocator (for example behind an `Arc`) and give every task its own proxy.
///
/// The sleep between failed refills goes through `S`, so the proxy runs on
/// any runtime with a [`SleepProvider`].
///
/// # Example
/// ```
/// # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
/// use std::sync::Arc;
/// use scdid::{BufferedProxy, MemoryCounterStore, SequenceAllocator, TokioSleep};
///
/// let allocator = Arc::new(
///     SequenceAllocator::builder()
///         .store(MemoryCounterStore::new())
///         .build()
///         .await
///         .unwrap(),
/// );
///
/// let mut proxy = BufferedProxy::<_, TokioSleep>::new(Arc::clone(&allocator), 0);
/// let a = proxy.next().await.unwrap();
/// let b = proxy.next().await.unwrap();
/// assert_ne!(a, b);
/// # });
/// ```
pub struct BufferedProxy<A, S>
where
    A: Allocate,
    S: SleepProvider,
{
    allocator: A,
    ts_ref: u64,
    max_batch: u32,
    ids: VecDeque<ScdId>,
    calls: u64,
    _sleep: PhantomData<fn() -> S>,
}

impl<A, S> BufferedProxy<A, S>
where
    A: Allocate,
    S: SleepProvider,
{
    /// Creates a proxy with the default maximum block size.
    ///
    /// `ts_ref` is forwarded to every allocation: `0` produces identifiers
    /// without biz, year and month.
    pub fn new(allocator: A, ts_ref: u64) -> Self {
        Self {
            allocator,
            ts_ref,
            max_batch: DEFAULT_MAX_BATCH,
            ids: VecDeque::new(),
            calls: 0,
            _sleep: PhantomData,
        }
    }

    /// Creates a proxy whose warmed-up block size is `max_batch`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] unless `1 <= max_batch < MAX_TICK`.
    pub fn with_max_batch(allocator: A, ts_ref: u64, max_batch: u32) -> Result<Self> {
        if max_batch == 0 || u64::from(max_batch) >= MAX_TICK {
            return Err(Error::Config {
                reason: format!("max batch {max_batch} is outside 1..{MAX_TICK}"),
            });
        }
        Ok(Self {
            max_batch,
            ..Self::new(allocator, ts_ref)
        })
    }

    /// Returns the next identifier.
    ///
    /// Served from the queue when possible. An empty queue is refilled with
    /// up to [`LOAD_ATTEMPTS`] attempts, sleeping [`RETRY_DELAY`] after each
    /// failed one that will be retried.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exhausted`], wrapping the last allocator error, if
    /// every attempt failed. The proxy stays usable and the caller may retry.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub async fn next(&mut self) -> Result<ScdId> {
        if let Some(id) = self.ids.pop_front() {
            return Ok(id);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.load().await {
                Ok(id) => return Ok(id),
                Err(e) if attempt >= LOAD_ATTEMPTS => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(attempts = attempt, error = %e, "giving up on identifier refill");
                    return Err(Error::Exhausted {
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(attempt, error = %_e, "identifier refill failed, retrying");
                    S::sleep_for(RETRY_DELAY).await;
                }
            }
        }
    }

    /// Number of identifiers waiting in the queue.
    pub fn buffered(&self) -> usize {
        self.ids.len()
    }

    /// Number of refills attempted so far, successful or not.
    pub fn loads(&self) -> u64 {
        self.calls
    }

    pub fn reference_time(&self) -> u64 {
        self.ts_ref
    }

    pub fn max_batch(&self) -> u32 {
        self.max_batch
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Reserves the next block and queues all of it but the first
    /// identifier, which is returned.
    async fn load(&mut self) -> Result<ScdId> {
        self.calls += 1;
        let count = batch_size(self.calls, self.max_batch);
        let base = self.allocator.allocate(count, self.ts_ref).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(count, base = %base, "loaded identifier block");

        self.ids
            .extend((1..u64::from(count)).map(|offset| base.offset(offset)));
        Ok(base)
    }
}

#[cfg_attr(docsrs, doc(cfg(feature = "async-tokio")))]
#[cfg(feature = "async-tokio")]
/// A [`BufferedProxy`] that sleeps on the Tokio timer.
pub type TokioBufferedProxy<A> = BufferedProxy<A, crate::TokioSleep>;

#[cfg_attr(docsrs, doc(cfg(feature = "async-smol")))]
#[cfg(feature = "async-smol")]
/// A [`BufferedProxy`] that sleeps on the Smol timer.
pub type SmolBufferedProxy<A> = BufferedProxy<A, crate::SmolSleep>;
