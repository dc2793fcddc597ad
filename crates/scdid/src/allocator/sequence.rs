use core::{cmp, fmt, future::Future};
use portable_atomic::{AtomicU64, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Allocate, Calendar, CounterStore, Decoder, Error, Fields, MAX_TICK, Result, ScdId,
    SystemClock, TimeSource, UtcCalendar, YearWindow, counter_key,
};

/// Maximum number of times an allocation may move on to the next second
/// before failing with [`Error::CapacityOverflow`].
pub const MAX_CASCADE: u32 = 10;

/// Largest business tag the biz field can carry.
pub const MAX_BIZ: u8 = ScdId::BIZ_MASK as u8;

/// Eviction deadline applied to a counter key after every increment.
///
/// A key touched at cascade depth `e` lives for `base + step * e` seconds.
/// Counter keys are only read during the second they name, so the deadline
/// just needs to outlive that second and any clock disagreement between
/// producers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TtlPolicy {
    pub base: u64,
    pub step: u64,
}

impl TtlPolicy {
    /// Returns the TTL in seconds for a key incremented at `depth`.
    pub const fn seconds(&self, depth: u32) -> u64 {
        self.base.saturating_add(self.step.saturating_mul(depth as u64))
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            base: 120,
            step: 10,
        }
    }
}

/// Allocates blocks of identifiers from a shared [`CounterStore`].
///
/// Each second has its own counter key. Reserving `n` ticks atomically adds
/// `n` to the key of the current second; the post-increment value `v` makes
/// `v - (n - 1) ..= v` this caller's block. When `v` reaches [`MAX_TICK`] the
/// block spilled past the tick space and the allocator retries at the next
/// second. No block is placed more than [`MAX_CASCADE`] seconds past the
/// current wall-clock second; beyond that the allocator reports
/// [`Error::CapacityOverflow`].
///
/// The allocator holds no mutable state besides the highest second it has
/// issued, so it is safe to share between tasks behind an `Arc`. Sequential
/// allocations on one allocator never go back in time: a run starts at that
/// second if the clock is behind it, and the lead counts toward the cascade
/// limit.
///
/// ## See Also
/// - [`BufferedProxy`]
///
/// [`BufferedProxy`]: crate::BufferedProxy
pub struct SequenceAllocator<S, T = SystemClock, C = UtcCalendar>
where
    S: CounterStore,
    T: TimeSource,
    C: Calendar,
{
    store: S,
    biz: u8,
    time: T,
    calendar: C,
    ttl: TtlPolicy,
    decoder: Decoder,
    last_ts: AtomicU64,
}

impl<S> SequenceAllocator<S, SystemClock, UtcCalendar>
where
    S: CounterStore,
{
    /// Starts building an allocator with the system clock, the UTC calendar,
    /// the default TTL policy and the default plausibility window.
    ///
    /// # Example
    /// ```
    /// # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
    /// use scdid::{MemoryCounterStore, SequenceAllocator};
    ///
    /// let allocator = SequenceAllocator::builder()
    ///     .biz(3)
    ///     .store(MemoryCounterStore::new())
    ///     .build()
    ///     .await
    ///     .unwrap();
    ///
    /// let id = allocator.allocate(1, 1_577_836_800).await.unwrap();
    /// assert_eq!(id.biz(), 3);
    /// assert_eq!(id.year(), 2020);
    /// assert_eq!(id.month(), 1);
    /// # });
    /// ```
    pub fn builder() -> AllocatorBuilder<S, SystemClock, UtcCalendar> {
        AllocatorBuilder::new()
    }
}

impl<S, T, C> SequenceAllocator<S, T, C>
where
    S: CounterStore,
    T: TimeSource,
    C: Calendar,
{
    pub fn biz(&self) -> u8 {
        self.biz
    }

    pub fn ttl_policy(&self) -> TtlPolicy {
        self.ttl
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The highest second this allocator has issued an identifier for, or
    /// `0` before the first allocation.
    pub fn last_timestamp(&self) -> u64 {
        self.last_ts.load(Ordering::Acquire)
    }

    /// Reserves `n` consecutive identifiers and returns the first.
    ///
    /// With `ts_ref == 0` the identifier is `(ts << 32) | tick`. Otherwise the
    /// year and month of `ts_ref` (per the configured calendar) and the biz
    /// tag are embedded too. In both cases `ts` is the current second, or a
    /// later one if the tick space overflowed.
    ///
    /// The caller owns the returned identifier and the `n - 1` integers that
    /// follow it.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidBatchSize`] if `n` is `0` or not below [`MAX_TICK`]
    /// - [`Error::InvalidReferenceTime`] if the year of `ts_ref` cannot be
    ///   encoded
    /// - [`Error::CapacityOverflow`] if every second in the cascade was full
    /// - [`Error::Store`] if the counter store failed
    /// - [`Error::TimestampOutOfRange`] if the second no longer fits in 32
    ///   bits
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub async fn allocate(&self, n: u32, ts_ref: u64) -> Result<ScdId> {
        if n == 0 || u64::from(n) >= MAX_TICK {
            return Err(Error::InvalidBatchSize { requested: n });
        }

        let calendar = if ts_ref == 0 {
            None
        } else {
            Some(self.year_month(ts_ref)?)
        };

        let now = self.time.current_secs();
        let start = cmp::max(now, self.last_timestamp());
        if start > ScdId::TIMESTAMP_MASK {
            return Err(Error::TimestampOutOfRange { ts: start });
        }

        let (ts, tick) = self.get_tick(now, start, u64::from(n)).await?;
        if ts > ScdId::TIMESTAMP_MASK {
            return Err(Error::TimestampOutOfRange { ts });
        }
        self.last_ts.fetch_max(ts, Ordering::AcqRel);

        let id = match calendar {
            None => ScdId::from_ts_tick(ts, tick),
            Some((year, month)) => {
                ScdId::from_parts(ts, u64::from(self.biz), year, month, tick)
            }
        };
        Ok(id)
    }

    /// Decodes `raw` against the plausibility window this allocator was built
    /// with.
    pub fn decode(&self, raw: u64) -> Option<Fields> {
        self.decoder.decode(raw)
    }

    pub fn decoder(&self) -> Decoder {
        self.decoder
    }

    fn year_month(&self, ts_ref: u64) -> Result<(u64, u64)> {
        let (year, month) = self
            .calendar
            .year_month(ts_ref)
            .ok_or(Error::InvalidReferenceTime { ts: ts_ref })?;
        let year = u64::try_from(year)
            .ok()
            .filter(|y| *y <= ScdId::YEAR_MASK)
            .ok_or(Error::InvalidReferenceTime { ts: ts_ref })?;
        Ok((year, u64::from(month)))
    }

    /// Reserves `n` ticks at `start` or, on overflow, at the first later
    /// second that still has room. Returns the second used and the first
    /// tick of the block.
    ///
    /// Depth is measured from the wall-clock second `now`: a `start` already
    /// ahead of the clock has spent `start - now` cascade steps, and no block
    /// is placed more than [`MAX_CASCADE`] seconds past `now`.
    async fn get_tick(&self, now: u64, start: u64, n: u64) -> Result<(u64, u64)> {
        let mut ts = start;
        let mut attempts = 0;
        loop {
            let depth = ts - now;
            if depth > u64::from(MAX_CASCADE) {
                #[cfg(feature = "tracing")]
                tracing::warn!(now, ts, attempts, "tick space exhausted");
                return Err(Error::CapacityOverflow {
                    start: now,
                    attempts,
                });
            }

            let key = counter_key(ts);
            attempts += 1;
            let value = self
                .store
                .increment_by(&key, n)
                .await
                .map_err(Error::Store)?;
            self.store
                .set_ttl(&key, self.ttl.seconds(depth as u32))
                .await
                .map_err(Error::Store)?;

            if value / MAX_TICK == 0 {
                let first = value.checked_sub(n - 1).ok_or_else(|| {
                    Error::Store(format!("{key} read {value} after adding {n}").into())
                })?;
                return Ok((ts, first));
            }

            #[cfg(feature = "tracing")]
            tracing::debug!(ts, value, depth, "tick space overflowed, moving to next second");
            ts += 1;
        }
    }
}

impl<S, T, C> fmt::Debug for SequenceAllocator<S, T, C>
where
    S: CounterStore,
    T: TimeSource + fmt::Debug,
    C: Calendar + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceAllocator")
            .field("biz", &self.biz)
            .field("time", &self.time)
            .field("calendar", &self.calendar)
            .field("ttl", &self.ttl)
            .field("window", &self.decoder.window())
            .field("last_ts", &self.last_timestamp())
            .finish_non_exhaustive()
    }
}

impl<S, T, C> Allocate for SequenceAllocator<S, T, C>
where
    S: CounterStore + Send + Sync,
    T: TimeSource + Send + Sync,
    C: Calendar + Send + Sync,
{
    fn allocate(&self, n: u32, ts_ref: u64) -> impl Future<Output = Result<ScdId>> + Send {
        Self::allocate(self, n, ts_ref)
    }
}

/// Builder for [`SequenceAllocator`].
///
/// A counter store is mandatory and the biz tag must fit in three bits;
/// [`AllocatorBuilder::build`] fails with [`Error::Config`] otherwise, and
/// also when the store does not pass [`CounterStore::validate`].
pub struct AllocatorBuilder<S, T, C> {
    store: Option<S>,
    biz: u8,
    time: T,
    calendar: C,
    ttl: TtlPolicy,
    window: YearWindow,
}

impl<S> AllocatorBuilder<S, SystemClock, UtcCalendar> {
    pub fn new() -> Self {
        Self {
            store: None,
            biz: 0,
            time: SystemClock,
            calendar: UtcCalendar,
            ttl: TtlPolicy::default(),
            window: YearWindow::default(),
        }
    }
}

impl<S> Default for AllocatorBuilder<S, SystemClock, UtcCalendar> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, T, C> AllocatorBuilder<S, T, C> {
    pub fn store(mut self, store: S) -> Self {
        self.store = Some(store);
        self
    }

    pub fn biz(mut self, biz: u8) -> Self {
        self.biz = biz;
        self
    }

    pub fn ttl(mut self, ttl: TtlPolicy) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn window(mut self, window: YearWindow) -> Self {
        self.window = window;
        self
    }

    pub fn time<T2>(self, time: T2) -> AllocatorBuilder<S, T2, C> {
        AllocatorBuilder {
            store: self.store,
            biz: self.biz,
            time,
            calendar: self.calendar,
            ttl: self.ttl,
            window: self.window,
        }
    }

    pub fn calendar<C2>(self, calendar: C2) -> AllocatorBuilder<S, T, C2> {
        AllocatorBuilder {
            store: self.store,
            biz: self.biz,
            time: self.time,
            calendar,
            ttl: self.ttl,
            window: self.window,
        }
    }
}

impl<S, T, C> AllocatorBuilder<S, T, C>
where
    S: CounterStore,
    T: TimeSource,
    C: Calendar,
{
    /// Validates the configuration and the store, then returns the allocator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no store was supplied, the biz tag is
    /// above [`MAX_BIZ`], the TTL base is zero, or the store fails
    /// validation.
    pub async fn build(self) -> Result<SequenceAllocator<S, T, C>> {
        let Some(store) = self.store else {
            return Err(Error::config("a counter store is required"));
        };
        if self.biz > MAX_BIZ {
            return Err(Error::config(format!(
                "biz tag {} exceeds {MAX_BIZ}",
                self.biz
            )));
        }
        if self.ttl.base == 0 {
            return Err(Error::config("counter TTL must be at least one second"));
        }
        store
            .validate()
            .await
            .map_err(|e| Error::config(format!("counter store unusable: {e}")))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(biz = self.biz, ttl = ?self.ttl, "sequence allocator ready");

        Ok(SequenceAllocator {
            store,
            biz: self.biz,
            time: self.time,
            calendar: self.calendar,
            ttl: self.ttl,
            decoder: Decoder::new(self.window),
            last_ts: AtomicU64::new(0),
        })
    }
}
