use crate::{
    Allocate, BufferedProxy, DEFAULT_MAX_BATCH, Error, MemoryCounterStore, RETRY_DELAY, Result,
    ScdId, SequenceAllocator, TimeSource, TokioSleep, batch_size,
};
use parking_lot::Mutex;
use portable_atomic::{AtomicU32, Ordering};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::{Duration, Instant};

const NOW: u64 = 1_700_000_000;

/// Hands out blocks from a private counter, recording every request and
/// failing the first `failures` of them.
#[derive(Default)]
struct ScriptedAllocator {
    requests: Mutex<Vec<(u32, u64)>>,
    next_tick: Mutex<u64>,
    failures: AtomicU32,
}

impl ScriptedAllocator {
    fn failing(failures: u32) -> Self {
        Self {
            failures: AtomicU32::new(failures),
            ..Default::default()
        }
    }

    fn batch_sizes(&self) -> Vec<u32> {
        self.requests.lock().iter().map(|(n, _)| *n).collect()
    }
}

impl Allocate for ScriptedAllocator {
    async fn allocate(&self, n: u32, ts_ref: u64) -> Result<ScdId> {
        self.requests.lock().push((n, ts_ref));
        if self
            .failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |f| f.checked_sub(1))
            .is_ok()
        {
            return Err(Error::CapacityOverflow {
                start: NOW,
                attempts: 11,
            });
        }
        let mut tick = self.next_tick.lock();
        let first = *tick + 1;
        *tick += u64::from(n);
        Ok(ScdId::from_ts_tick(NOW, first))
    }
}

type Proxy<'a> = BufferedProxy<&'a ScriptedAllocator, TokioSleep>;

fn assert_retry_sleeps(start: Instant, sleeps: u32) {
    let elapsed = start.elapsed();
    let expected = RETRY_DELAY * sleeps;
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "slept {elapsed:?}, expected {expected:?}"
    );
}

#[test]
fn batch_schedule_warms_up_to_max() {
    assert_eq!(batch_size(1, DEFAULT_MAX_BATCH), 1);
    assert_eq!(batch_size(2, DEFAULT_MAX_BATCH), 50);
    assert_eq!(batch_size(3, DEFAULT_MAX_BATCH), 200);
    assert_eq!(batch_size(4, DEFAULT_MAX_BATCH), 1000);
    assert_eq!(batch_size(1_000_000, DEFAULT_MAX_BATCH), 1000);
}

#[test]
fn batch_schedule_respects_small_max() {
    assert_eq!(batch_size(1, 20), 1);
    assert_eq!(batch_size(2, 20), 20);
    assert_eq!(batch_size(3, 20), 20);
    assert_eq!(batch_size(9, 20), 20);
}

#[tokio::test]
async fn first_call_reserves_a_single_identifier() {
    let allocator = ScriptedAllocator::default();
    let mut proxy = Proxy::new(&allocator, 0);

    let id = proxy.next().await.unwrap();

    assert_eq!(id.tick(), 1);
    assert_eq!(allocator.batch_sizes(), vec![1]);
    assert_eq!(proxy.buffered(), 0);
}

#[tokio::test]
async fn six_calls_cost_two_round_trips() {
    let allocator = ScriptedAllocator::default();
    let mut proxy = Proxy::new(&allocator, 0);

    for _ in 0..6 {
        proxy.next().await.unwrap();
    }

    assert_eq!(allocator.batch_sizes(), vec![1, 50]);
    assert_eq!(proxy.buffered(), 45);
}

#[tokio::test]
async fn third_refill_serves_from_the_200_block() {
    let allocator = ScriptedAllocator::default();
    let mut proxy = Proxy::new(&allocator, 0);

    // 1 + 50 identifiers drain the first two blocks.
    for _ in 0..51 {
        proxy.next().await.unwrap();
    }
    assert_eq!(allocator.batch_sizes(), vec![1, 50]);

    proxy.next().await.unwrap();
    proxy.next().await.unwrap();

    assert_eq!(allocator.batch_sizes(), vec![1, 50, 200]);
    assert_eq!(proxy.buffered(), 198);
    assert_eq!(proxy.loads(), 3);
}

#[tokio::test]
async fn queued_identifiers_are_consecutive_and_in_order() {
    let allocator = ScriptedAllocator::default();
    let mut proxy = Proxy::new(&allocator, 0);

    let mut ticks = Vec::new();
    for _ in 0..300 {
        ticks.push(proxy.next().await.unwrap().tick());
    }

    let expected: Vec<u16> = (1..=300).collect();
    assert_eq!(ticks, expected);
}

#[tokio::test]
async fn reference_time_is_forwarded_to_every_allocation() {
    let allocator = ScriptedAllocator::default();
    let mut proxy = Proxy::new(&allocator, 1_577_836_800);

    for _ in 0..60 {
        proxy.next().await.unwrap();
    }

    assert_eq!(proxy.reference_time(), 1_577_836_800);
    assert!(
        allocator
            .requests
            .lock()
            .iter()
            .all(|(_, ts_ref)| *ts_ref == 1_577_836_800)
    );
}

#[tokio::test]
async fn warmed_up_proxy_uses_configured_max_batch() {
    let allocator = ScriptedAllocator::default();
    let mut proxy = Proxy::with_max_batch(&allocator, 0, 500).unwrap();

    for _ in 0..(1 + 50 + 200 + 1) {
        proxy.next().await.unwrap();
    }

    assert_eq!(allocator.batch_sizes(), vec![1, 50, 200, 500]);
    assert_eq!(proxy.max_batch(), 500);
}

#[test]
fn max_batch_must_fit_in_one_second() {
    let allocator = ScriptedAllocator::default();
    for max_batch in [0, 16_383, u32::MAX] {
        let err = Proxy::with_max_batch(&allocator, 0, max_batch)
            .err()
            .unwrap();
        assert!(err.is_config(), "{err:?}");
    }
    assert!(Proxy::with_max_batch(&allocator, 0, 16_382).is_ok());
}

#[tokio::test(start_paused = true)]
async fn recovers_after_two_failed_refills() {
    let allocator = ScriptedAllocator::failing(2);
    let mut proxy = Proxy::new(&allocator, 0);
    let start = Instant::now();

    let id = proxy.next().await.unwrap();

    assert_retry_sleeps(start, 2);
    assert_eq!(id.tick(), 1);
    // Failed refills still advance the schedule.
    assert_eq!(allocator.batch_sizes(), vec![1, 50, 200]);
    assert_eq!(proxy.buffered(), 199);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_three_failed_refills() {
    let allocator = ScriptedAllocator::failing(4);
    let mut proxy = Proxy::new(&allocator, 0);
    let start = Instant::now();

    let err = proxy.next().await.unwrap_err();

    // No sleep after the final attempt.
    assert_retry_sleeps(start, 2);
    match err {
        Error::Exhausted { attempts, source } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*source, Error::CapacityOverflow { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(allocator.batch_sizes(), vec![1, 50, 200]);

    // The fourth failure is consumed by the next call, which then recovers.
    let id = proxy.next().await.unwrap();
    assert_eq!(id.tick(), 1);
    assert_eq!(allocator.batch_sizes(), vec![1, 50, 200, 1000, 1000]);
}

#[tokio::test]
async fn proxies_sharing_an_allocator_never_collide() {
    struct FixedTime;
    impl TimeSource for FixedTime {
        fn current_secs(&self) -> u64 {
            NOW
        }
    }

    let allocator = Arc::new(
        SequenceAllocator::builder()
            .biz(4)
            .store(MemoryCounterStore::with_time(FixedTime))
            .time(FixedTime)
            .build()
            .await
            .unwrap(),
    );

    let mut proxies: Vec<BufferedProxy<_, TokioSleep>> = (0..4)
        .map(|_| BufferedProxy::new(Arc::clone(&allocator), 1_577_836_800))
        .collect();

    let mut seen = HashSet::new();
    for _ in 0..300 {
        for proxy in &mut proxies {
            let id = proxy.next().await.unwrap();
            assert_eq!(id.biz(), 4);
            assert_eq!(id.year(), 2020);
            assert!(seen.insert(id), "duplicate id {id:?}");
        }
    }
    assert_eq!(seen.len(), 1200);
}

#[cfg(feature = "async-smol")]
#[test]
fn smol_proxy_retries_on_the_smol_timer() {
    use crate::SmolBufferedProxy;

    smol::block_on(async {
        let allocator = ScriptedAllocator::failing(2);
        let mut proxy = SmolBufferedProxy::new(&allocator, 0);
        let start = std::time::Instant::now();

        let id = proxy.next().await.unwrap();

        assert!(start.elapsed() >= RETRY_DELAY * 2);
        assert_eq!(id.tick(), 1);
        assert_eq!(allocator.batch_sizes(), vec![1, 50, 200]);
    });
}

#[cfg(feature = "async-smol")]
#[test]
fn smol_proxy_gives_up_after_three_failed_refills() {
    use crate::SmolBufferedProxy;

    smol::block_on(async {
        let allocator = ScriptedAllocator::failing(3);
        let mut proxy = SmolBufferedProxy::new(&allocator, 0);

        let err = proxy.next().await.unwrap_err();
        assert!(matches!(err, Error::Exhausted { attempts: 3, .. }), "{err:?}");

        // The allocator has recovered; the next call succeeds.
        let id = proxy.next().await.unwrap();
        assert_eq!(id.tick(), 1);
        assert_eq!(allocator.batch_sizes(), vec![1, 50, 200, 1000]);
    });
}
