use crate::config::{DecodeConfig, NextConfig, StoreConfig};
use anyhow::{Context, anyhow};
use scdid::{
    BufferedProxy, Calendar, CounterStore, Decoder, LocalCalendar, MemoryCounterStore,
    RedisCounterStore, ScdId, SequenceAllocator, TokioSleep, UtcCalendar,
};
use std::io::Write;

/// Allocates `config.count` identifiers through a buffered proxy and writes
/// them to `out`, one per line.
pub async fn run_next(config: &NextConfig, out: &mut impl Write) -> anyhow::Result<()> {
    match &config.store {
        StoreConfig::Redis { url } => {
            let store = RedisCounterStore::connect(url)
                .await
                .map_err(|e| anyhow!(e).context(format!("connecting to {url}")))?;
            with_calendar(store, config, out).await
        }
        StoreConfig::Memory => {
            tracing::warn!("in-process counter store, identifiers are only unique within this run");
            with_calendar(MemoryCounterStore::new(), config, out).await
        }
    }
}

async fn with_calendar<S>(
    store: S,
    config: &NextConfig,
    out: &mut impl Write,
) -> anyhow::Result<()>
where
    S: CounterStore + Send + Sync,
{
    if config.local_calendar {
        emit(store, LocalCalendar, config, out).await
    } else {
        emit(store, UtcCalendar, config, out).await
    }
}

async fn emit<S, C>(
    store: S,
    calendar: C,
    config: &NextConfig,
    out: &mut impl Write,
) -> anyhow::Result<()>
where
    S: CounterStore + Send + Sync,
    C: Calendar + Send + Sync,
{
    let allocator = SequenceAllocator::builder()
        .store(store)
        .biz(config.biz)
        .ttl(config.ttl)
        .calendar(calendar)
        .build()
        .await?;

    let mut proxy = BufferedProxy::<_, TokioSleep>::with_max_batch(
        &allocator,
        config.ref_time,
        config.max_batch,
    )?;

    for _ in 0..config.count {
        let id = proxy.next().await?;
        writeln!(out, "{id}")?;
    }
    out.flush()?;

    tracing::info!(
        count = config.count,
        loads = proxy.loads(),
        wasted = proxy.buffered(),
        "identifiers allocated"
    );
    Ok(())
}

/// Writes the fields of every identifier in `config.ids` to `out`.
///
/// Implausible identifiers are reported on their own line; the command fails
/// once all of them have been printed.
pub fn run_decode(config: &DecodeConfig, out: &mut impl Write) -> anyhow::Result<()> {
    let decoder = Decoder::new(config.window);
    let mut rejected = 0usize;

    for &raw in &config.ids {
        match decoder.decode(raw) {
            Some(f) => writeln!(
                out,
                "{raw} ts={} biz={} year={} month={} tick={}",
                f.ts, f.biz, f.year, f.month, f.tick
            )?,
            None => {
                rejected += 1;
                writeln!(out, "{raw} invalid")?;
            }
        }
    }
    out.flush()?;

    if rejected > 0 {
        anyhow::bail!(
            "{rejected} identifier(s) outside {}..={}",
            config.window.min(),
            config.window.max()
        );
    }
    Ok(())
}

/// Writes the packed form of every identifier in `ids` to `out` as lowercase
/// hex.
pub fn run_pack(ids: &[u64], out: &mut impl Write) -> anyhow::Result<()> {
    for &raw in ids {
        let hex: String = ScdId::from_raw(raw)
            .pack()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        writeln!(out, "{raw} {hex}").context("writing packed identifier")?;
    }
    out.flush()?;
    Ok(())
}
