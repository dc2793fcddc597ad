use anyhow::{anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use scdid::{DEFAULT_MAX_BATCH, MAX_BIZ, MAX_TICK, TtlPolicy, YearWindow};

/// Command-line interface for the `scdid` binary.
///
/// Every option can also be supplied through the environment (or a `.env`
/// file in the working directory).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "scdid",
    version,
    about = "Allocate, decode and pack calendar-tagged 64-bit identifiers"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Allocate identifiers and print one per line.
    Next(NextArgs),
    /// Print the fields of one or more identifiers.
    Decode(DecodeArgs),
    /// Print the 8-byte packed form of one or more identifiers as hex.
    Pack(PackArgs),
}

#[derive(Args, Debug, Clone)]
pub struct NextArgs {
    /// Number of identifiers to print.
    ///
    /// Environment variable: `SCDID_COUNT`
    #[arg(short = 'n', long, env = "SCDID_COUNT", default_value_t = 1)]
    pub count: u64,

    /// Business/tenant tag stamped into every identifier (0-7).
    ///
    /// Environment variable: `SCDID_BIZ`
    #[arg(long, env = "SCDID_BIZ", default_value_t = 0)]
    pub biz: u8,

    /// Reference time (Unix seconds) whose year and month are stamped into
    /// the identifiers. `0` leaves biz, year and month zeroed.
    ///
    /// Environment variable: `SCDID_REF_TIME`
    #[arg(long, env = "SCDID_REF_TIME", default_value_t = 0)]
    pub ref_time: u64,

    /// Counter store backend. `memory` keeps counters in this process only,
    /// so identifiers are not coordinated with any other producer.
    ///
    /// Environment variable: `SCDID_STORE`
    #[arg(long, env = "SCDID_STORE", value_enum, default_value_t = StoreKind::Redis)]
    pub store: StoreKind,

    /// Redis server holding the shared counters. Required with
    /// `--store redis`.
    ///
    /// Example: "redis://127.0.0.1:6379/0"
    ///
    /// Environment variable: `REDIS_URL`
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Largest block reserved per round-trip once the proxy has warmed up.
    ///
    /// Environment variable: `SCDID_MAX_BATCH`
    #[arg(long, env = "SCDID_MAX_BATCH", default_value_t = DEFAULT_MAX_BATCH)]
    pub max_batch: u32,

    /// Base lifetime of a counter key, in seconds.
    ///
    /// Environment variable: `SCDID_TTL_BASE`
    #[arg(long, env = "SCDID_TTL_BASE", default_value_t = TtlPolicy::default().base)]
    pub ttl_base: u64,

    /// Extra lifetime per cascade step, in seconds.
    ///
    /// Environment variable: `SCDID_TTL_STEP`
    #[arg(long, env = "SCDID_TTL_STEP", default_value_t = TtlPolicy::default().step)]
    pub ttl_step: u64,

    /// Derive year and month in the host timezone instead of UTC.
    #[arg(long, env = "SCDID_LOCAL_CALENDAR", default_value_t = false)]
    pub local_calendar: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Redis,
    Memory,
}

#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
    /// Decimal identifiers.
    #[arg(required = true)]
    pub ids: Vec<u64>,

    /// Earliest plausible year of the timestamp field.
    ///
    /// Environment variable: `SCDID_MIN_YEAR`
    #[arg(long, env = "SCDID_MIN_YEAR", default_value_t = YearWindow::DEFAULT.min())]
    pub min_year: i32,

    /// Latest plausible year of the timestamp field.
    ///
    /// Environment variable: `SCDID_MAX_YEAR`
    #[arg(long, env = "SCDID_MAX_YEAR", default_value_t = YearWindow::DEFAULT.max())]
    pub max_year: i32,
}

#[derive(Args, Debug, Clone)]
pub struct PackArgs {
    /// Decimal identifiers.
    #[arg(required = true)]
    pub ids: Vec<u64>,
}

/// Where the counters live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Redis { url: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct NextConfig {
    pub count: u64,
    pub biz: u8,
    pub ref_time: u64,
    pub store: StoreConfig,
    pub max_batch: u32,
    pub ttl: TtlPolicy,
    pub local_calendar: bool,
}

impl TryFrom<NextArgs> for NextConfig {
    type Error = anyhow::Error;

    fn try_from(args: NextArgs) -> Result<Self, Self::Error> {
        if args.count == 0 {
            bail!("SCDID_COUNT must be greater than 0");
        }

        if args.biz > MAX_BIZ {
            bail!("SCDID_BIZ ({}) exceeds the 3-bit tag space (max = {MAX_BIZ})", args.biz);
        }

        if args.max_batch == 0 || u64::from(args.max_batch) >= MAX_TICK {
            bail!(
                "SCDID_MAX_BATCH ({}) must be between 1 and {}",
                args.max_batch,
                MAX_TICK - 1
            );
        }

        if args.ttl_base == 0 {
            bail!("SCDID_TTL_BASE must be greater than 0");
        }

        let store = match (args.store, args.redis_url) {
            (StoreKind::Redis, Some(url)) if !url.trim().is_empty() => {
                StoreConfig::Redis { url }
            }
            (StoreKind::Redis, _) => {
                bail!("REDIS_URL is required unless SCDID_STORE is set to memory")
            }
            (StoreKind::Memory, _) => StoreConfig::Memory,
        };

        Ok(Self {
            count: args.count,
            biz: args.biz,
            ref_time: args.ref_time,
            store,
            max_batch: args.max_batch,
            ttl: TtlPolicy {
                base: args.ttl_base,
                step: args.ttl_step,
            },
            local_calendar: args.local_calendar,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DecodeConfig {
    pub ids: Vec<u64>,
    pub window: YearWindow,
}

impl TryFrom<DecodeArgs> for DecodeConfig {
    type Error = anyhow::Error;

    fn try_from(args: DecodeArgs) -> Result<Self, Self::Error> {
        let window = YearWindow::new(args.min_year, args.max_year).ok_or_else(|| {
            anyhow!(
                "SCDID_MIN_YEAR ({}) is after SCDID_MAX_YEAR ({})",
                args.min_year,
                args.max_year
            )
        })?;

        Ok(Self {
            ids: args.ids,
            window,
        })
    }
}
