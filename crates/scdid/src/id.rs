use chrono::{DateTime, Datelike};
use core::fmt;

/// Largest value the tick field can hold. Ticks are always strictly below it:
/// a counter value that reaches `MAX_TICK` pushes allocation into the next
/// second.
pub const MAX_TICK: u64 = ScdId::TICK_MASK;

/// Size in bytes of a packed identifier.
pub const PACKED_LEN: usize = 8;

/// A 64-bit calendar-tagged identifier.
///
/// - 32 bits timestamp (seconds since the Unix epoch, producer wall clock)
/// - 3 bits business/tenant tag
/// - 11 bits calendar year of the reference time
/// - 4 bits calendar month (1-12) of the reference time
/// - 14 bits per-second tick
///
/// ```text
///  Bit Index:  63           32 31  29 28      18 17     14 13        0
///              +--------------+------+----------+---------+-----------+
///  Field:      |   ts (32)    |biz(3)| year (11)|month (4)| tick (14) |
///              +--------------+------+----------+---------+-----------+
///              |<---------------- MSB --- 64 bits --- LSB ----------->|
/// ```
///
/// Identifiers allocated without a reference time leave `biz`, `year` and
/// `month` zeroed.
///
/// # Example
///
/// ```
/// use scdid::ScdId;
///
/// let id = ScdId::from_parts(1_700_000_000, 3, 2020, 1, 1);
/// assert_eq!(id.timestamp(), 1_700_000_000);
/// assert_eq!(id.biz(), 3);
/// assert_eq!(id.year(), 2020);
/// assert_eq!(id.month(), 1);
/// assert_eq!(id.tick(), 1);
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ScdId {
    id: u64,
}

impl ScdId {
    /// Bitmask for the 32-bit timestamp field. Occupies bits 32 through 63.
    pub const TIMESTAMP_MASK: u64 = (1 << 32) - 1;

    /// Bitmask for the 3-bit biz field. Occupies bits 29 through 31.
    pub const BIZ_MASK: u64 = (1 << 3) - 1;

    /// Bitmask for the 11-bit year field. Occupies bits 18 through 28.
    pub const YEAR_MASK: u64 = (1 << 11) - 1;

    /// Bitmask for the 4-bit month field. Occupies bits 14 through 17.
    pub const MONTH_MASK: u64 = (1 << 4) - 1;

    /// Bitmask for the 14-bit tick field. Occupies bits 0 through 13.
    pub const TICK_MASK: u64 = (1 << 14) - 1;

    pub const TIMESTAMP_SHIFT: u64 = 32;
    pub const BIZ_SHIFT: u64 = 29;
    pub const YEAR_SHIFT: u64 = 18;
    pub const MONTH_SHIFT: u64 = 14;
    pub const TICK_SHIFT: u64 = 0;

    /// Builds an identifier from its fields. Values wider than their field are
    /// truncated to the field width.
    pub const fn from_parts(ts: u64, biz: u64, year: u64, month: u64, tick: u64) -> Self {
        Self {
            id: ((ts & Self::TIMESTAMP_MASK) << Self::TIMESTAMP_SHIFT)
                | ((biz & Self::BIZ_MASK) << Self::BIZ_SHIFT)
                | ((year & Self::YEAR_MASK) << Self::YEAR_SHIFT)
                | ((month & Self::MONTH_MASK) << Self::MONTH_SHIFT)
                | ((tick & Self::TICK_MASK) << Self::TICK_SHIFT),
        }
    }

    /// Builds an identifier carrying only a timestamp and tick.
    pub const fn from_ts_tick(ts: u64, tick: u64) -> Self {
        Self::from_parts(ts, 0, 0, 0, tick)
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self { id: raw }
    }

    pub const fn to_raw(&self) -> u64 {
        self.id
    }

    /// Extracts the allocation second.
    pub const fn timestamp(&self) -> u32 {
        ((self.id >> Self::TIMESTAMP_SHIFT) & Self::TIMESTAMP_MASK) as u32
    }

    /// Extracts the business/tenant tag.
    pub const fn biz(&self) -> u8 {
        ((self.id >> Self::BIZ_SHIFT) & Self::BIZ_MASK) as u8
    }

    /// Extracts the calendar year of the reference time.
    pub const fn year(&self) -> u16 {
        ((self.id >> Self::YEAR_SHIFT) & Self::YEAR_MASK) as u16
    }

    /// Extracts the calendar month of the reference time.
    pub const fn month(&self) -> u8 {
        ((self.id >> Self::MONTH_SHIFT) & Self::MONTH_MASK) as u8
    }

    /// Extracts the per-second tick.
    pub const fn tick(&self) -> u16 {
        ((self.id >> Self::TICK_SHIFT) & Self::TICK_MASK) as u16
    }

    /// Returns the identifier `n` positions after this one.
    ///
    /// Only meaningful inside a block reserved by a single allocation, where
    /// consecutive integers are consecutive ticks of the same second.
    pub const fn offset(&self, n: u64) -> Self {
        Self {
            id: self.id.wrapping_add(n),
        }
    }

    /// Splits the identifier into its five fields.
    pub const fn fields(&self) -> Fields {
        Fields {
            ts: self.timestamp(),
            biz: self.biz(),
            year: self.year(),
            month: self.month(),
            tick: self.tick(),
        }
    }

    /// Emits the identifier as two little-endian 32-bit words: the timestamp,
    /// then the remaining 32 bits.
    pub fn pack(&self) -> [u8; PACKED_LEN] {
        let mut buf = [0u8; PACKED_LEN];
        buf[..4].copy_from_slice(&self.timestamp().to_le_bytes());
        buf[4..].copy_from_slice(&(self.id as u32).to_le_bytes());
        buf
    }

    /// Rebuilds an identifier from the output of [`ScdId::pack`].
    pub fn unpack(buf: [u8; PACKED_LEN]) -> Self {
        let ts = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let low = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        Self {
            id: (u64::from(ts) << Self::TIMESTAMP_SHIFT) | u64::from(low),
        }
    }

    /// Returns the ID as a zero-padded 20-digit string.
    pub fn to_padded_string(&self) -> String {
        format!("{:020}", self.id)
    }
}

impl From<ScdId> for u64 {
    fn from(id: ScdId) -> Self {
        id.to_raw()
    }
}

impl From<u64> for ScdId {
    fn from(raw: u64) -> Self {
        Self::from_raw(raw)
    }
}

impl fmt::Display for ScdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl fmt::Debug for ScdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScdId")
            .field("raw", &format_args!("0x{:016x}", self.id))
            .field("ts", &self.timestamp())
            .field("biz", &self.biz())
            .field("year", &self.year())
            .field("month", &self.month())
            .field("tick", &self.tick())
            .finish()
    }
}

/// The five fields of an [`ScdId`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fields {
    pub ts: u32,
    pub biz: u8,
    pub year: u16,
    pub month: u8,
    pub tick: u16,
}

impl Fields {
    pub const fn to_id(&self) -> ScdId {
        ScdId::from_parts(
            self.ts as u64,
            self.biz as u64,
            self.year as u64,
            self.month as u64,
            self.tick as u64,
        )
    }
}

/// Packs raw fields into the 8-byte wire form.
///
/// Equivalent to `ScdId::from_parts(..).pack()`.
pub fn pack(ts: u32, biz: u8, year: u16, month: u8, tick: u16) -> [u8; PACKED_LEN] {
    ScdId::from_parts(
        u64::from(ts),
        u64::from(biz),
        u64::from(year),
        u64::from(month),
        u64::from(tick),
    )
    .pack()
}

/// Inclusive range of calendar years a decoded timestamp may fall into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct YearWindow {
    min: i32,
    max: i32,
}

impl YearWindow {
    /// `[1970, 2100]`: covers every second the 32-bit timestamp can carry in
    /// practice.
    pub const DEFAULT: Self = Self {
        min: 1970,
        max: 2100,
    };

    /// `[1970, 2010]`, the window older producers validated against. It
    /// rejects every identifier generated after 2010.
    pub const LEGACY: Self = Self {
        min: 1970,
        max: 2010,
    };

    /// Returns `None` if `min > max`.
    pub const fn new(min: i32, max: i32) -> Option<Self> {
        if min > max {
            None
        } else {
            Some(Self { min, max })
        }
    }

    pub const fn min(&self) -> i32 {
        self.min
    }

    pub const fn max(&self) -> i32 {
        self.max
    }

    pub const fn contains(&self, year: i32) -> bool {
        year >= self.min && year <= self.max
    }
}

impl Default for YearWindow {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Recovers fields from raw identifiers and rejects implausible ones.
///
/// An identifier is plausible when the UTC year of its timestamp lies inside
/// the configured [`YearWindow`]. No other field is checked, so identifiers
/// allocated without a reference time (zero year and month) decode fine.
///
/// ```
/// use scdid::{Decoder, ScdId};
///
/// let id = ScdId::from_parts(1_700_000_000, 3, 2020, 1, 1);
/// let fields = Decoder::default().decode(id.to_raw()).unwrap();
/// assert_eq!(fields.year, 2020);
///
/// assert!(Decoder::default().decode(u64::MAX).is_none());
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Decoder {
    window: YearWindow,
}

impl Decoder {
    pub const fn new(window: YearWindow) -> Self {
        Self { window }
    }

    pub const fn window(&self) -> YearWindow {
        self.window
    }

    /// Extracts the fields of `raw`, or `None` if its timestamp falls outside
    /// the plausibility window.
    pub fn decode(&self, raw: u64) -> Option<Fields> {
        let id = ScdId::from_raw(raw);
        let year = DateTime::from_timestamp(i64::from(id.timestamp()), 0)?.year();
        self.window.contains(year).then(|| id.fields())
    }

    /// Decodes the output of [`pack`].
    pub fn decode_packed(&self, buf: [u8; PACKED_LEN]) -> Option<Fields> {
        self.decode(ScdId::unpack(buf).to_raw())
    }
}

/// Decodes `raw` with the default `[1970, 2100]` window.
pub fn decode(raw: u64) -> Option<Fields> {
    Decoder::default().decode(raw)
}
