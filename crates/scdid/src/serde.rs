//! `#[serde(with = ...)]` helpers for [`ScdId`] fields.
//!
//! [`ScdId`] itself serializes transparently as a `u64`. Identifiers are
//! usually above 2^53, so JSON consumers that parse numbers as doubles lose
//! precision; [`as_string`] avoids that by using the decimal string form.
//!
//! [`ScdId`]: crate::ScdId

use core::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Error raised when a deserialized identifier fails plausibility checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImplausibleId(pub u64);

impl fmt::Display for ImplausibleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "identifier {} has an implausible timestamp", self.0)
    }
}

impl core::error::Error for ImplausibleId {}

fn checked(raw: u64) -> Result<crate::ScdId, ImplausibleId> {
    crate::decode(raw)
        .map(|fields| fields.to_id())
        .ok_or(ImplausibleId(raw))
}

pub mod as_native {
    use super::{Deserialize, Deserializer, Serialize, Serializer, checked, de};
    use crate::ScdId;

    /// Serialize an identifier as its native integer representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying serializer fails.
    pub fn serialize<S>(id: &ScdId, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        id.to_raw().serialize(s)
    }

    /// Deserialize an identifier from its native integer representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying deserializer fails or the timestamp
    /// is outside the default plausibility window.
    pub fn deserialize<'de, D>(d: D) -> Result<ScdId, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = u64::deserialize(d)?;
        checked(raw).map_err(de::Error::custom)
    }
}

pub mod as_string {
    use super::{Deserializer, Serializer, checked, de};
    use crate::ScdId;

    /// Serialize an identifier as a decimal string.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying serializer fails.
    pub fn serialize<S>(id: &ScdId, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.collect_str(id)
    }

    /// Deserialize an identifier from a decimal string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a `u64` or the timestamp is
    /// outside the default plausibility window.
    pub fn deserialize<'de, D>(d: D) -> Result<ScdId, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DecimalVisitor;

        impl de::Visitor<'_> for DecimalVisitor {
            type Value = ScdId;

            fn expecting(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
                formatter.write_str("a decimal identifier string")
            }

            #[inline]
            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let raw = v.parse::<u64>().map_err(E::custom)?;
                checked(raw).map_err(E::custom)
            }
        }

        d.deserialize_str(DecimalVisitor)
    }
}
