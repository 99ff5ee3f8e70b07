//! Wall-clock timestamps as used by the sync protocol.
//!
//! Clients send and receive RFC 3339 strings on the wire; the server stores
//! and compares them as millisecond-resolution integers internally (the
//! LWW key). [`SyncTimestamp`] is the bridge between the two
//! representations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

use crate::error::{CoreError, Result};

/// A client-supplied wall-clock timestamp, stored as milliseconds since the
/// Unix epoch. Ordering and equality are defined on the millisecond value,
/// which is what LWW comparisons and cursor pagination key off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncTimestamp(pub i64);

impl SyncTimestamp {
    pub const EPOCH: SyncTimestamp = SyncTimestamp(0);

    pub fn millis(&self) -> i64 {
        self.0
    }

    pub fn to_offset_date_time(self) -> Result<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(self.0 as i128 * 1_000_000)
            .map_err(|e| CoreError::InvalidTimestamp(format!("{e}")))
    }

    pub fn from_offset_date_time(dt: OffsetDateTime) -> Self {
        Self(dt.unix_timestamp_nanos() / 1_000_000)
    }

    pub fn now() -> Self {
        Self::from_offset_date_time(OffsetDateTime::now_utc())
    }
}

impl fmt::Display for SyncTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dt = self
            .to_offset_date_time()
            .map_err(|_| fmt::Error)?;
        let formatted = dt
            .format(&time::format_description::well_known::Rfc3339)
            .map_err(|_| fmt::Error)?;
        write!(f, "{formatted}")
    }
}

impl FromStr for SyncTimestamp {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let dt = OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339)
            .map_err(|e| CoreError::InvalidTimestamp(format!("failed to parse '{s}': {e}")))?;
        Ok(Self::from_offset_date_time(dt))
    }
}

impl Serialize for SyncTimestamp {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SyncTimestamp {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SyncTimestamp::from_str(&s).map_err(serde::de::Error::custom)
    }
}

pub fn now_ms() -> i64 {
    SyncTimestamp::now().millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_rfc3339() {
        let s = "2025-11-03T10:00:00Z";
        let ts = SyncTimestamp::from_str(s).unwrap();
        assert_eq!(ts.to_string(), s);
    }

    #[test]
    fn millis_preserved_through_parse() {
        let ts = SyncTimestamp::from_str("2025-11-03T10:00:00.500Z").unwrap();
        assert_eq!(ts.millis() % 1000, 500);
    }

    #[test]
    fn ordering_matches_millis() {
        let a = SyncTimestamp(100);
        let b = SyncTimestamp(200);
        assert!(a < b);
    }

    #[test]
    fn serde_roundtrip() {
        let ts = SyncTimestamp::from_str("2025-01-01T00:00:00Z").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        let back: SyncTimestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, back);
    }

    #[test]
    fn invalid_timestamp_errors() {
        assert!(SyncTimestamp::from_str("not-a-date").is_err());
    }

    #[test]
    fn epoch_is_less_than_any_real_timestamp() {
        let ts = SyncTimestamp::from_str("1970-01-01T00:00:01Z").unwrap();
        assert!(SyncTimestamp::EPOCH < ts);
    }
}
