//! Wire timestamp handling.
//!
//! Snapshots carry a UTC timestamp with second precision, rendered exactly as
//! `YYYY-MM-DDTHH:MM:SSZ` (for example `2024-05-01T12:30:05Z`).

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::TimestampResult;

/// Format of the `timestamp` field in published payloads.
pub const WIRE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// Convert a timestamp to UTC and drop its sub-second part.
#[must_use]
pub fn truncate_to_utc_seconds(ts: OffsetDateTime) -> OffsetDateTime {
    let utc = ts.to_offset(UtcOffset::UTC);
    utc - Duration::nanoseconds(i64::from(utc.nanosecond()))
}

/// Render a timestamp in wire form.
///
/// The value is converted to UTC first; fractional seconds are dropped.
///
/// # Examples
///
/// ```
/// use bssidcast_types::timestamp::format_wire;
/// use time::macros::datetime;
///
/// let ts = datetime!(2024-05-01 14:30:05.750 +02:00);
/// assert_eq!(format_wire(ts).unwrap(), "2024-05-01T12:30:05Z");
/// ```
pub fn format_wire(ts: OffsetDateTime) -> TimestampResult<String> {
    Ok(truncate_to_utc_seconds(ts).format(WIRE_FORMAT)?)
}

/// Parse a wire-form timestamp back into a UTC `OffsetDateTime`.
pub fn parse_wire(s: &str) -> TimestampResult<OffsetDateTime> {
    Ok(PrimitiveDateTime::parse(s, WIRE_FORMAT)?.assume_utc())
}

/// Serde adapter for wire timestamps, for use with `#[serde(with = ...)]`.
#[cfg(feature = "serde")]
pub mod serde_wire {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(ts: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        let rendered = super::format_wire(*ts).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&rendered)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_wire(&raw).map_err(serde::de::Error::custom)
    }
}
