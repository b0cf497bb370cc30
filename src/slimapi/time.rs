//! The protocol's wire time format.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// The default wire pattern: `yyyy-MM-dd HH:mm:ss`.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The parse pattern, tolerating fractional seconds.
const TIME_FORMAT_NANO: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A timestamp in the protocol's wire format.
///
/// In responses this type renders as `yyyy-MM-dd HH:mm:ss`; plain
/// `chrono::DateTime` fields keep chrono's default RFC 3339 rendering. When
/// parsing, the wire pattern is tried first (interpreted as UTC), then the
/// general RFC 3339 format, which carries its own offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Time(pub DateTime<Utc>);

impl Time {
    #[must_use]
    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Time {
    fn from(v: DateTime<Utc>) -> Self {
        Time(v)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIME_FORMAT))
    }
}

impl FromStr for Time {
    type Err = chrono::ParseError;

    fn from_str(v: &str) -> Result<Self, Self::Err> {
        match NaiveDateTime::parse_from_str(v, TIME_FORMAT_NANO) {
            Ok(naive) => Ok(Time(naive.and_utc())),
            Err(primary) => match DateTime::parse_from_rfc3339(v) {
                Ok(t) => Ok(Time(t.with_timezone(&Utc))),
                // The error reported is the one from the wire pattern.
                Err(_) => Err(primary),
            },
        }
    }
}

impl Serialize for Time {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self)
    }
}

impl<'de> Deserialize<'de> for Time {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
