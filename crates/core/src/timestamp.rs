use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::CoreError;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// The instant a record was observed, held in UTC.
///
/// Accepts RFC 3339 input, offset-less date-times (read as UTC) and bare
/// `YYYY-MM-DD` dates (midnight UTC). Always renders back as
/// `YYYY-MM-DDTHH:MM:SS.sssZ`, so the rendered strings order the same way the
/// instants do.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self(dt.with_timezone(&Utc)));
        }
        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(Self(naive.and_utc()));
            }
        }
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| CoreError::InvalidTimestamp(format!("{s}: {e}")))?;
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| CoreError::InvalidTimestamp(s.to_string()))?;
        Ok(Self(midnight.and_utc()))
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    pub fn epoch_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Calendar date portion, the unit date filters compare on.
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    pub fn to_iso(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Human-facing rendering used by tables and search.
    pub fn formatted(&self) -> String {
        self.0.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Normalize a date bound to a calendar date. Accepts `YYYY-MM-DD` or any
/// timestamp [`Timestamp::parse`] understands.
pub fn normalize_date(s: &str) -> Result<NaiveDate, CoreError> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    Timestamp::parse(s)
        .map(|ts| ts.date())
        .map_err(|_| CoreError::InvalidDate(s.to_string()))
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.to_iso())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s: String = Deserialize::deserialize(deserializer)?;
        Timestamp::parse(&s).map_err(serde::de::Error::custom)
    }
}
