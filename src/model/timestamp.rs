use chrono::Duration;
use derive_more::{AsRef, Deref, From};
use derive_new::new;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

pub fn now() -> Timestamp {
    chrono::Utc::now().into()
}

/// A UTC instant, stored and transferred as an RFC 3339 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, new, From, Deref, AsRef)]
pub struct Timestamp(chrono::DateTime<chrono::Utc>);

impl Timestamp {
    pub fn parse(input: &str) -> Result<Self, chrono::ParseError> {
        chrono::DateTime::parse_from_rfc3339(input).map(|dt| Self(dt.into()))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}

impl std::str::FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.to_rfc3339().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        self.0 - rhs.0
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_utc_instant_from_offset_input() {
        let timestamp: Timestamp = "2024-03-01T01:30:00+07:00".parse().unwrap();
        assert_eq!(timestamp.to_string(), "2024-02-29T18:30:00+00:00");
    }

    #[test]
    fn serializes_as_rfc3339_string() {
        let timestamp = Timestamp::parse("2024-03-01T10:00:00Z").unwrap();
        let json = serde_json::to_value(timestamp).unwrap();
        assert_eq!(json, serde_json::json!("2024-03-01T10:00:00+00:00"));

        let back: Timestamp = serde_json::from_value(json).unwrap();
        assert_eq!(back, timestamp);
    }

    #[test]
    fn rejects_non_rfc3339_text() {
        let result = serde_json::from_value::<Timestamp>(serde_json::json!("yesterday"));
        assert!(result.is_err());
    }
}
