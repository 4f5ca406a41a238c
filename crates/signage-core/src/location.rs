//! Location identifiers.
//!
//! A location is a physical display site and the unit of broadcast isolation.
//! On the wire it is a plain integer (`"locationId": 3`), but clients built
//! on loosely typed stacks sometimes send `"3"`; both are accepted.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a physical display location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LocationId(i64);

impl LocationId {
    /// Create a location id.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw integer value.
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Extract a location from a connection query string.
    ///
    /// Looks for `locationId` first, then `location`. Values that don't parse
    /// as integers are ignored.
    pub fn from_query(query: &str) -> Option<Self> {
        let pairs: Vec<(&str, &str)> = query
            .trim_start_matches('?')
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .collect();

        ["locationId", "location"].iter().find_map(|key| {
            pairs
                .iter()
                .filter(|(k, _)| k == key)
                .find_map(|(_, v)| v.parse().ok())
        })
    }
}

impl From<i64> for LocationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocationId {
    type Err = LocationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(LocationParseError::Empty);
        }
        trimmed
            .parse()
            .map(Self)
            .map_err(|_| LocationParseError::NotAnInteger(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for LocationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        crate::de::int(deserializer).map(Self)
    }
}

/// Error parsing a location id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationParseError {
    #[error("location id cannot be empty")]
    Empty,
    #[error("location id must be an integer, got: {0}")]
    NotAnInteger(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain() {
        let id: LocationId = "42".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!("".parse::<LocationId>(), Err(LocationParseError::Empty));
        assert!(matches!(
            "lobby".parse::<LocationId>(),
            Err(LocationParseError::NotAnInteger(_))
        ));
    }

    #[test]
    fn query_prefers_location_id() {
        assert_eq!(
            LocationId::from_query("location=1&locationId=2"),
            Some(LocationId::new(2))
        );
        assert_eq!(LocationId::from_query("?location=7"), Some(LocationId::new(7)));
    }

    #[test]
    fn query_ignores_unparseable() {
        assert_eq!(LocationId::from_query("locationId=abc"), None);
        assert_eq!(
            LocationId::from_query("locationId=abc&location=5"),
            Some(LocationId::new(5))
        );
        assert_eq!(LocationId::from_query(""), None);
    }

    #[test]
    fn deserialize_number_or_string() {
        let a: LocationId = serde_json::from_str("3").unwrap();
        let b: LocationId = serde_json::from_str("\"3\"").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<LocationId>("\"x\"").is_err());
    }
}
