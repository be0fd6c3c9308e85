//! Movie runtime in minutes.
//!
//! On the wire a runtime is always the quoted string `"<n> mins"`, never a
//! bare number. In the database it is a plain `integer` column.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const INVALID_RUNTIME_FORMAT: &str = "invalid runtime format";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type)]
#[sqlx(transparent)]
pub struct Runtime(pub i32);

impl Runtime {
    pub fn minutes(self) -> i32 {
        self.0
    }

    /// Parse the wire form `"<n> mins"` (without the surrounding quotes)
    pub fn parse(raw: &str) -> Option<Self> {
        let (number, unit) = raw.split_once(' ')?;
        if unit != "mins" {
            return None;
        }
        number.parse::<i32>().ok().map(Runtime)
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mins", self.0)
    }
}

impl From<i32> for Runtime {
    fn from(minutes: i32) -> Self {
        Runtime(minutes)
    }
}

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct RuntimeVisitor;

impl<'de> Visitor<'de> for RuntimeVisitor {
    type Value = Runtime;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string of the form \"<n> mins\"")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Runtime, E> {
        Runtime::parse(value).ok_or_else(|| E::custom(INVALID_RUNTIME_FORMAT))
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(RuntimeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_quoted_mins() {
        let json = serde_json::to_string(&Runtime(142)).unwrap();
        assert_eq!(json, "\"142 mins\"");
    }

    #[test]
    fn test_wire_format_round_trip() {
        let runtime: Runtime = serde_json::from_str("\"142 mins\"").unwrap();
        assert_eq!(runtime, Runtime(142));
        let again: Runtime = serde_json::from_str(&serde_json::to_string(&runtime).unwrap()).unwrap();
        assert_eq!(again, runtime);
    }

    #[test]
    fn test_rejects_malformed_values() {
        for raw in ["\"142\"", "\"142 minutes\"", "\"abc mins\"", "\"142  mins\"", "\"mins\""] {
            let err = serde_json::from_str::<Runtime>(raw).unwrap_err();
            assert!(
                err.to_string().starts_with(INVALID_RUNTIME_FORMAT),
                "{raw} gave {err}"
            );
        }
    }

    #[test]
    fn test_rejects_bare_number() {
        let err = serde_json::from_str::<Runtime>("142").unwrap_err();
        assert!(err.to_string().starts_with("invalid type"));
    }
}
