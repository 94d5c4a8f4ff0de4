//! Type-safe, efficient identifiers for transit entities.
//!
//! String identifiers use Arc<str> for cheap cloning and minimal memory overhead.
//! Stops are numbered by the operator, so [`StopId`] wraps an integer instead.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use crate::models::types::TransitError;

macro_rules! impl_identifier {
    ($name:ident) => {
        #[derive(Clone, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(s: impl AsRef<str>) -> Self {
                Self(s.as_ref().into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
            }
        }

        impl Eq for $name {}

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                self.0.cmp(&other.0)
            }
        }

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.hash(state);
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

// System route identifier (the operator's route number, e.g. "1", "BBN")
impl_identifier!(RouteIdentifier);
// Route identifier in the published feed's namespace (e.g. "R1", "BB_N")
impl_identifier!(FeedRouteIdentifier);
impl_identifier!(TripIdentifier);
impl_identifier!(ServiceIdentifier);

/// Operator stop number. Partition key for scheduled arrivals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct StopId(pub i64);

impl StopId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for StopId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for StopId {
    type Err = TransitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(StopId)
            .map_err(|_| TransitError::InvalidInput(format!("malformed stop id {s:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_equality() {
        let id1 = RouteIdentifier::new("BBN");
        let id2 = RouteIdentifier::new("BBN");
        let id3 = id1.clone();

        assert_eq!(id1, id2);
        assert_eq!(id1, id3);
        assert!(Arc::ptr_eq(&id1.0, &id3.0)); // Clone shares Arc
    }

    #[test]
    fn test_identifier_hash() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(FeedRouteIdentifier::new("R1"), 42);

        assert_eq!(map.get(&FeedRouteIdentifier::new("R1")), Some(&42));
    }

    #[test]
    fn test_identifier_display() {
        let id = RouteIdentifier::new("C3");
        assert_eq!(format!("{}", id), "C3");
        assert_eq!(StopId::new(10234).to_string(), "10234");
    }

    #[test]
    fn test_stop_id_parse() {
        assert_eq!(" 14244 ".parse::<StopId>().unwrap(), StopId(14244));
        assert!(matches!(
            "14a".parse::<StopId>(),
            Err(TransitError::InvalidInput(_))
        ));
        assert!("".parse::<StopId>().is_err());
    }
}
