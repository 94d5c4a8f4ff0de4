//! Core data types and enums for transit data.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use geo::Point;

use crate::identifiers::*;
use crate::models::calendar::WeekdayFlags;

// ============================================================================
// Enums
// ============================================================================

/// Whether a scheduled time was published by the operator or derived
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArrivalKind {
    /// Published in the feed
    Timepoint,
    /// Linearly interpolated between two timepoints
    Interpolated,
}

// ============================================================================
// Data Structures
// ============================================================================

/// A physical boarding location
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stop {
    pub id: StopId,
    pub name: Arc<str>,
    pub lat: f64,
    pub lon: f64,
    pub road: Arc<str>,
    /// Compass bearing of travel at the stop, in degrees
    pub bearing: f64,
    /// Operator checks schedule adherence here
    pub adherence_point: bool,
}

impl Stop {
    /// Position as a geo point (x = longitude, y = latitude)
    pub fn location(&self) -> Point {
        Point::new(self.lon, self.lat)
    }
}

/// A transit route and its display metadata
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    pub id: RouteIdentifier,
    /// Display name, usually the route number
    pub name: Arc<str>,
    pub additional_name: Arc<str>,
    pub direction: Arc<str>,
    /// Encoded display polyline
    pub polyline: Arc<str>,
    /// Hex RGB, e.g. "00ADEE"
    pub color: Arc<str>,
    pub description: Arc<str>,
    pub url: Arc<str>,
    /// Stops along the route in travel order
    pub stops: Vec<StopId>,
    /// Validity window from the service calendar
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl Route {
    pub fn new(id: RouteIdentifier) -> Self {
        Self {
            name: id.as_str().into(),
            id,
            additional_name: "".into(),
            direction: "".into(),
            polyline: "".into(),
            color: "".into(),
            description: "".into(),
            url: "".into(),
            stops: Vec::new(),
            start: None,
            end: None,
        }
    }
}

/// One scheduled visit of a route at a stop
///
/// Times are stored as seconds since midnight of the service day.
/// Per GTFS, times can exceed 24 hours for trips past midnight
/// (e.g., 25:30:00 = 91800 seconds for 1:30am the next day).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduledArrival {
    pub stop_id: StopId,
    pub route_id: RouteIdentifier,
    pub scheduled: u32,
    pub weekdays: WeekdayFlags,
    pub kind: ArrivalKind,
}

/// Raw prediction as reported by the live feed: time until arrival
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveEstimate {
    pub route_id: RouteIdentifier,
    pub eta: Duration,
}

/// A live prediction projected onto the service day
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RealtimeEstimate {
    pub route_id: RouteIdentifier,
    /// Seconds since local midnight of the target day, negative when the
    /// bus is due before that midnight
    pub predicted: i64,
}

/// Reconciled arrival returned to callers
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Arrival {
    pub route: Arc<str>,
    pub scheduled: DateTime<Tz>,
    pub expected: DateTime<Tz>,
}

/// Stop returned from a radius query
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NearbyStop {
    pub stop: Stop,
    /// Great-circle distance to the query point, in meters
    pub distance: f64,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransitError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Route not found: {0}")]
    RouteNotFound(RouteIdentifier),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, TransitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_defaults_name_to_id() {
        let route = Route::new(RouteIdentifier::new("BBSE"));
        assert_eq!(&*route.name, "BBSE");
        assert!(route.stops.is_empty());
        assert!(route.start.is_none());
    }

    #[test]
    fn test_stop_location_is_lon_lat() {
        let stop = Stop {
            id: StopId(13309),
            name: "Downtown Transit Center".into(),
            lat: 44.5646,
            lon: -123.2620,
            road: "NW Monroe Ave".into(),
            bearing: 90.0,
            adherence_point: true,
        };
        assert_eq!(stop.location().x(), -123.2620);
        assert_eq!(stop.location().y(), 44.5646);
    }

    #[test]
    fn test_error_messages() {
        let err = TransitError::RouteNotFound(RouteIdentifier::new("BBN"));
        assert_eq!(err.to_string(), "Route not found: BBN");
        let err = TransitError::Upstream("live feed unreachable".into());
        assert_eq!(err.to_string(), "Upstream unavailable: live feed unreachable");
    }
}
