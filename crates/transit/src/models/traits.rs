//! Store traits for transit entities.
//!
//! These traits define the storage interface the engine, the index and the
//! schedule builder read from and write to. Implementations can be in-memory,
//! database-backed, or remote.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use chrono::Weekday;

use crate::identifiers::*;
use crate::models::types::*;

/// Coordinates of one stop, as returned by a bulk scan
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StopCoordinate {
    pub id: StopId,
    pub lat: f64,
    pub lon: f64,
}

/// Read access to scheduled arrivals, partitioned by stop
pub trait ArrivalStore: Send + Sync {
    /// Arrivals at `stop_id` that apply on `weekday`, ordered by scheduled time
    fn scheduled_arrivals<'a>(
        &'a self,
        stop_id: StopId,
        weekday: Weekday,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ScheduledArrival>>> + Send + 'a>>;
}

/// Read access to routes
pub trait RouteStore: Send + Sync {
    /// Fails with [`TransitError::RouteNotFound`] when the route is unknown
    fn route<'a>(
        &'a self,
        id: &'a RouteIdentifier,
    ) -> Pin<Box<dyn Future<Output = Result<Route>> + Send + 'a>>;
}

/// Read access to stops
pub trait StopStore: Send + Sync {
    /// Stops for the given ids; unknown ids are left out of the result
    fn stops<'a>(
        &'a self,
        ids: &'a [StopId],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Stop>>> + Send + 'a>>;

    /// Coordinates of every known stop
    fn stop_coordinates<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<StopCoordinate>>> + Send + 'a>>;
}

/// Write access used by the ingestion passes
pub trait ScheduleWriter: Send + Sync {
    /// Replace the complete scheduled-arrival set in one step.
    ///
    /// Stops missing from `arrivals` end up with an empty schedule.
    fn replace_schedule<'a>(
        &'a self,
        arrivals: BTreeMap<StopId, Vec<ScheduledArrival>>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    fn put_routes<'a>(
        &'a self,
        routes: Vec<Route>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Insert or overwrite stops by id
    fn put_stops<'a>(
        &'a self,
        stops: Vec<Stop>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}
