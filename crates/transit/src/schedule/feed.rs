//! Decoded feed tables handed to the schedule builder.
//!
//! Rows keep the feed's own identifiers. Translating them into system
//! identifiers is the builder's job, through [`RouteIdMapping`] and the
//! bundle's stop translation table.

use std::collections::HashMap;

use crate::identifiers::*;
use crate::models::calendar::ServiceCalendar;

/// One row of routes.txt
#[derive(Clone, Debug, PartialEq)]
pub struct FeedRoute {
    pub route_id: FeedRouteIdentifier,
    pub short_name: String,
    pub long_name: String,
    pub description: String,
    pub url: String,
    pub color: String,
}

/// One row of trips.txt
#[derive(Clone, Debug, PartialEq)]
pub struct FeedTrip {
    pub trip_id: TripIdentifier,
    pub route_id: FeedRouteIdentifier,
    pub service_id: ServiceIdentifier,
}

/// One row of stop_times.txt
#[derive(Clone, Debug, PartialEq)]
pub struct FeedStopTime {
    pub trip_id: TripIdentifier,
    /// Stop id in the feed's namespace
    pub stop_id: String,
    pub sequence: u32,
    /// Raw `H:MM:SS` arrival time, blank between timepoints
    pub arrival_time: String,
}

/// Everything one schedule build consumes
#[derive(Clone, Debug, Default)]
pub struct FeedBundle {
    pub routes: Vec<FeedRoute>,
    pub trips: Vec<FeedTrip>,
    pub calendar: Vec<ServiceCalendar>,
    pub stop_times: Vec<FeedStopTime>,
    /// Feed stop id to system stop number. Ids missing here are parsed as
    /// the stop number directly.
    pub stop_translation: HashMap<String, StopId>,
    /// Rows the decoder could not read at all
    pub rejected_rows: usize,
}

impl FeedBundle {
    /// System stop for a feed stop id served by `route`, if it names one.
    ///
    /// A route-qualified translation (`"{route}_{stop}"`) wins over the plain
    /// one, for shared platforms the operator numbers per route.
    pub fn translate_stop(&self, route: &RouteIdentifier, feed_stop_id: &str) -> Option<StopId> {
        self.stop_translation
            .get(&format!("{route}_{feed_stop_id}"))
            .or_else(|| self.stop_translation.get(feed_stop_id))
            .copied()
            .or_else(|| feed_stop_id.trim().parse().ok())
    }
}

/// Bidirectional mapping between feed and system route identifiers
#[derive(Clone, Debug, Default)]
pub struct RouteIdMapping {
    to_system: HashMap<FeedRouteIdentifier, RouteIdentifier>,
    to_feed: HashMap<RouteIdentifier, FeedRouteIdentifier>,
}

impl RouteIdMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair, replacing any earlier pairing of either side
    pub fn insert(&mut self, feed: FeedRouteIdentifier, system: RouteIdentifier) {
        if let Some(old_system) = self.to_system.insert(feed.clone(), system.clone()) {
            self.to_feed.remove(&old_system);
        }
        if let Some(old_feed) = self.to_feed.insert(system, feed) {
            self.to_system.remove(&old_feed);
        }
    }

    pub fn to_system(&self, feed: &FeedRouteIdentifier) -> Option<&RouteIdentifier> {
        self.to_system.get(feed)
    }

    pub fn to_feed(&self, system: &RouteIdentifier) -> Option<&FeedRouteIdentifier> {
        self.to_feed.get(system)
    }

    /// Every mapped system route
    pub fn system_routes(&self) -> impl Iterator<Item = &RouteIdentifier> + '_ {
        self.to_feed.keys()
    }

    pub fn len(&self) -> usize {
        self.to_system.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_system.is_empty()
    }
}

impl<F, S> FromIterator<(F, S)> for RouteIdMapping
where
    F: Into<FeedRouteIdentifier>,
    S: Into<RouteIdentifier>,
{
    fn from_iter<I: IntoIterator<Item = (F, S)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (feed, system) in iter {
            mapping.insert(feed.into(), system.into());
        }
        mapping
    }
}
