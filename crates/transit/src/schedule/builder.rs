//! Turns decoded feed tables into per-stop scheduled arrivals.
//!
//! The build is computed entirely in memory by [`build_schedule`] and only
//! then written by [`rebuild_schedule`], replacing the previous schedule in
//! one step. Running it twice over the same feed yields the same arrivals.
//!
//! Feed trips publish exact times only at some stops (timepoints). The first
//! and last stop of a trip are always timepoints; stops in between without a
//! time get one by linear interpolation between the surrounding timepoints.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use tracing::{debug, info, warn};

use crate::identifiers::*;
use crate::models::calendar::ServiceCalendar;
use crate::models::traits::{RouteStore, ScheduleWriter, StopStore};
use crate::models::types::*;
use crate::network::traits::FeedSource;
use crate::schedule::feed::{FeedBundle, RouteIdMapping};
use crate::time::parse_time_of_day;

// ============================================================================
// Reporting
// ============================================================================

/// Rows and trips left out of a build, by reason
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SkipCounts {
    /// Trips whose feed route has no system route
    pub unmapped_route: usize,
    /// Stop time rows naming a trip that was not kept
    pub unknown_trip: usize,
    /// Trips whose service is missing from the calendar
    pub unknown_service: usize,
    /// Stop times at a stop the system does not know
    pub unknown_stop: usize,
    /// Stop time rows with an unreadable arrival time
    pub malformed_row: usize,
    /// Trips without a time at their first or last stop
    pub missing_timepoint: usize,
    /// Rows the feed decoder already rejected
    pub rejected_row: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.unmapped_route
            + self.unknown_trip
            + self.unknown_service
            + self.unknown_stop
            + self.malformed_row
            + self.missing_timepoint
            + self.rejected_row
    }
}

/// Summary of one schedule build
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IngestReport {
    pub trips: usize,
    pub arrivals: usize,
    pub interpolated: usize,
    pub routes: usize,
    pub skipped: SkipCounts,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} trips, {} arrivals ({} interpolated), {} routes, {} skipped",
            self.trips,
            self.arrivals,
            self.interpolated,
            self.routes,
            self.skipped.total()
        )
    }
}

/// Output of [`build_schedule`], not yet written anywhere
#[derive(Clone, Debug, Default)]
pub struct BuiltSchedule {
    pub arrivals: BTreeMap<StopId, Vec<ScheduledArrival>>,
    pub routes: Vec<Route>,
    pub report: IngestReport,
}

// ============================================================================
// Build
// ============================================================================

struct TripRow<'a> {
    sequence: u32,
    stop_id: &'a str,
    arrival: Option<u32>,
}

/// Compute the complete schedule for `bundle`.
///
/// `known_stops` is the system stop set; arrivals at any other stop are
/// skipped. `routes` holds the current records of mapped routes, which get
/// their metadata, path and validity window refreshed.
pub fn build_schedule(
    bundle: &FeedBundle,
    mapping: &RouteIdMapping,
    known_stops: &HashSet<StopId>,
    mut routes: BTreeMap<RouteIdentifier, Route>,
) -> BuiltSchedule {
    let mut report = IngestReport::default();
    report.skipped.rejected_row = bundle.rejected_rows;

    let calendars: HashMap<&ServiceIdentifier, &ServiceCalendar> = bundle
        .calendar
        .iter()
        .map(|calendar| (&calendar.service_id, calendar))
        .collect();

    let mut touched: HashSet<RouteIdentifier> = HashSet::new();

    for row in &bundle.routes {
        let Some(system_id) = mapping.to_system(&row.route_id) else {
            debug!(route = %row.route_id, "feed route has no system route");
            continue;
        };

        let route = routes
            .entry(system_id.clone())
            .or_insert_with(|| Route::new(system_id.clone()));
        route.additional_name = row.long_name.as_str().into();
        route.description = row.description.as_str().into();
        route.url = row.url.as_str().into();
        route.color = row.color.as_str().into();
        touched.insert(system_id.clone());
    }

    let mut trips: HashMap<&TripIdentifier, (&RouteIdentifier, &ServiceIdentifier)> = HashMap::new();
    for trip in &bundle.trips {
        match mapping.to_system(&trip.route_id) {
            Some(system_id) => {
                trips.insert(&trip.trip_id, (system_id, &trip.service_id));
            }
            None => report.skipped.unmapped_route += 1,
        }
    }

    let mut rows_by_trip: BTreeMap<&TripIdentifier, Vec<TripRow>> = BTreeMap::new();
    for row in &bundle.stop_times {
        if !trips.contains_key(&row.trip_id) {
            report.skipped.unknown_trip += 1;
            continue;
        }

        let arrival = match parse_time_of_day(&row.arrival_time) {
            Ok(arrival) => arrival,
            Err(e) => {
                debug!(trip = %row.trip_id, sequence = row.sequence, error = %e, "skipping stop time");
                report.skipped.malformed_row += 1;
                continue;
            }
        };

        rows_by_trip.entry(&row.trip_id).or_default().push(TripRow {
            sequence: row.sequence,
            stop_id: &row.stop_id,
            arrival,
        });
    }

    let mut arrivals: BTreeMap<StopId, Vec<ScheduledArrival>> = BTreeMap::new();
    let mut longest_path: HashMap<RouteIdentifier, Vec<StopId>> = HashMap::new();

    for (trip_id, mut rows) in rows_by_trip {
        let Some(&(route_id, service_id)) = trips.get(trip_id) else {
            continue;
        };

        let Some(calendar) = calendars.get(service_id) else {
            report.skipped.unknown_service += 1;
            continue;
        };

        rows.sort_by_key(|row| row.sequence);

        let Some(timed) = timed_rows(&rows) else {
            debug!(trip = %trip_id, "trip lacks a time at its first or last stop");
            report.skipped.missing_timepoint += 1;
            continue;
        };

        let route = routes
            .entry(route_id.clone())
            .or_insert_with(|| Route::new(route_id.clone()));
        let window = route.start.zip(route.end);
        let (start, end) = calendar.widen(window);
        route.start = Some(start);
        route.end = Some(end);
        touched.insert(route_id.clone());

        let mut path = Vec::with_capacity(rows.len());
        for (row, (scheduled, kind)) in rows.iter().zip(timed) {
            let stop_id = match bundle.translate_stop(route_id, row.stop_id) {
                Some(id) if known_stops.contains(&id) => id,
                _ => {
                    report.skipped.unknown_stop += 1;
                    continue;
                }
            };

            if kind == ArrivalKind::Interpolated {
                report.interpolated += 1;
            }
            path.push(stop_id);
            arrivals.entry(stop_id).or_default().push(ScheduledArrival {
                stop_id,
                route_id: route_id.clone(),
                scheduled,
                weekdays: calendar.weekdays,
                kind,
            });
        }

        let longest = longest_path.entry(route_id.clone()).or_default();
        if path.len() > longest.len() {
            *longest = path;
        }
        report.trips += 1;
    }

    for partition in arrivals.values_mut() {
        partition.sort_by(|a, b| a.scheduled.cmp(&b.scheduled).then_with(|| a.cmp(b)));
    }
    report.arrivals = arrivals.values().map(Vec::len).sum();

    for (route_id, path) in longest_path {
        if let Some(route) = routes.get_mut(&route_id) {
            route.stops = path;
        }
    }

    let routes: Vec<Route> = routes
        .into_values()
        .filter(|route| touched.contains(&route.id))
        .collect();
    report.routes = routes.len();

    BuiltSchedule {
        arrivals,
        routes,
        report,
    }
}

/// Scheduled offset and kind for every row of one trip, in sequence order.
///
/// `None` when the first or last row has no time.
fn timed_rows(rows: &[TripRow]) -> Option<Vec<(u32, ArrivalKind)>> {
    rows.first()?.arrival?;
    rows.last()?.arrival?;

    let known: Vec<(usize, u32)> = rows
        .iter()
        .enumerate()
        .filter_map(|(idx, row)| row.arrival.map(|t| (idx, t)))
        .collect();

    let mut timed = Vec::with_capacity(rows.len());
    timed.push((known[0].1, ArrivalKind::Timepoint));

    for pair in known.windows(2) {
        let (i, t_i) = pair[0];
        let (j, t_j) = pair[1];
        for k in i + 1..j {
            timed.push((interpolate(t_i, t_j, k - i, j - i), ArrivalKind::Interpolated));
        }
        timed.push((t_j, ArrivalKind::Timepoint));
    }

    Some(timed)
}

/// Offset `step` of `steps` evenly spaced steps from `from` to `to`
fn interpolate(from: u32, to: u32, step: usize, steps: usize) -> u32 {
    let elapsed = i64::from(to) - i64::from(from);
    let offset = i64::from(from) + elapsed * step as i64 / steps as i64;
    offset.clamp(0, i64::from(u32::MAX)) as u32
}

// ============================================================================
// Ingestion run
// ============================================================================

/// Fetch the feed, build the schedule and replace the stored one.
///
/// A fetch failure or a store failure while reading commits nothing.
pub async fn rebuild_schedule(
    source: &dyn FeedSource,
    mapping: &RouteIdMapping,
    stops: &dyn StopStore,
    routes: &dyn RouteStore,
    writer: &dyn ScheduleWriter,
) -> Result<IngestReport> {
    let bundle = source.fetch().await.map_err(|e| {
        warn!(error = %e, "feed fetch failed, keeping the current schedule");
        e
    })?;

    let known_stops: HashSet<StopId> = stops
        .stop_coordinates()
        .await?
        .into_iter()
        .map(|coordinate| coordinate.id)
        .collect();

    let mut current = BTreeMap::new();
    for id in mapping.system_routes() {
        match routes.route(id).await {
            Ok(route) => {
                current.insert(id.clone(), route);
            }
            Err(TransitError::RouteNotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }

    let built = build_schedule(&bundle, mapping, &known_stops, current);

    writer.put_routes(built.routes).await?;
    writer.replace_schedule(built.arrivals).await?;

    info!(
        trips = built.report.trips,
        arrivals = built.report.arrivals,
        skipped = built.report.skipped.total(),
        "schedule rebuilt"
    );
    Ok(built.report)
}
