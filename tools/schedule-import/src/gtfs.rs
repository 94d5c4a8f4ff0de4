//! GTFS directory decoding.
//!
//! Reads the four schedule tables plus stops.txt and the two id maps the
//! operator publishes alongside the feed. Unreadable rows in the big tables
//! are counted and skipped; the small tables must parse completely.

use std::collections::HashMap;
use std::fs::File;
use std::future::Future;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use corvallis_transit::prelude::{
    FeedBundle, FeedSource, FeedRouteIdentifier, RouteIdMapping, RouteIdentifier,
    ServiceCalendar, ServiceIdentifier, Stop, StopId, TransitError, TripIdentifier, WeekdayFlags,
};
use corvallis_transit::schedule::{FeedRoute, FeedStopTime, FeedTrip};

#[derive(Deserialize)]
struct RawRoute {
    route_id: String,
    #[serde(default)]
    route_short_name: String,
    #[serde(default)]
    route_long_name: String,
    #[serde(default)]
    route_desc: String,
    #[serde(default)]
    route_url: String,
    #[serde(default)]
    route_color: String,
}

#[derive(Deserialize)]
struct RawTrip {
    route_id: String,
    service_id: String,
    trip_id: String,
}

#[derive(Deserialize)]
struct RawCalendar {
    service_id: String,
    monday: u8,
    tuesday: u8,
    wednesday: u8,
    thursday: u8,
    friday: u8,
    saturday: u8,
    sunday: u8,
    start_date: String,
    end_date: String,
}

#[derive(Deserialize)]
struct RawStopTime {
    trip_id: String,
    #[serde(default)]
    arrival_time: String,
    stop_id: String,
    stop_sequence: u32,
}

#[derive(Deserialize)]
struct RawStop {
    stop_id: String,
    stop_name: String,
    stop_lat: f64,
    stop_lon: f64,
    #[serde(default)]
    stop_desc: String,
}

#[derive(Deserialize)]
struct RawStopNumber {
    stop_id: String,
    #[serde(default)]
    stop_number: Option<i64>,
}

#[derive(Deserialize)]
struct RawRouteName {
    feed_route_id: String,
    route_id: String,
}

fn reader(path: &Path) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file)))
}

/// Every row of `path`, failing on the first unreadable one
fn read_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rows = Vec::new();
    for (line, result) in reader(path)?.deserialize().enumerate() {
        let row: T = result.with_context(|| format!("{} row {}", path.display(), line + 2))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Readable rows of `path` and the number of rows skipped
fn read_lenient<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, usize)> {
    let mut rows = Vec::new();
    let mut rejected = 0;
    for result in reader(path)?.deserialize() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                debug!("Skipping row in {}: {}", path.display(), e);
                rejected += 1;
            }
        }
    }
    if rejected > 0 {
        warn!("{} unreadable rows in {}", rejected, path.display());
    }
    Ok((rows, rejected))
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y%m%d").with_context(|| format!("Bad calendar date {value:?}"))
}

/// Feed stop id -> stop number table (`stop_id,stop_number`)
pub fn load_stop_map(path: &Path) -> Result<HashMap<String, StopId>> {
    let rows: Vec<RawStopNumber> = read_all(path)?;
    Ok(rows
        .into_iter()
        .filter_map(|row| Some((row.stop_id, StopId(row.stop_number?))))
        .collect())
}

/// Feed route -> system route table (`feed_route_id,route_id`)
pub fn load_route_map(path: &Path) -> Result<RouteIdMapping> {
    let rows: Vec<RawRouteName> = read_all(path)?;
    Ok(rows
        .into_iter()
        .map(|row| (row.feed_route_id, row.route_id))
        .collect())
}

/// System stops from stops.txt. Stops that translate to no stop number are
/// left out.
///
/// GTFS carries no bearing or adherence flag, and platforms the operator
/// numbers per route have no row of their own; the platform import fills
/// both in.
pub fn load_stops(feed_dir: &Path, stop_map: &HashMap<String, StopId>) -> Result<Vec<Stop>> {
    let (rows, _) = read_lenient::<RawStop>(&feed_dir.join("stops.txt"))?;

    let mut stops = Vec::with_capacity(rows.len());
    for row in rows {
        let id = match stop_map.get(&row.stop_id) {
            Some(id) => *id,
            None => match row.stop_id.parse::<StopId>() {
                Ok(id) => id,
                Err(_) => {
                    debug!("No stop number for feed stop {}", row.stop_id);
                    continue;
                }
            },
        };

        stops.push(Stop {
            id,
            name: row.stop_name.into(),
            lat: row.stop_lat,
            lon: row.stop_lon,
            road: row.stop_desc.into(),
            bearing: 0.0,
            adherence_point: false,
        });
    }

    info!("Loaded {} stops", stops.len());
    Ok(stops)
}

fn read_bundle(feed_dir: &Path, stop_map: HashMap<String, StopId>) -> Result<FeedBundle> {
    let routes = read_all::<RawRoute>(&feed_dir.join("routes.txt"))?
        .into_iter()
        .map(|row| FeedRoute {
            route_id: FeedRouteIdentifier::new(row.route_id),
            short_name: row.route_short_name,
            long_name: row.route_long_name,
            description: row.route_desc,
            url: row.route_url,
            color: row.route_color,
        })
        .collect();

    let mut calendar = Vec::new();
    for row in read_all::<RawCalendar>(&feed_dir.join("calendar.txt"))? {
        calendar.push(ServiceCalendar {
            service_id: ServiceIdentifier::new(row.service_id),
            start_date: parse_date(&row.start_date)?,
            end_date: parse_date(&row.end_date)?,
            weekdays: WeekdayFlags::from_bools(
                row.monday == 1,
                row.tuesday == 1,
                row.wednesday == 1,
                row.thursday == 1,
                row.friday == 1,
                row.saturday == 1,
                row.sunday == 1,
            ),
        });
    }

    let (trip_rows, rejected_trips) = read_lenient::<RawTrip>(&feed_dir.join("trips.txt"))?;
    let trips = trip_rows
        .into_iter()
        .map(|row| FeedTrip {
            trip_id: TripIdentifier::new(row.trip_id),
            route_id: FeedRouteIdentifier::new(row.route_id),
            service_id: ServiceIdentifier::new(row.service_id),
        })
        .collect();

    let (time_rows, rejected_times) = read_lenient::<RawStopTime>(&feed_dir.join("stop_times.txt"))?;
    let stop_times = time_rows
        .into_iter()
        .map(|row| FeedStopTime {
            trip_id: TripIdentifier::new(row.trip_id),
            stop_id: row.stop_id,
            sequence: row.stop_sequence,
            arrival_time: row.arrival_time,
        })
        .collect();

    Ok(FeedBundle {
        routes,
        trips,
        calendar,
        stop_times,
        stop_translation: stop_map,
        rejected_rows: rejected_trips + rejected_times,
    })
}

/// [`FeedSource`] over an unpacked GTFS directory
pub struct CsvFeedSource {
    feed_dir: PathBuf,
    stop_map: HashMap<String, StopId>,
}

impl CsvFeedSource {
    pub fn new(feed_dir: PathBuf, stop_map: HashMap<String, StopId>) -> Self {
        Self { feed_dir, stop_map }
    }
}

impl FeedSource for CsvFeedSource {
    fn fetch<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = corvallis_transit::Result<FeedBundle>> + Send + 'a>> {
        Box::pin(async move {
            let feed_dir = self.feed_dir.clone();
            let stop_map = self.stop_map.clone();

            tokio::task::spawn_blocking(move || read_bundle(&feed_dir, stop_map))
                .await
                .map_err(|e| TransitError::Upstream(format!("feed reader stopped: {e}")))?
                .map_err(|e| TransitError::Upstream(format!("{e:#}")))
        })
    }
}

/// Route ids the mapping knows, for log output
pub fn describe_mapping(mapping: &RouteIdMapping) -> String {
    let mut routes: Vec<&RouteIdentifier> = mapping.system_routes().collect();
    routes.sort();
    routes
        .iter()
        .map(|route| route.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
