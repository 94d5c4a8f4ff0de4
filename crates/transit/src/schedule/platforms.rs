//! Stop and route-pattern import.
//!
//! The operator publishes, per route, one pattern for each direction with the
//! platforms it serves, plus a geometry record for every platform. This pass
//! creates the stops of each route's longest pattern, gives the route that
//! pattern's direction, polyline and stop path, and then fills in position,
//! bearing and road from the geometry records.
//!
//! It runs before [`rebuild_schedule`](crate::schedule::rebuild_schedule), which
//! only keeps arrivals at stops that already exist.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use tracing::{debug, info, warn};

use crate::identifiers::*;
use crate::models::traits::{RouteStore, ScheduleWriter, StopStore};
use crate::models::types::*;
use crate::network::traits::PlatformSource;

// ============================================================================
// Input
// ============================================================================

/// A platform as listed along a pattern
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatternPlatform {
    pub number: StopId,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub adherence_point: bool,
}

/// One direction variant of a route
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoutePattern {
    pub route_id: RouteIdentifier,
    #[cfg_attr(feature = "serde", serde(default))]
    pub direction: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub polyline: String,
    pub platforms: Vec<PatternPlatform>,
}

/// Position and heading of one platform
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlatformDetail {
    pub number: StopId,
    pub lat: f64,
    pub lon: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub bearing: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub road: String,
}

/// Everything one platform import consumes
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlatformBundle {
    pub patterns: Vec<RoutePattern>,
    pub platforms: Vec<PlatformDetail>,
}

// ============================================================================
// Reporting
// ============================================================================

/// Summary of one platform import
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PlatformReport {
    pub routes: usize,
    pub stops_created: usize,
    pub stops_updated: usize,
    /// Geometry records naming no known or imported stop
    pub unknown_platform: usize,
    /// Imported stops that got no geometry record
    pub missing_geometry: usize,
}

impl fmt::Display for PlatformReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} routes, {} stops created, {} updated, {} unknown platforms, {} without geometry",
            self.routes,
            self.stops_created,
            self.stops_updated,
            self.unknown_platform,
            self.missing_geometry
        )
    }
}

/// Output of [`build_platforms`], not yet written anywhere
#[derive(Clone, Debug, Default)]
pub struct BuiltPlatforms {
    pub stops: Vec<Stop>,
    pub routes: Vec<Route>,
    pub report: PlatformReport,
}

// ============================================================================
// Build
// ============================================================================

fn new_stop(platform: &PatternPlatform) -> Stop {
    Stop {
        id: platform.number,
        name: platform.name.as_str().into(),
        lat: 0.0,
        lon: 0.0,
        road: "".into(),
        bearing: 0.0,
        adherence_point: platform.adherence_point,
    }
}

/// Compute the stops and routes described by `bundle`.
///
/// `stops` and `routes` hold the current records; fields this pass does not
/// own, such as route colors, are kept. Geometry records also update known
/// stops that sit on no pattern. When a route has several patterns the one
/// with the most platforms wins, the first listed on a tie.
pub fn build_platforms(
    bundle: &PlatformBundle,
    mut stops: HashMap<StopId, Stop>,
    mut routes: BTreeMap<RouteIdentifier, Route>,
) -> BuiltPlatforms {
    let mut report = PlatformReport::default();

    let mut longest: BTreeMap<&RouteIdentifier, &RoutePattern> = BTreeMap::new();
    for pattern in &bundle.patterns {
        let chosen = longest.entry(&pattern.route_id).or_insert(pattern);
        if pattern.platforms.len() > chosen.platforms.len() {
            *chosen = pattern;
        }
    }

    let mut created: HashSet<StopId> = HashSet::new();
    let mut located: HashSet<StopId> = HashSet::new();
    let mut touched: BTreeSet<StopId> = BTreeSet::new();
    let mut built_routes = Vec::with_capacity(longest.len());

    for (route_id, pattern) in longest {
        let mut route = routes
            .remove(route_id)
            .unwrap_or_else(|| Route::new(route_id.clone()));
        route.direction = pattern.direction.as_str().into();
        route.polyline = pattern.polyline.as_str().into();
        route.stops = pattern.platforms.iter().map(|p| p.number).collect();

        for platform in &pattern.platforms {
            let stop = stops.entry(platform.number).or_insert_with(|| {
                created.insert(platform.number);
                new_stop(platform)
            });
            stop.name = platform.name.as_str().into();
            stop.adherence_point = platform.adherence_point;
            touched.insert(platform.number);
        }

        built_routes.push(route);
    }

    for detail in &bundle.platforms {
        let Some(stop) = stops.get_mut(&detail.number) else {
            debug!(stop_id = %detail.number, "geometry for an unknown platform");
            report.unknown_platform += 1;
            continue;
        };

        stop.lat = detail.lat;
        stop.lon = detail.lon;
        stop.bearing = detail.bearing;
        stop.road = detail.road.as_str().into();
        located.insert(detail.number);
        touched.insert(detail.number);
    }

    let mut built_stops = Vec::with_capacity(touched.len());
    for id in touched {
        let Some(stop) = stops.remove(&id) else {
            continue;
        };
        if created.contains(&id) {
            report.stops_created += 1;
            if !located.contains(&id) {
                report.missing_geometry += 1;
            }
        } else {
            report.stops_updated += 1;
        }
        built_stops.push(stop);
    }

    debug!(located = located.len(), "platform geometry applied");
    report.routes = built_routes.len();

    BuiltPlatforms {
        stops: built_stops,
        routes: built_routes,
        report,
    }
}

// ============================================================================
// Import run
// ============================================================================

/// Fetch patterns and platforms, then write the stops and routes they
/// describe. A fetch or read failure writes nothing.
pub async fn import_platforms(
    source: &dyn PlatformSource,
    stops: &dyn StopStore,
    routes: &dyn RouteStore,
    writer: &dyn ScheduleWriter,
) -> Result<PlatformReport> {
    let bundle = source.fetch_platforms().await.map_err(|e| {
        warn!(error = %e, "platform fetch failed, keeping current stops");
        e
    })?;

    let mut ids: Vec<StopId> = bundle
        .patterns
        .iter()
        .flat_map(|pattern| pattern.platforms.iter().map(|p| p.number))
        .chain(bundle.platforms.iter().map(|detail| detail.number))
        .collect();
    ids.sort_unstable();
    ids.dedup();

    let current_stops: HashMap<StopId, Stop> = stops
        .stops(&ids)
        .await?
        .into_iter()
        .map(|stop| (stop.id, stop))
        .collect();

    let mut current_routes = BTreeMap::new();
    for pattern in &bundle.patterns {
        if current_routes.contains_key(&pattern.route_id) {
            continue;
        }
        match routes.route(&pattern.route_id).await {
            Ok(route) => {
                current_routes.insert(pattern.route_id.clone(), route);
            }
            Err(TransitError::RouteNotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }

    let built = build_platforms(&bundle, current_stops, current_routes);

    writer.put_stops(built.stops).await?;
    writer.put_routes(built.routes).await?;

    if built.report.missing_geometry > 0 {
        warn!(
            stops = built.report.missing_geometry,
            "imported stops have no position"
        );
    }
    info!(
        routes = built.report.routes,
        created = built.report.stops_created,
        updated = built.report.stops_updated,
        "platforms imported"
    );
    Ok(built.report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryTransitStore;
    use std::future::Future;
    use std::pin::Pin;

    fn platform(number: i64, name: &str, adherence_point: bool) -> PatternPlatform {
        PatternPlatform {
            number: StopId(number),
            name: name.to_string(),
            adherence_point,
        }
    }

    fn pattern(route: &str, direction: &str, platforms: Vec<PatternPlatform>) -> RoutePattern {
        RoutePattern {
            route_id: RouteIdentifier::new(route),
            direction: direction.to_string(),
            polyline: format!("{route}-{direction}"),
            platforms,
        }
    }

    fn detail(number: i64, lat: f64, lon: f64, bearing: f64, road: &str) -> PlatformDetail {
        PlatformDetail {
            number: StopId(number),
            lat,
            lon,
            bearing,
            road: road.to_string(),
        }
    }

    /// Route 3 runs a short loop and a long loop through the transit center
    fn sample_bundle() -> PlatformBundle {
        PlatformBundle {
            patterns: vec![
                pattern("3", "Outbound", vec![platform(13309, "Downtown Transit Center", true), platform(10042, "NW 5th St", false)]),
                pattern(
                    "3",
                    "Loop",
                    vec![
                        platform(13309, "Downtown Transit Center", true),
                        platform(10042, "NW 5th St", false),
                        platform(10043, "NW 9th St", true),
                    ],
                ),
            ],
            platforms: vec![
                detail(13309, 44.5646, -123.2620, 90.0, "NW Monroe Ave"),
                detail(10042, 44.5660, -123.2650, 0.0, "NW 5th St"),
                detail(10043, 44.5690, -123.2700, 270.0, "NW 9th St"),
                detail(99999, 44.0, -123.0, 0.0, "Nowhere Rd"),
            ],
        }
    }

    #[test]
    fn test_longest_pattern_sets_route_path() {
        let built = build_platforms(&sample_bundle(), HashMap::new(), BTreeMap::new());

        assert_eq!(built.routes.len(), 1);
        let route = &built.routes[0];
        assert_eq!(&*route.direction, "Loop");
        assert_eq!(&*route.polyline, "3-Loop");
        assert_eq!(route.stops, vec![StopId(13309), StopId(10042), StopId(10043)]);
    }

    #[test]
    fn test_pattern_tie_keeps_first_listed() {
        let bundle = PlatformBundle {
            patterns: vec![
                pattern("C1", "North", vec![platform(1, "A", false)]),
                pattern("C1", "South", vec![platform(2, "B", false)]),
            ],
            platforms: vec![],
        };
        let built = build_platforms(&bundle, HashMap::new(), BTreeMap::new());
        assert_eq!(&*built.routes[0].direction, "North");
        assert_eq!(built.stops.len(), 1);
    }

    #[test]
    fn test_stops_created_then_located() {
        let built = build_platforms(&sample_bundle(), HashMap::new(), BTreeMap::new());

        let ids: Vec<_> = built.stops.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![StopId(10042), StopId(10043), StopId(13309)]);

        let center = &built.stops[2];
        assert_eq!(&*center.name, "Downtown Transit Center");
        assert_eq!(&*center.road, "NW Monroe Ave");
        assert_eq!(center.bearing, 90.0);
        assert_eq!((center.lat, center.lon), (44.5646, -123.2620));
        assert!(center.adherence_point);

        assert_eq!(
            built.report,
            PlatformReport {
                routes: 1,
                stops_created: 3,
                stops_updated: 0,
                unknown_platform: 1,
                missing_geometry: 0,
            }
        );
    }

    #[test]
    fn test_existing_records_keep_foreign_fields() {
        let mut route = Route::new(RouteIdentifier::new("3"));
        route.color = "00ADEE".into();
        let routes = BTreeMap::from([(route.id.clone(), route)]);

        let mut known = new_stop(&platform(10042, "Old name", true));
        known.lat = 1.0;
        let stops = HashMap::from([(known.id, known)]);

        let mut bundle = sample_bundle();
        bundle.platforms.retain(|detail| detail.number != StopId(10043));
        let built = build_platforms(&bundle, stops, routes);

        assert_eq!(&*built.routes[0].color, "00ADEE");
        let fifth = built.stops.iter().find(|s| s.id == StopId(10042)).unwrap();
        assert_eq!(&*fifth.name, "NW 5th St");
        assert!(!fifth.adherence_point);
        assert_eq!(fifth.lat, 44.5660);

        assert_eq!(built.report.stops_created, 2);
        assert_eq!(built.report.stops_updated, 1);
        assert_eq!(built.report.missing_geometry, 1);
    }

    struct StaticPlatforms(Option<PlatformBundle>);

    impl PlatformSource for StaticPlatforms {
        fn fetch_platforms<'a>(
            &'a self,
        ) -> Pin<Box<dyn Future<Output = Result<PlatformBundle>> + Send + 'a>> {
            Box::pin(async move {
                self.0
                    .clone()
                    .ok_or_else(|| TransitError::Upstream("platform service unreachable".into()))
            })
        }
    }

    #[tokio::test]
    async fn test_import_writes_stops_and_routes() {
        let store = MemoryTransitStore::new();
        let source = StaticPlatforms(Some(sample_bundle()));

        let report = import_platforms(&source, &store, &store, &store).await.unwrap();
        assert_eq!(report.stops_created, 3);

        let coordinates = store.stop_coordinates().await.unwrap();
        assert_eq!(coordinates.len(), 3);
        let route = store.route(&RouteIdentifier::new("3")).await.unwrap();
        assert_eq!(route.stops.len(), 3);

        // Second run only updates
        let again = import_platforms(&source, &store, &store, &store).await.unwrap();
        assert_eq!(again.stops_created, 0);
        assert_eq!(again.stops_updated, 3);
        assert_eq!(store.stop_coordinates().await.unwrap(), coordinates);
    }

    #[tokio::test]
    async fn test_fetch_failure_writes_nothing() {
        let store = MemoryTransitStore::new();
        let result = import_platforms(&StaticPlatforms(None), &store, &store, &store).await;

        assert!(matches!(result, Err(TransitError::Upstream(_))));
        assert!(store.stop_coordinates().await.unwrap().is_empty());
        assert!(store.all_routes().await.is_empty());
    }
}
