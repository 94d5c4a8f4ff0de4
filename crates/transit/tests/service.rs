use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::America::Los_Angeles;
use corvallis_transit::prelude::*;
use corvallis_transit::schedule::{
    FeedRoute, FeedStopTime, FeedTrip, PatternPlatform, PlatformDetail, RoutePattern,
};

struct FixedFeed(FeedBundle);

impl FeedSource for FixedFeed {
    fn fetch<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<FeedBundle>> + Send + 'a>> {
        Box::pin(async move { Ok(self.0.clone()) })
    }
}

struct FixedPlatforms(PlatformBundle);

impl PlatformSource for FixedPlatforms {
    fn fetch_platforms<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<PlatformBundle>> + Send + 'a>> {
        Box::pin(async move { Ok(self.0.clone()) })
    }
}

fn stop(id: i64, name: &str, lat: f64, lon: f64) -> Stop {
    Stop {
        id: StopId(id),
        name: name.into(),
        lat,
        lon,
        road: "".into(),
        bearing: 0.0,
        adherence_point: false,
    }
}

fn stop_time(trip: &str, stop_id: &str, sequence: u32, arrival: &str) -> FeedStopTime {
    FeedStopTime {
        trip_id: TripIdentifier::new(trip),
        stop_id: stop_id.to_string(),
        sequence,
        arrival_time: arrival.to_string(),
    }
}

/// Route 1 runs downtown -> 2nd St -> campus on weekdays, twice a morning
fn feed() -> FeedBundle {
    let mut bundle = FeedBundle {
        routes: vec![FeedRoute {
            route_id: FeedRouteIdentifier::new("R1"),
            short_name: "1".into(),
            long_name: "Downtown - OSU".into(),
            description: "".into(),
            url: "".into(),
            color: "00ADEE".into(),
        }],
        trips: vec![
            FeedTrip {
                trip_id: TripIdentifier::new("T1"),
                route_id: FeedRouteIdentifier::new("R1"),
                service_id: ServiceIdentifier::new("WK"),
            },
            FeedTrip {
                trip_id: TripIdentifier::new("T2"),
                route_id: FeedRouteIdentifier::new("R1"),
                service_id: ServiceIdentifier::new("WK"),
            },
        ],
        calendar: vec![ServiceCalendar {
            service_id: ServiceIdentifier::new("WK"),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            weekdays: WeekdayFlags::from_bools(true, true, true, true, true, false, false),
        }],
        stop_times: vec![
            stop_time("T1", "DTC", 1, "7:50:00"),
            stop_time("T1", "2", 2, ""),
            stop_time("T1", "3", 3, "8:00:00"),
            stop_time("T2", "DTC", 1, "8:20:00"),
            stop_time("T2", "2", 2, ""),
            stop_time("T2", "3", 3, "8:30:00"),
        ],
        ..Default::default()
    };
    bundle.stop_translation.insert("DTC".into(), StopId(1));
    bundle
}

fn service(feed: MemoryLiveFeed) -> (TransitService, Arc<MemoryTransitStore>) {
    let store = Arc::new(MemoryTransitStore::from_data(
        vec![
            stop(1, "Downtown Transit Center", 44.5646, -123.2620),
            stop(2, "NW 2nd St", 44.5660, -123.2630),
            stop(3, "OSU Campus", 44.5590, -123.2810),
        ],
        vec![],
    ));
    let service = TransitService::new(
        Stores::shared(store.clone()),
        Arc::new(feed),
        EngineConfig::default(),
    );
    (service, store)
}

fn local(hour: u32, minute: u32) -> DateTime<Utc> {
    Los_Angeles
        .with_ymd_and_hms(2024, 5, 14, hour, minute, 0)
        .unwrap()
        .with_timezone(&Utc)
}

#[tokio::test]
async fn test_ingest_then_reconcile() {
    let (service, store) = service(MemoryLiveFeed::new());
    let mapping: RouteIdMapping = [("R1", "1")].into_iter().collect();

    let report = service.rebuild_schedule(&FixedFeed(feed()), &mapping).await.unwrap();
    assert_eq!(report.trips, 2);
    assert_eq!(report.arrivals, 6);
    assert_eq!(report.interpolated, 2);

    let route = store.route(&RouteIdentifier::new("1")).await.unwrap();
    assert_eq!(&*route.additional_name, "Downtown - OSU");
    assert_eq!(route.stops, vec![StopId(1), StopId(2), StopId(3)]);

    // 7:56 at 2nd St: the interpolated 7:55 slot counts as passed without
    // live data, leaving the 8:25 bus
    let response = service
        .reconcile(&[StopId(2)], Some(local(7, 56)))
        .await
        .unwrap();
    let arrivals = &response.arrivals[&StopId(2)];
    assert_eq!(arrivals.len(), 1);
    assert_eq!(&*arrivals[0].route, "1");
    assert_eq!(arrivals[0].scheduled.with_timezone(&Utc), local(8, 25));
}

#[tokio::test]
async fn test_live_predictions_after_ingest() {
    let live = MemoryLiveFeed::new().with_estimates(
        StopId(2),
        vec![LiveEstimate {
            route_id: RouteIdentifier::new("1"),
            eta: Duration::from_secs(120),
        }],
    );
    let (service, _) = service(live);
    let mapping: RouteIdMapping = [("R1", "1")].into_iter().collect();
    service.rebuild_schedule(&FixedFeed(feed()), &mapping).await.unwrap();

    let now = Utc::now();
    let response = service.reconcile(&[StopId(2), StopId(3)], None).await.unwrap();
    assert!(response.is_complete());

    // Whatever the time of day, the live prediction shows up at 2nd St
    let arrivals = &response.arrivals[&StopId(2)];
    let expected = now + chrono::Duration::seconds(120);
    assert!(arrivals
        .iter()
        .any(|a| (a.expected.with_timezone(&Utc) - expected).num_seconds().abs() <= 2));
}

#[tokio::test]
async fn test_nearby_sees_stores_stops() {
    let (service, _) = service(MemoryLiveFeed::new());

    let found = service.nearby(44.5646, -123.2620, 500.0).await.unwrap();
    let names: Vec<_> = found.iter().map(|n| n.stop.name.to_string()).collect();
    assert_eq!(names, vec!["Downtown Transit Center", "NW 2nd St"]);
    assert!(found.iter().all(|n| n.distance <= 500.0));

    assert!(matches!(
        service.nearby(44.5646, -123.2620, 0.0).await,
        Err(TransitError::InvalidInput(_))
    ));
}

fn platforms() -> PlatformBundle {
    let platform = |number: i64, name: &str| PatternPlatform {
        number: StopId(number),
        name: name.to_string(),
        adherence_point: number == 13309,
    };
    let detail = |number: i64, lat: f64, lon: f64, road: &str| PlatformDetail {
        number: StopId(number),
        lat,
        lon,
        bearing: 90.0,
        road: road.to_string(),
    };

    PlatformBundle {
        patterns: vec![RoutePattern {
            route_id: RouteIdentifier::new("1"),
            direction: "To OSU".into(),
            polyline: "_p~iF~ps|U".into(),
            platforms: vec![
                platform(13309, "Downtown Transit Center"),
                platform(2, "NW 2nd St"),
                platform(3, "OSU Campus"),
            ],
        }],
        platforms: vec![
            detail(13309, 44.5646, -123.2620, "NW Monroe Ave"),
            detail(2, 44.5660, -123.2630, "NW 2nd St"),
            detail(3, 44.5590, -123.2810, "SW Jefferson Way"),
        ],
    }
}

#[tokio::test]
async fn test_platform_import_feeds_schedule_build() {
    let store = Arc::new(MemoryTransitStore::new());
    let service = TransitService::new(
        Stores::shared(store.clone()),
        Arc::new(MemoryLiveFeed::new()),
        EngineConfig::default(),
    );

    let imported = service.import_platforms(&FixedPlatforms(platforms())).await.unwrap();
    assert_eq!(imported.stops_created, 3);
    assert_eq!(imported.missing_geometry, 0);

    let route = store.route(&RouteIdentifier::new("1")).await.unwrap();
    assert_eq!(&*route.direction, "To OSU");
    assert_eq!(&*route.polyline, "_p~iF~ps|U");

    // Route 1 serves the transit center under its own platform number
    let mut bundle = feed();
    bundle.stop_translation.insert("1_DTC".into(), StopId(13309));
    let mapping: RouteIdMapping = [("R1", "1")].into_iter().collect();
    let report = service.rebuild_schedule(&FixedFeed(bundle), &mapping).await.unwrap();
    assert_eq!(report.skipped.unknown_stop, 0);
    assert_eq!(report.arrivals, 6);

    let response = service
        .reconcile(&[StopId(13309)], Some(local(7, 45)))
        .await
        .unwrap();
    let scheduled: Vec<_> = response.arrivals[&StopId(13309)]
        .iter()
        .map(|a| a.scheduled.with_timezone(&Utc))
        .collect();
    assert_eq!(scheduled, vec![local(8, 20)]);

    let found = service.nearby(44.5646, -123.2620, 100.0).await.unwrap();
    assert_eq!(found[0].stop.id, StopId(13309));
    assert_eq!(&*found[0].stop.road, "NW Monroe Ave");
    assert!(found[0].stop.adherence_point);
}
