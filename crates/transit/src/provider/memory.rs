//! In-memory stores and live feed.
//!
//! Backs the command line tool and the tests. Every collection sits behind a
//! `tokio` lock so a schedule rebuild swaps the whole arrival set at once.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Weekday;
use tokio::sync::RwLock;

use crate::identifiers::*;
use crate::models::{traits::*, types::*};
use crate::network::traits::LiveFeed;

// ============================================================================
// Transit store
// ============================================================================

#[derive(Default)]
struct StoreState {
    stops: HashMap<StopId, Stop>,
    routes: HashMap<RouteIdentifier, Route>,
    arrivals: BTreeMap<StopId, Vec<ScheduledArrival>>,
}

/// Stops, routes and scheduled arrivals held in memory
///
/// This type is cheap to clone since all data is shared behind an `Arc`.
#[derive(Clone, Default)]
pub struct MemoryTransitStore {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryTransitStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from raw data
    pub fn from_data(stops: Vec<Stop>, routes: Vec<Route>) -> Self {
        let state = StoreState {
            stops: stops.into_iter().map(|s| (s.id, s)).collect(),
            routes: routes.into_iter().map(|r| (r.id.clone(), r)).collect(),
            arrivals: BTreeMap::new(),
        };

        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn insert_stop(&self, stop: Stop) {
        self.state.write().await.stops.insert(stop.id, stop);
    }

    pub async fn all_routes(&self) -> Vec<Route> {
        let state = self.state.read().await;
        let mut routes: Vec<Route> = state.routes.values().cloned().collect();
        routes.sort_by(|a, b| a.id.cmp(&b.id));
        routes
    }

    /// Every stored arrival, grouped by stop
    pub async fn all_arrivals(&self) -> BTreeMap<StopId, Vec<ScheduledArrival>> {
        self.state.read().await.arrivals.clone()
    }
}

impl ArrivalStore for MemoryTransitStore {
    fn scheduled_arrivals<'a>(
        &'a self,
        stop_id: StopId,
        weekday: Weekday,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ScheduledArrival>>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.state.read().await;
            let arrivals: Vec<ScheduledArrival> = state
                .arrivals
                .get(&stop_id)
                .map(|all| {
                    all.iter()
                        .filter(|a| a.weekdays.contains(weekday))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            Ok(arrivals)
        })
    }
}

impl RouteStore for MemoryTransitStore {
    fn route<'a>(
        &'a self,
        id: &'a RouteIdentifier,
    ) -> Pin<Box<dyn Future<Output = Result<Route>> + Send + 'a>> {
        Box::pin(async move {
            self.state
                .read()
                .await
                .routes
                .get(id)
                .cloned()
                .ok_or_else(|| TransitError::RouteNotFound(id.clone()))
        })
    }
}

impl StopStore for MemoryTransitStore {
    fn stops<'a>(
        &'a self,
        ids: &'a [StopId],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Stop>>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.state.read().await;
            Ok(ids.iter().filter_map(|id| state.stops.get(id).cloned()).collect())
        })
    }

    fn stop_coordinates<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<StopCoordinate>>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.state.read().await;
            let mut coordinates: Vec<StopCoordinate> = state
                .stops
                .values()
                .map(|s| StopCoordinate {
                    id: s.id,
                    lat: s.lat,
                    lon: s.lon,
                })
                .collect();
            coordinates.sort_by_key(|c| c.id);
            Ok(coordinates)
        })
    }
}

impl ScheduleWriter for MemoryTransitStore {
    fn replace_schedule<'a>(
        &'a self,
        mut arrivals: BTreeMap<StopId, Vec<ScheduledArrival>>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            for partition in arrivals.values_mut() {
                partition.sort_by(|a, b| a.scheduled.cmp(&b.scheduled).then_with(|| a.cmp(b)));
            }
            self.state.write().await.arrivals = arrivals;
            Ok(())
        })
    }

    fn put_routes<'a>(
        &'a self,
        routes: Vec<Route>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            for route in routes {
                state.routes.insert(route.id.clone(), route);
            }
            Ok(())
        })
    }

    fn put_stops<'a>(
        &'a self,
        stops: Vec<Stop>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            for stop in stops {
                state.stops.insert(stop.id, stop);
            }
            Ok(())
        })
    }
}

// ============================================================================
// Live feed
// ============================================================================

/// Canned live predictions, with call counting and optional latency/failure
#[derive(Default)]
pub struct MemoryLiveFeed {
    estimates: HashMap<StopId, Vec<LiveEstimate>>,
    latency: Option<Duration>,
    unavailable: bool,
    calls: AtomicUsize,
}

impl MemoryLiveFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_estimates(mut self, stop_id: StopId, estimates: Vec<LiveEstimate>) -> Self {
        self.estimates.insert(stop_id, estimates);
        self
    }

    /// Delay every answer by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail every call as if the upstream were down
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LiveFeed for MemoryLiveFeed {
    fn estimates<'a>(
        &'a self,
        stop_id: StopId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<LiveEstimate>>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }

            if self.unavailable {
                return Err(TransitError::Upstream("live feed unreachable".into()));
            }

            Ok(self.estimates.get(&stop_id).cloned().unwrap_or_default())
        })
    }
}
