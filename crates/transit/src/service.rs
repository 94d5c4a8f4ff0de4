//! The three operations offered to request handlers, over shared stores.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::arrivals::{ArrivalEngine, ReconcileResponse, RouteNames};
use crate::config::EngineConfig;
use crate::identifiers::StopId;
use crate::models::traits::{ArrivalStore, RouteStore, ScheduleWriter, StopStore};
use crate::models::types::*;
use crate::network::traits::{FeedSource, LiveFeed, PlatformSource};
use crate::provider::MemoryCache;
use crate::schedule::{import_platforms, rebuild_schedule, IngestReport, PlatformReport, RouteIdMapping};
use crate::spatial::StopFinder;

/// Parse a comma separated stop list such as `"13309,10042"`
pub fn parse_stop_list(value: &str) -> Result<Vec<StopId>> {
    let ids = value
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| part.parse::<StopId>())
        .collect::<Result<Vec<StopId>>>()?;

    if ids.is_empty() {
        return Err(TransitError::InvalidInput("no stops requested".into()));
    }
    Ok(ids)
}

/// Every backing store the service reads or writes
pub struct Stores {
    pub arrivals: Arc<dyn ArrivalStore>,
    pub routes: Arc<dyn RouteStore>,
    pub stops: Arc<dyn StopStore>,
    pub writer: Arc<dyn ScheduleWriter>,
}

impl Stores {
    /// All four roles served by one store
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: ArrivalStore + RouteStore + StopStore + ScheduleWriter + 'static,
    {
        Self {
            arrivals: store.clone(),
            routes: store.clone(),
            stops: store.clone(),
            writer: store,
        }
    }
}

pub struct TransitService {
    engine: ArrivalEngine,
    route_names: Arc<RouteNames>,
    finder: StopFinder,
    stores: Stores,
}

impl TransitService {
    /// Build a service whose caches live in process memory
    pub fn new(stores: Stores, live: Arc<dyn LiveFeed>, config: EngineConfig) -> Self {
        let route_names = Arc::new(RouteNames::new(
            stores.routes.clone(),
            Arc::new(MemoryCache::new()),
        ));
        let engine = ArrivalEngine::new(
            stores.arrivals.clone(),
            live,
            route_names.clone(),
            Arc::new(MemoryCache::new()),
            config.clone(),
        );
        let finder = StopFinder::new(
            stores.stops.clone(),
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryCache::new()),
            config.stop_lookup_concurrency,
        );

        Self {
            engine,
            route_names,
            finder,
            stores,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    /// Upcoming arrivals at each stop, at `at` or now
    pub async fn reconcile(
        &self,
        stop_ids: &[StopId],
        at: Option<DateTime<Utc>>,
    ) -> Result<ReconcileResponse> {
        self.engine.reconcile(stop_ids, at).await
    }

    /// Stops within `radius_m` meters, nearest first
    pub async fn nearby(&self, lat: f64, lon: f64, radius_m: f64) -> Result<Vec<NearbyStop>> {
        self.finder.nearby(lat, lon, radius_m).await
    }

    /// Create and update stops and route paths from the operator's route
    /// patterns. Run before [`rebuild_schedule`](Self::rebuild_schedule) so
    /// arrivals at newly created stops are kept.
    pub async fn import_platforms(&self, source: &dyn PlatformSource) -> Result<PlatformReport> {
        let report = import_platforms(
            source,
            self.stores.stops.as_ref(),
            self.stores.routes.as_ref(),
            self.stores.writer.as_ref(),
        )
        .await?;

        self.route_names.invalidate();
        self.finder.invalidate();
        info!(%report, "stop caches invalidated after platform import");

        Ok(report)
    }

    /// Replace the stored schedule with one built from `source`.
    ///
    /// On success the memoized schedules, route names and stop index are
    /// dropped so the next requests see the new data.
    pub async fn rebuild_schedule(
        &self,
        source: &dyn FeedSource,
        mapping: &RouteIdMapping,
    ) -> Result<IngestReport> {
        let report = rebuild_schedule(
            source,
            mapping,
            self.stores.stops.as_ref(),
            self.stores.routes.as_ref(),
            self.stores.writer.as_ref(),
        )
        .await?;

        self.engine.invalidate_schedules();
        self.route_names.invalidate();
        self.finder.invalidate();
        info!(%report, "caches invalidated after rebuild");

        Ok(report)
    }
}
