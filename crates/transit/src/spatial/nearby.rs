//! Radius search over stops.
//!
//! [`StopFinder`] owns the lazily built [`GeohashIndex`] and resolves the
//! stop ids it yields into full [`Stop`] records.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::identifiers::StopId;
use crate::models::traits::StopStore;
use crate::models::types::{NearbyStop, Result, Stop};
use crate::network::traits::Cache;
use crate::provider::Generation;
use crate::spatial::index::GeohashIndex;
use crate::spatial::queries::{validate_point, validate_radius};

/// Cache key under which the built index is kept
pub const INDEX_CACHE_KEY: &str = "stops:geohash";

pub fn stop_cache_key(id: StopId) -> String {
    format!("stop:{id}")
}

pub struct StopFinder {
    stops: Arc<dyn StopStore>,
    index_cache: Arc<dyn Cache<Arc<GeohashIndex>>>,
    stop_cache: Arc<dyn Cache<Stop>>,
    build_lock: Mutex<()>,
    generation: Generation,
    concurrency: usize,
}

impl StopFinder {
    pub fn new(
        stops: Arc<dyn StopStore>,
        index_cache: Arc<dyn Cache<Arc<GeohashIndex>>>,
        stop_cache: Arc<dyn Cache<Stop>>,
        concurrency: usize,
    ) -> Self {
        Self {
            stops,
            index_cache,
            stop_cache,
            build_lock: Mutex::new(()),
            generation: Generation::new(),
            concurrency: concurrency.max(1),
        }
    }

    /// The cached index, building it first if the cache is cold.
    ///
    /// Only one caller builds at a time; callers that queued behind the
    /// builder pick up its result. A failed coordinate scan caches nothing.
    pub async fn index(&self) -> Result<Arc<GeohashIndex>> {
        if let Some(index) = self.index_cache.get(INDEX_CACHE_KEY) {
            return Ok(index);
        }

        let _guard = self.build_lock.lock().await;
        if let Some(index) = self.index_cache.get(INDEX_CACHE_KEY) {
            debug!("stop index built by another caller");
            return Ok(index);
        }

        let seen = self.generation.current();
        let coordinates = self.stops.stop_coordinates().await?;
        let index = Arc::new(GeohashIndex::build(&coordinates));
        debug!(stops = index.len(), "built stop index");

        self.generation
            .memoize(self.index_cache.as_ref(), seen, INDEX_CACHE_KEY, index.clone());
        Ok(index)
    }

    /// Stops within `radius_m` meters of (`lat`, `lon`), nearest first
    pub async fn nearby(&self, lat: f64, lon: f64, radius_m: f64) -> Result<Vec<NearbyStop>> {
        let point = validate_point(lat, lon)?;
        let radius_m = validate_radius(radius_m)?;

        let index = self.index().await?;
        let hits = index.within(point, radius_m)?;

        let resolved: Vec<Option<NearbyStop>> = stream::iter(hits)
            .map(|(id, distance)| async move {
                self.resolve(id)
                    .await
                    .map(|stop| NearbyStop { stop, distance })
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut found: Vec<NearbyStop> = resolved.into_iter().flatten().collect();
        found.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(found)
    }

    /// Drop the cached index so the next query rebuilds it
    pub fn invalidate(&self) {
        self.generation.advance();
        self.index_cache.remove(INDEX_CACHE_KEY);
        self.stop_cache.clear();
    }

    async fn resolve(&self, id: StopId) -> Option<Stop> {
        let key = stop_cache_key(id);
        if let Some(stop) = self.stop_cache.get(&key) {
            return Some(stop);
        }

        let seen = self.generation.current();
        match self.stops.stops(std::slice::from_ref(&id)).await {
            Ok(mut found) => match found.pop() {
                Some(stop) => {
                    self.generation
                        .memoize(self.stop_cache.as_ref(), seen, &key, stop.clone());
                    Some(stop)
                }
                None => {
                    warn!(stop_id = %id, "indexed stop has no stop record, skipping");
                    None
                }
            },
            Err(e) => {
                warn!(stop_id = %id, error = %e, "failed to load stop record, skipping");
                None
            }
        }
    }
}
