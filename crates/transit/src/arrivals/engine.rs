//! Multi-stop arrival reconciliation.
//!
//! Each requested stop is reconciled in its own task. A task loads the
//! stop's schedule for the target weekday and, when the target instant is
//! close enough to now, the live predictions for the stop. Both loads run
//! concurrently and are merged once both finish. Tasks return their result
//! instead of writing into shared state; the caller collects them until the
//! request deadline passes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc, Weekday};
use chrono_tz::Tz;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info_span, warn, Instrument};

use crate::arrivals::merge::{merge, project_estimates};
use crate::arrivals::route_names::RouteNames;
use crate::arrivals::window::boundary_window;
use crate::config::EngineConfig;
use crate::identifiers::StopId;
use crate::models::traits::ArrivalStore;
use crate::models::types::*;
use crate::network::traits::{Cache, LiveFeed};
use crate::provider::Generation;
use crate::time::{instant_at_offset, offset_since_midnight};

pub fn schedule_cache_key(stop_id: StopId, weekday: Weekday) -> String {
    format!("arrivals:{stop_id}:{weekday}")
}

/// Result of one multi-stop reconciliation
#[derive(Clone, Debug, Default)]
pub struct ReconcileResponse {
    /// Arrivals per stop, soonest first
    pub arrivals: BTreeMap<StopId, Vec<Arrival>>,
    /// Stops whose schedule could not be loaded
    pub failed: BTreeMap<StopId, TransitError>,
    /// Stops still running when the deadline passed
    pub incomplete: BTreeSet<StopId>,
}

impl ReconcileResponse {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.incomplete.is_empty()
    }
}

struct EngineInner {
    arrivals: Arc<dyn ArrivalStore>,
    live: Arc<dyn LiveFeed>,
    route_names: Arc<RouteNames>,
    schedule_cache: Arc<dyn Cache<Arc<Vec<ScheduledArrival>>>>,
    schedule_generation: Generation,
    config: EngineConfig,
}

/// Reconciles scheduled arrivals with live predictions
///
/// This type is cheap to clone; clones share stores and caches.
#[derive(Clone)]
pub struct ArrivalEngine {
    inner: Arc<EngineInner>,
}

impl ArrivalEngine {
    pub fn new(
        arrivals: Arc<dyn ArrivalStore>,
        live: Arc<dyn LiveFeed>,
        route_names: Arc<RouteNames>,
        schedule_cache: Arc<dyn Cache<Arc<Vec<ScheduledArrival>>>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                arrivals,
                live,
                route_names,
                schedule_cache,
                schedule_generation: Generation::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Reconcile `stop_ids` at `at`, or at the current time when `None`
    pub async fn reconcile(
        &self,
        stop_ids: &[StopId],
        at: Option<DateTime<Utc>>,
    ) -> Result<ReconcileResponse> {
        let now = Utc::now();
        self.reconcile_at(stop_ids, at.unwrap_or(now), now).await
    }

    /// Reconcile `stop_ids` at `target`, treating `now` as the current time.
    ///
    /// Failing stops are reported in the response rather than failing the
    /// call. Only an empty stop list is an error.
    pub async fn reconcile_at(
        &self,
        stop_ids: &[StopId],
        target: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ReconcileResponse> {
        if stop_ids.is_empty() {
            return Err(TransitError::InvalidInput("no stops requested".into()));
        }

        let config = &self.inner.config;
        let horizon = chrono::Duration::from_std(config.live_horizon)
            .map_err(|e| TransitError::InvalidInput(format!("live horizon out of range: {e}")))?;
        let live_eligible = target >= now && target < now + horizon;

        let target = target.with_timezone(&config.timezone);
        let now = now.with_timezone(&config.timezone);

        let mut pending: BTreeSet<StopId> = stop_ids.iter().copied().collect();
        let permits = Arc::new(Semaphore::new(config.max_concurrent_stops.max(1)));
        let mut tasks = JoinSet::new();

        for &stop_id in &pending {
            let inner = self.inner.clone();
            let permits = permits.clone();
            let span = info_span!("reconcile_stop", stop_id = %stop_id);

            tasks.spawn(
                async move {
                    let _permit = permits.acquire_owned().await;
                    let result = inner.reconcile_stop(stop_id, target, now, live_eligible).await;
                    (stop_id, result)
                }
                .instrument(span),
            );
        }

        let deadline = tokio::time::Instant::now() + config.request_deadline;
        let mut response = ReconcileResponse::default();

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((stop_id, result)))) => {
                    pending.remove(&stop_id);
                    match result {
                        Ok(arrivals) => {
                            response.arrivals.insert(stop_id, arrivals);
                        }
                        Err(e) => {
                            warn!(stop_id = %stop_id, error = %e, "stop reconciliation failed");
                            response.failed.insert(stop_id, e);
                        }
                    }
                }
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "reconciliation task aborted");
                }
                Ok(None) => {
                    for stop_id in std::mem::take(&mut pending) {
                        response
                            .failed
                            .insert(stop_id, TransitError::Store("reconciliation task aborted".into()));
                    }
                    break;
                }
                Err(_) => {
                    warn!(remaining = pending.len(), "request deadline passed");
                    tasks.abort_all();
                    response.incomplete = pending;
                    break;
                }
            }
        }

        Ok(response)
    }

    /// Forget every memoized per-stop schedule, including those still
    /// being loaded
    pub fn invalidate_schedules(&self) {
        self.inner.schedule_generation.advance();
        self.inner.schedule_cache.clear();
    }
}

impl EngineInner {
    async fn reconcile_stop(
        &self,
        stop_id: StopId,
        target: DateTime<Tz>,
        now: DateTime<Tz>,
        live_eligible: bool,
    ) -> Result<Vec<Arrival>> {
        let (schedule, estimates) = tokio::join!(
            self.schedule(stop_id, target.weekday()),
            self.live_estimates(stop_id, &target, &now, live_eligible),
        );
        let schedule = schedule?;

        let window = boundary_window(&schedule, offset_since_midnight(&target));
        let late_tolerance = u32::try_from(self.config.late_tolerance.as_secs()).unwrap_or(u32::MAX);
        let merged = merge(window, &estimates, late_tolerance);

        let date = target.date_naive();
        let tz = self.config.timezone;
        let mut arrivals = Vec::with_capacity(merged.len());
        for entry in merged {
            arrivals.push(Arrival {
                route: self.route_names.resolve(&entry.route_id).await,
                scheduled: instant_at_offset(date, entry.scheduled, tz),
                expected: instant_at_offset(date, entry.expected, tz),
            });
        }

        debug!(
            scheduled = window.len(),
            live = estimates.len(),
            arrivals = arrivals.len(),
            "stop reconciled"
        );
        Ok(arrivals)
    }

    /// Schedule for one stop and weekday, memoized
    async fn schedule(&self, stop_id: StopId, weekday: Weekday) -> Result<Arc<Vec<ScheduledArrival>>> {
        let key = schedule_cache_key(stop_id, weekday);
        if let Some(schedule) = self.schedule_cache.get(&key) {
            debug!(key = %key, "schedule cache hit");
            return Ok(schedule);
        }

        let seen = self.schedule_generation.current();
        let schedule = Arc::new(self.arrivals.scheduled_arrivals(stop_id, weekday).await?);
        if !self
            .schedule_generation
            .memoize(self.schedule_cache.as_ref(), seen, &key, schedule.clone())
        {
            debug!(key = %key, "schedule invalidated while loading, not memoized");
        }
        Ok(schedule)
    }

    /// Live predictions, or nothing when the target is outside the live
    /// horizon or the feed fails
    async fn live_estimates(
        &self,
        stop_id: StopId,
        target: &DateTime<Tz>,
        now: &DateTime<Tz>,
        eligible: bool,
    ) -> Vec<RealtimeEstimate> {
        if !eligible {
            return Vec::new();
        }

        match tokio::time::timeout(self.config.live_timeout, self.live.estimates(stop_id)).await {
            Ok(Ok(live)) => project_estimates(live, target, now),
            Ok(Err(e)) => {
                warn!(error = %e, "live feed failed, using schedule only");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.live_timeout.as_millis() as u64,
                    "live feed timed out, using schedule only"
                );
                Vec::new()
            }
        }
    }
}
