//! Pluggable upstream and cache traits.
//!
//! External crates implement these to provide live predictions, feed
//! downloads and a fast cache.

use std::future::Future;
use std::pin::Pin;

use crate::identifiers::StopId;
use crate::models::types::{LiveEstimate, Result};
use crate::schedule::feed::FeedBundle;
use crate::schedule::platforms::PlatformBundle;

/// Live arrival predictions for a stop
///
/// Must only be queried for instants inside the upstream's prediction
/// horizon; the engine enforces this before calling.
pub trait LiveFeed: Send + Sync {
    /// Current predictions at `stop_id`, in no particular order.
    ///
    /// An empty result is normal outside the upstream update cycle.
    fn estimates<'a>(
        &'a self,
        stop_id: StopId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<LiveEstimate>>> + Send + 'a>>;
}

/// Source of already-decoded feed tables
pub trait FeedSource: Send + Sync {
    /// Fetch every table needed for a schedule build.
    ///
    /// Failing here fails the whole ingestion run.
    fn fetch<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<FeedBundle>> + Send + 'a>>;
}

/// Source of route patterns and platform geometry
pub trait PlatformSource: Send + Sync {
    /// Fetch every pattern and platform record.
    ///
    /// Failing here fails the whole import run.
    fn fetch_platforms<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<PlatformBundle>> + Send + 'a>>;
}

/// Fast key-value cache
pub trait Cache<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;

    fn set(&self, key: &str, value: V);

    fn remove(&self, key: &str);

    /// Drop every entry
    fn clear(&self);
}
