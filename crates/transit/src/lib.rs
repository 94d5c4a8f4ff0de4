//! # corvallis-transit
//!
//! Next-bus answers for a small transit system.
//!
//! ## Features
//!
//! - **Arrival reconciliation**: Merge the published schedule with live predictions per stop
//! - **Stop lookup**: Radius queries over stops through a sorted geohash index
//! - **Schedule ingestion**: Build per-stop schedules from feed tables, interpolating between timepoints
//! - **Platform import**: Create stops and route paths from the operator's route patterns
//! - **Pluggable storage**: Stores, caches and upstreams are traits with in-memory implementations
//!
//! ## Example
//!
//! ```
//! use corvallis_transit::prelude::*;
//! use std::sync::Arc;
//!
//! # tokio_test_runtime(async {
//! let store = Arc::new(MemoryTransitStore::from_data(
//!     vec![Stop {
//!         id: StopId(13309),
//!         name: "Downtown Transit Center".into(),
//!         lat: 44.5646,
//!         lon: -123.2620,
//!         road: "NW Monroe Ave".into(),
//!         bearing: 90.0,
//!         adherence_point: true,
//!     }],
//!     vec![],
//! ));
//! let service = TransitService::new(
//!     Stores::shared(store),
//!     Arc::new(MemoryLiveFeed::new()),
//!     EngineConfig::default(),
//! );
//!
//! let nearby = service.nearby(44.5650, -123.2625, 500.0).await.unwrap();
//! assert_eq!(nearby[0].stop.id, StopId(13309));
//! # });
//! # fn tokio_test_runtime(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

pub mod arrivals;
pub mod config;
pub mod identifiers;
pub mod models;
pub mod network;
pub mod provider;
pub mod schedule;
pub mod service;
pub mod spatial;
pub mod time;

// Re-exports for convenience
pub mod prelude {
    pub use crate::arrivals::{ArrivalEngine, ReconcileResponse, RouteNames};
    pub use crate::config::EngineConfig;
    pub use crate::identifiers::*;
    pub use crate::models::calendar::{ServiceCalendar, WeekdayFlags};
    pub use crate::models::{traits::*, types::*};
    pub use crate::network::traits::*;
    pub use crate::provider::{MemoryCache, MemoryLiveFeed, MemoryTransitStore};
    pub use crate::schedule::{FeedBundle, IngestReport, PlatformBundle, PlatformReport, RouteIdMapping};
    pub use crate::service::{parse_stop_list, Stores, TransitService};
    pub use crate::spatial::{GeohashIndex, StopFinder};
}

pub use prelude::*;
