//! Offline ingestion of the published feed into stops, routes and per-stop
//! schedules.

pub mod builder;
pub mod feed;
pub mod platforms;

pub use builder::{build_schedule, rebuild_schedule, BuiltSchedule, IngestReport, SkipCounts};
pub use feed::{FeedBundle, FeedRoute, FeedStopTime, FeedTrip, RouteIdMapping};
pub use platforms::{
    build_platforms, import_platforms, BuiltPlatforms, PatternPlatform, PlatformBundle,
    PlatformDetail, PlatformReport, RoutePattern,
};
