//! Transit data models, types, and traits.

pub mod calendar;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use calendar::{ServiceCalendar, WeekdayFlags};
pub use traits::{ArrivalStore, RouteStore, ScheduleWriter, StopCoordinate, StopStore};
pub use types::{
    Arrival, ArrivalKind, LiveEstimate, NearbyStop, RealtimeEstimate, Result, Route,
    ScheduledArrival, Stop, TransitError,
};
