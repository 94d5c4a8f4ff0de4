//! Spatial indexing and query utilities.

pub mod index;
pub mod nearby;
pub mod queries;

pub use index::GeohashIndex;
pub use nearby::StopFinder;
pub use queries::haversine_distance;
