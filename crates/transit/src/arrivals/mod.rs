//! Arrival reconciliation: scheduled slots merged with live predictions.

pub mod engine;
pub mod merge;
pub mod route_names;
pub mod window;

pub use engine::{ArrivalEngine, ReconcileResponse};
pub use route_names::RouteNames;
