//! Upstream and cache abstractions.

pub mod traits;

pub use traits::{Cache, FeedSource, LiveFeed};
