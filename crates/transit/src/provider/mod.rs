//! In-memory implementations of the store, feed and cache traits.

pub mod cache;
pub mod memory;

pub use cache::{Generation, MemoryCache};
pub use memory::{MemoryLiveFeed, MemoryTransitStore};
