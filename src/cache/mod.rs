// src/cache/mod.rs

//! Cache store: a versioned JSON snapshot of the graph next to the main
//! source, reused across process restarts.

pub mod snapshot;
pub mod store;

pub use snapshot::{CACHE_VERSION, CacheSnapshot, CachedEdge, CachedFile, CachedRule};
pub use store::{load, remove, save, validate};
