//! Fingerprint-keyed cache of parsed role results

pub mod key;
mod schema;
pub mod store;

pub use key::CacheKey;
pub use store::{
    file_mtime, CacheEntry, CacheError, CacheLookup, CacheStats, CacheStore, MissReason,
    SourceMtimes, DEFAULT_TTL,
};
