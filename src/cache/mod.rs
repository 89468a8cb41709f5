//! Fingerprint caching module for photodupe.
//!
//! Decoding an image is by far the most expensive step of a scan, so every
//! fingerprint is persisted and reused on later runs.
//!
//! # Architecture
//!
//! * [`entry`]: The [`HashRecord`] stored per image.
//! * [`database`]: The [`RecordStore`] persistence trait and its SQLite
//!   implementation, [`HashCache`].
//! * [`store`]: [`HashStore`], which validates records against file
//!   modification times and recomputes stale ones.
//!
//! # Cache Invalidation
//!
//! A record is keyed by absolute path and trusted only while the stored
//! modification time (epoch milliseconds) equals the file's current one.
//! Content changes that preserve the timestamp go unnoticed.

pub mod database;
pub mod entry;
pub mod store;

pub use database::{CacheError, CacheResult, HashCache, RecordStore};
pub use entry::{HashRecord, MAX_IDENTITY_LEN};
pub use store::{
    system_time_to_millis, CacheStatus, Fetched, HashStore, HashStoreError, WarmOptions,
    WarmSummary,
};
