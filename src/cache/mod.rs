//! Cache module for storing computed answers to disk
//!
//! This module provides a result cache that persists opaque payloads to the
//! filesystem with per-entry TTL values. Entries are published atomically and
//! expire lazily: an expired entry is simply a miss. Storage failures never
//! propagate to readers, so callers can treat the cache as a pure optimisation.

mod key;
mod manager;
mod sweep;

pub use key::CacheKey;
pub use manager::{CacheError, CacheLookup, Clock, ResultCache, SweepReport, SystemClock};
pub use sweep::{SweepConfig, SweepHandle, SweepMessage};
