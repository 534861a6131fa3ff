//! Disk-backed result cache with per-entry TTL
//!
//! Provides a `ResultCache` that stores opaque payloads as JSON files, one per
//! key. Writes go to a temporary file in the cache directory and are renamed
//! into place, so readers only ever see a complete entry or none at all.
//! Expiry is checked lazily on read; [`ResultCache::sweep`] reclaims space.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::key::CacheKey;

/// Extension of published entries
const ENTRY_EXTENSION: &str = "json";

/// Suffix of in-flight temporary files; never read as entries
const TEMP_SUFFIX: &str = ".tmp";

/// Temp files older than this are treated as abandoned by [`ResultCache::sweep`]
const TEMP_GRACE: Duration = Duration::from_secs(60 * 60);

/// Errors that can occur while reading or writing the cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem operation failed
    #[error("Cache I/O failed: {0}")]
    Io(#[from] io::Error),

    /// Entry could not be encoded or decoded
    #[error("Cache entry is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entry decoded but its payload is unusable
    #[error("Cache entry is corrupt: {0}")]
    Corrupt(String),

    /// The blocking I/O task panicked or was cancelled
    #[error("Cache task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result of a cache read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// A valid, unexpired payload
    Hit(Vec<u8>),
    /// Absent, expired, or unreadable
    Miss,
}

impl CacheLookup {
    pub fn into_option(self) -> Option<Vec<u8>> {
        match self {
            CacheLookup::Hit(payload) => Some(payload),
            CacheLookup::Miss => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }
}

/// Counts from one [`ResultCache::sweep`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Valid entries left in place
    pub kept: usize,
    /// Expired entries deleted
    pub expired_removed: usize,
    /// Unparseable entries deleted
    pub corrupt_removed: usize,
    /// Abandoned temporary files deleted
    pub temp_removed: usize,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.expired_removed + self.corrupt_removed + self.temp_removed
    }
}

/// Source of the current time for expiry checks
pub trait Clock: fmt::Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Entry as stored on disk
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    /// Full key, checked on read to rule out digest collisions
    key: String,
    /// When the entry was written
    created_at: DateTime<Utc>,
    /// Lifetime in milliseconds
    ttl_ms: u64,
    /// Base64 of the opaque payload
    payload: String,
}

impl CacheEntry {
    /// `None` when the expiry is beyond the representable range
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        let ttl = chrono::Duration::try_milliseconds(i64::try_from(self.ttl_ms).ok()?)?;
        self.created_at.checked_add_signed(ttl)
    }

    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map_or(true, |expires_at| now < expires_at)
    }
}

/// Stores and retrieves cached results on disk
///
/// Cloning is cheap; clones share the same directory. All blocking I/O runs on
/// tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct ResultCache {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
    /// TTL applied by [`ResultCache::set`]
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    /// Creates a cache rooted at `cache_dir`; the directory is created on first write
    pub fn new(cache_dir: impl Into<PathBuf>, default_ttl: Duration) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            default_ttl,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used for timestamps and expiry checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Platform cache directory for versebot (`~/.cache/versebot/` on Linux)
    ///
    /// Returns `None` if the directory cannot be determined (e.g., no home directory).
    pub fn default_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "versebot").map(|dirs| dirs.cache_dir().to_path_buf())
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns the path to the cache file for the given key
    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", key.digest(), ENTRY_EXTENSION))
    }

    /// Reads a payload
    ///
    /// Never fails: missing, expired, unreadable and corrupt entries are all a
    /// [`CacheLookup::Miss`]. Failures are logged.
    pub async fn get(&self, key: &CacheKey) -> CacheLookup {
        let path = self.entry_path(key);
        let expected_key = key.as_str().to_string();
        let now = self.clock.now();

        let result = tokio::task::spawn_blocking(move || read_entry(&path, &expected_key, now))
            .await
            .map_err(CacheError::from)
            .and_then(|inner| inner);

        match result {
            Ok(Some(payload)) => {
                debug!(key = %key, "cache hit");
                CacheLookup::Hit(payload)
            }
            Ok(None) => {
                debug!(key = %key, "cache miss");
                CacheLookup::Miss
            }
            Err(error) => {
                warn!(key = %key, %error, "cache read failed, treating as miss");
                CacheLookup::Miss
            }
        }
    }

    /// Writes a payload with the default TTL
    pub async fn set(&self, key: &CacheKey, payload: &[u8]) -> Result<(), CacheError> {
        self.set_with_ttl(key, payload, self.default_ttl).await
    }

    /// Writes a payload, fully replacing any existing entry for `key`
    ///
    /// The entry becomes visible atomically once the write has been flushed to
    /// disk. If the returned future is dropped, a partial write is never
    /// published under the real key.
    pub async fn set_with_ttl(
        &self,
        key: &CacheKey,
        payload: &[u8],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry {
            key: key.as_str().to_string(),
            created_at: self.clock.now(),
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
            payload: STANDARD.encode(payload),
        };
        let json = serde_json::to_vec(&entry)?;
        let dir = self.cache_dir.clone();
        let path = self.entry_path(key);

        let result = tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &json))
            .await
            .map_err(CacheError::from)
            .and_then(|inner| inner);

        match &result {
            Ok(()) => debug!(key = %key, ttl_secs = ttl.as_secs(), "cache entry written"),
            Err(error) => warn!(key = %key, %error, "cache write failed"),
        }
        result
    }

    /// Deletes expired and corrupt entries plus abandoned temporary files
    pub async fn sweep(&self) -> Result<SweepReport, CacheError> {
        let dir = self.cache_dir.clone();
        let now = self.clock.now();
        tokio::task::spawn_blocking(move || sweep_dir(&dir, now)).await?
    }
}

fn read_entry(
    path: &Path,
    expected_key: &str,
    now: DateTime<Utc>,
) -> Result<Option<Vec<u8>>, CacheError> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error.into()),
    };
    let entry: CacheEntry = serde_json::from_slice(&content)?;

    if entry.key != expected_key {
        debug!(path = %path.display(), "cache file belongs to a different key");
        return Ok(None);
    }
    if !entry.is_valid_at(now) {
        return Ok(None);
    }

    STANDARD
        .decode(entry.payload.as_bytes())
        .map(Some)
        .map_err(|e| CacheError::Corrupt(e.to_string()))
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    fs::create_dir_all(dir)?;

    // The temp file deletes itself on drop unless persisted
    let mut temp = tempfile::Builder::new()
        .prefix(".entry-")
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| CacheError::Io(e.error))?;
    Ok(())
}

fn sweep_dir(dir: &Path, now: DateTime<Utc>) -> Result<SweepReport, CacheError> {
    let mut report = SweepReport::default();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(report),
        Err(error) => return Err(error.into()),
    };

    for dir_entry in entries {
        let path = dir_entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if name.ends_with(TEMP_SUFFIX) {
            if is_abandoned(&path) && remove_quietly(&path) {
                report.temp_removed += 1;
            }
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
            continue;
        }

        let seen = fingerprint(&path);
        let parsed = fs::read(&path)
            .ok()
            .and_then(|content| serde_json::from_slice::<CacheEntry>(&content).ok());
        match parsed {
            Some(entry) if entry.is_valid_at(now) => report.kept += 1,
            // A writer may have published a fresh entry since it was read
            _ if fingerprint(&path) != seen => report.kept += 1,
            Some(_) => {
                if remove_quietly(&path) {
                    report.expired_removed += 1;
                }
            }
            None => {
                if remove_quietly(&path) {
                    report.corrupt_removed += 1;
                }
            }
        }
    }

    debug!(dir = %dir.display(), ?report, "cache sweep finished");
    Ok(report)
}

/// Length and modification time, used to spot a file replaced under us
fn fingerprint(path: &Path) -> Option<(u64, SystemTime)> {
    let meta = fs::metadata(path).ok()?;
    Some((meta.len(), meta.modified().ok()?))
}

fn is_abandoned(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age >= TEMP_GRACE)
}

/// Another sweeper or writer may have removed the file first
fn remove_quietly(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(error) => {
            if error.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), %error, "failed to remove cache file");
            }
            false
        }
    }
}
