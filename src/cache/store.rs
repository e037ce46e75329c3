//! SQLite-backed result cache
//!
//! One row per (fingerprint, role, model version). An entry is served only
//! while it is unexpired and every source file it recorded still has the
//! modification time it had when the entry was written.

use super::key::CacheKey;
use super::schema::CACHE_SCHEMA;
use crate::analysis::{ParsedResult, Role};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

/// Seven days
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cache payload error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache connection lock poisoned")]
    Poisoned,
    #[error("no user cache directory available")]
    NoCacheDir,
}

/// Recorded modification time per declared source path, in nanoseconds since
/// the epoch; `None` when the file did not exist at write time.
pub type SourceMtimes = BTreeMap<String, Option<i64>>;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub fingerprint: String,
    pub role: Role,
    pub payload: ParsedResult,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub source_mtimes: SourceMtimes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
    Absent,
    Expired,
    /// A recorded source file changed or disappeared
    Stale { path: String },
    /// The row exists but could not be decoded
    Corrupt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(Box<CacheEntry>),
    Miss(MissReason),
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    pub fn into_entry(self) -> Option<CacheEntry> {
        match self {
            CacheLookup::Hit(entry) => Some(*entry),
            CacheLookup::Miss(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: u64,
    pub expired: u64,
    pub by_role: BTreeMap<String, u64>,
    /// Lookups served by this handle since it was opened
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
}

#[derive(Clone)]
pub struct CacheStore {
    conn: Arc<Mutex<Connection>>,
    ttl: Duration,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl CacheStore {
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init_connection(&conn, true)?;
        debug!(path = %path.display(), "Opened cache store");
        Ok(Self::from_connection(conn))
    }

    pub fn memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn, false)?;
        Ok(Self::from_connection(conn))
    }

    /// `<user cache dir>/triagebox/cache.db`
    pub fn default_path() -> Result<PathBuf, CacheError> {
        let base = dirs::cache_dir().ok_or(CacheError::NoCacheDir)?;
        Ok(base.join("triagebox").join("cache.db"))
    }

    pub fn open_default() -> Result<Self, CacheError> {
        Self::open(&Self::default_path()?)
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            ttl: DEFAULT_TTL,
            counters: Arc::new(Counters::default()),
        }
    }

    fn init_connection(conn: &Connection, wal: bool) -> Result<(), CacheError> {
        if wal {
            // journal_mode returns a row, so query rather than execute
            let _: Result<String, _> =
                conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0));
        }
        conn.execute_batch(CACHE_SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }

    pub fn get(&self, key: &CacheKey) -> Result<CacheLookup, CacheError> {
        self.get_at(key, Utc::now())
    }

    /// Lookup as of `now`
    pub fn get_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Result<CacheLookup, CacheError> {
        let lookup = self.lookup(key, now)?;
        let counter = if lookup.is_hit() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if let CacheLookup::Miss(reason) = &lookup {
            debug!(key = %key, ?reason, "Cache miss");
        }
        Ok(lookup)
    }

    fn lookup(&self, key: &CacheKey, now: DateTime<Utc>) -> Result<CacheLookup, CacheError> {
        let digest = key.digest();
        let row: Option<(String, String, i64, i64, String)> = {
            let conn = self.lock()?;
            conn.query_row(
                r#"
                SELECT fingerprint, payload, created_at, expires_at, source_mtimes
                FROM cache_entries WHERE cache_key = ?1
                "#,
                [&digest],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()?
        };

        let Some((fingerprint, payload, created_at, expires_at, source_mtimes)) = row else {
            return Ok(CacheLookup::Miss(MissReason::Absent));
        };

        if now.timestamp_millis() > expires_at {
            return Ok(CacheLookup::Miss(MissReason::Expired));
        }

        let decoded = serde_json::from_str::<ParsedResult>(&payload).and_then(|payload| {
            serde_json::from_str::<SourceMtimes>(&source_mtimes).map(|m| (payload, m))
        });
        let (payload, source_mtimes) = match decoded {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(key = %key, "Discarding undecodable cache entry: {}", e);
                return Ok(CacheLookup::Miss(MissReason::Corrupt));
            }
        };

        for (path, recorded) in &source_mtimes {
            if file_mtime(Path::new(path)) != *recorded {
                return Ok(CacheLookup::Miss(MissReason::Stale { path: path.clone() }));
            }
        }

        Ok(CacheLookup::Hit(Box::new(CacheEntry {
            key: digest,
            fingerprint,
            role: key.role,
            payload,
            created_at: from_millis(created_at),
            expires_at: from_millis(expires_at),
            source_mtimes,
        })))
    }

    /// Upserts an entry. Last writer wins.
    ///
    /// `source_files` maps each declared path to the mtime (ns) the caller
    /// expects it to have; `None` records whatever is on disk right now. An
    /// expectation that already disagrees with the disk makes the entry stale
    /// on its first lookup.
    pub fn put(
        &self,
        key: &CacheKey,
        payload: &ParsedResult,
        source_files: &BTreeMap<PathBuf, Option<i64>>,
    ) -> Result<(), CacheError> {
        self.put_at(key, payload, source_files, Utc::now())
    }

    pub fn put_at(
        &self,
        key: &CacheKey,
        payload: &ParsedResult,
        source_files: &BTreeMap<PathBuf, Option<i64>>,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let mtimes: SourceMtimes = source_files
            .iter()
            .map(|(path, declared)| {
                let recorded = (*declared).or_else(|| file_mtime(path));
                (path.to_string_lossy().into_owned(), recorded)
            })
            .collect();
        let created_at = now.timestamp_millis();
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = created_at.saturating_add(ttl_ms);

        let payload_json = serde_json::to_string(payload)?;
        let mtimes_json = serde_json::to_string(&mtimes)?;

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO cache_entries
              (cache_key, fingerprint, role, payload, created_at, expires_at, source_mtimes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(cache_key) DO UPDATE SET
              fingerprint = excluded.fingerprint,
              role = excluded.role,
              payload = excluded.payload,
              created_at = excluded.created_at,
              expires_at = excluded.expires_at,
              source_mtimes = excluded.source_mtimes
            "#,
            params![
                key.digest(),
                key.fingerprint,
                key.role.as_str(),
                payload_json,
                created_at,
                expires_at,
                mtimes_json
            ],
        )?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, files = mtimes.len(), "Cached result");
        Ok(())
    }

    /// Removes every entry; returns how many were deleted
    pub fn clear_all(&self) -> Result<usize, CacheError> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM cache_entries", [])?)
    }

    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = Utc::now().timestamp_millis();
        let conn = self.lock()?;
        Ok(conn.execute(
            "DELETE FROM cache_entries WHERE expires_at < ?1",
            [now],
        )?)
    }

    /// Drops every role's entry for a fingerprint
    pub fn invalidate_fingerprint(&self, fingerprint: &str) -> Result<usize, CacheError> {
        let conn = self.lock()?;
        Ok(conn.execute(
            "DELETE FROM cache_entries WHERE fingerprint = ?1",
            [fingerprint],
        )?)
    }

    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let now = Utc::now().timestamp_millis();
        let conn = self.lock()?;

        let entries: i64 =
            conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
        let expired: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE expires_at < ?1",
            [now],
            |row| row.get(0),
        )?;

        let mut by_role = BTreeMap::new();
        let mut stmt =
            conn.prepare("SELECT role, COUNT(*) FROM cache_entries GROUP BY role ORDER BY role")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (role, count) = row?;
            by_role.insert(role, count as u64);
        }

        Ok(CacheStats {
            entries: entries as u64,
            expired: expired as u64,
            by_role,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
        })
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("ttl", &self.ttl)
            .field("hits", &self.counters.hits.load(Ordering::Relaxed))
            .field("misses", &self.counters.misses.load(Ordering::Relaxed))
            .finish()
    }
}

/// Modification time in nanoseconds since the epoch, if the file exists
pub fn file_mtime(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(since_epoch.as_nanos()).ok()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}
