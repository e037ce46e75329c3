pub const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
  cache_key TEXT PRIMARY KEY,
  fingerprint TEXT NOT NULL,
  role TEXT NOT NULL,
  payload TEXT NOT NULL,
  created_at INTEGER NOT NULL,
  expires_at INTEGER NOT NULL,
  source_mtimes TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_fingerprint ON cache_entries(fingerprint);
CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at ON cache_entries(expires_at);
"#;
