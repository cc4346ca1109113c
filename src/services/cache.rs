use crate::schema::CatalogOption;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

pub const DEFAULT_TTL_HOURS: i64 = 24;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    timestamp: String,
    data: JsonValue,
}

type CacheFile = BTreeMap<String, CacheEntry>;

/// Catalog lists persisted to a JSON file and shared by every dialog of the
/// process. Each operation is a load/mutate/save cycle under one lock, so
/// parallel loader threads never interleave partial writes.
pub struct OptionCache {
    path: PathBuf,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl OptionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            ttl: TimeDelta::hours(DEFAULT_TTL_HOURS),
            clock,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        match self.lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Fresh entry for `key`, or `None` on a miss (absent, expired, or not a
    /// list of options).
    pub fn get(&self, key: &str) -> Option<Vec<CatalogOption>> {
        let _g = self.guard();
        let file = self.load();
        let entry = file.get(key)?;
        let stored = match DateTime::parse_from_rfc3339(&entry.timestamp) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                tracing::debug!(key, error = %e, "cache entry has an unreadable timestamp");
                return None;
            }
        };
        if stored + self.ttl <= self.clock.now() {
            tracing::debug!(key, "cache entry expired");
            return None;
        }
        serde_json::from_value(entry.data.clone()).ok()
    }

    pub fn put(&self, key: &str, options: &[CatalogOption]) {
        let data = match serde_json::to_value(options) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, error = %e, "could not encode cache entry");
                return;
            }
        };
        let _g = self.guard();
        let mut file = self.load();
        file.insert(
            key.to_string(),
            CacheEntry {
                timestamp: self.clock.now().to_rfc3339(),
                data,
            },
        );
        self.save(&file);
    }

    pub fn invalidate(&self, key: &str) {
        let _g = self.guard();
        let mut file = self.load();
        if file.remove(key).is_some() {
            self.save(&file);
        }
    }

    pub fn clear(&self) {
        let _g = self.guard();
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %e, "could not clear cache");
            }
        }
    }

    fn load(&self) -> CacheFile {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CacheFile::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not read cache");
                return CacheFile::new();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "discarding corrupt cache");
            CacheFile::new()
        })
    }

    fn save(&self, file: &CacheFile) {
        let result = (|| -> std::io::Result<()> {
            if let Some(dir) = self.path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let text = serde_json::to_string_pretty(file)?;
            let tmp = self.path.with_extension("json.tmp");
            std::fs::write(&tmp, text)?;
            std::fs::rename(&tmp, &self.path)
        })();
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "could not write cache");
        }
    }
}
