//! Persistent cache mapping free user text to canonical tickers.
//!
//! Backed by a single JSON file so a resolved name ("tata consumer" →
//! TATACONSUM) survives restarts and avoids repeat web searches. Entries
//! expire after 30 days and are pruned lazily on lookup.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const MAX_AGE_DAYS: i64 = 30;

/// Confidence level of a cached resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheConfidence {
    High,
    Medium,
    Low,
}

/// Where a cached resolution came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheSource {
    Google,
    TradingView,
    User,
}

/// One cached symbol resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSymbol {
    pub user_text: String,
    pub canonical_symbol: String,
    pub confidence: CacheConfidence,
    pub source: CacheSource,
    pub timestamp: DateTime<Utc>,
}

impl CachedSymbol {
    pub fn is_expired(&self) -> bool {
        Utc::now() - self.timestamp > Duration::days(MAX_AGE_DAYS)
    }
}

/// Cache statistics for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub by_source: HashMap<String, usize>,
    pub by_confidence: HashMap<String, usize>,
    pub cache_file: String,
}

/// JSON-file backed symbol cache.
///
/// Writes go through write-then-rename so a crash mid-save never leaves a
/// truncated cache. A malformed file resets to empty with a warning; it is
/// never a hard error.
pub struct SymbolMemory {
    path: PathBuf,
    entries: HashMap<String, CachedSymbol>,
}

impl SymbolMemory {
    pub fn open(path: impl AsRef<Path>) -> SymbolMemory {
        let path = path.as_ref().to_path_buf();
        let entries = Self::load(&path);
        info!(entries = entries.len(), path = %path.display(), "symbol cache loaded");
        SymbolMemory { path, entries }
    }

    fn load(path: &Path) -> HashMap<String, CachedSymbol> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return HashMap::new(),
        };
        match serde_json::from_str::<HashMap<String, CachedSymbol>>(&raw) {
            Ok(entries) => entries
                .into_iter()
                .filter(|(_, cached)| !cached.is_expired())
                .collect(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed symbol cache, resetting");
                HashMap::new()
            }
        }
    }

    fn persist(&self) {
        let tmp = self.path.with_extension("json.tmp");
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = fs::create_dir_all(parent);
            }
        }
        let serialized = match serde_json::to_string_pretty(&self.entries) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to serialize symbol cache");
                return;
            }
        };
        if let Err(e) = fs::write(&tmp, serialized).and_then(|_| fs::rename(&tmp, &self.path)) {
            warn!(path = %self.path.display(), error = %e, "failed to save symbol cache");
        } else {
            debug!(entries = self.entries.len(), "symbol cache saved");
        }
    }

    fn key(user_text: &str) -> String {
        user_text.trim().to_lowercase()
    }

    /// Look up a resolution. Expired hits are deleted and report a miss.
    pub fn lookup(&mut self, user_text: &str) -> Option<CachedSymbol> {
        let key = Self::key(user_text);
        match self.entries.get(&key) {
            Some(cached) if cached.is_expired() => {
                debug!(%user_text, symbol = %cached.canonical_symbol, "cache hit but expired");
                self.entries.remove(&key);
                self.persist();
                None
            }
            Some(cached) => {
                info!(%user_text, symbol = %cached.canonical_symbol, "symbol cache hit");
                Some(cached.clone())
            }
            None => None,
        }
    }

    /// Upsert a resolution and persist immediately
    pub fn store(
        &mut self,
        user_text: &str,
        canonical_symbol: &str,
        confidence: CacheConfidence,
        source: CacheSource,
    ) {
        let cached = CachedSymbol {
            user_text: user_text.to_string(),
            canonical_symbol: canonical_symbol.to_string(),
            confidence,
            source,
            timestamp: Utc::now(),
        };
        info!(%user_text, symbol = %canonical_symbol, ?source, "symbol cache store");
        self.entries.insert(Self::key(user_text), cached);
        self.persist();
    }

    pub fn invalidate(&mut self, user_text: &str) {
        if self.entries.remove(&Self::key(user_text)).is_some() {
            info!(%user_text, "symbol cache invalidate");
            self.persist();
        }
    }

    /// Drop every expired entry
    pub fn clear_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, cached| !cached.is_expired());
        let removed = before - self.entries.len();
        if removed > 0 {
            info!(removed, "cleared expired symbol cache entries");
            self.persist();
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let mut by_source = HashMap::new();
        let mut by_confidence = HashMap::new();
        for cached in self.entries.values() {
            *by_source
                .entry(format!("{:?}", cached.source).to_uppercase())
                .or_insert(0) += 1;
            *by_confidence
                .entry(format!("{:?}", cached.confidence).to_uppercase())
                .or_insert(0) += 1;
        }
        CacheStats {
            total_entries: self.entries.len(),
            by_source,
            by_confidence,
            cache_file: self.path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn memory_in(dir: &tempfile::TempDir) -> SymbolMemory {
        SymbolMemory::open(dir.path().join("symbol_cache.json"))
    }

    #[test]
    fn test_store_then_lookup_round_trip() {
        let dir = tempdir().unwrap();
        let mut memory = memory_in(&dir);

        memory.store(
            "tata consumer",
            "TATACONSUM",
            CacheConfidence::High,
            CacheSource::Google,
        );

        let hit = memory.lookup("Tata Consumer ").unwrap();
        assert_eq!(hit.canonical_symbol, "TATACONSUM");
        assert_eq!(hit.source, CacheSource::Google);
    }

    #[test]
    fn test_lookup_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut memory = memory_in(&dir);
            memory.store("yesbank", "YESBANK", CacheConfidence::High, CacheSource::TradingView);
        }
        let mut reopened = memory_in(&dir);
        assert_eq!(
            reopened.lookup("yesbank").unwrap().canonical_symbol,
            "YESBANK"
        );
    }

    #[test]
    fn test_expired_entry_removed_on_lookup() {
        let dir = tempdir().unwrap();
        let mut memory = memory_in(&dir);
        memory.store("old name", "OLDSYM", CacheConfidence::Medium, CacheSource::Google);
        // Backdate past the TTL
        memory
            .entries
            .get_mut("old name")
            .unwrap()
            .timestamp = Utc::now() - Duration::days(MAX_AGE_DAYS + 1);

        assert!(memory.lookup("old name").is_none());
        assert_eq!(memory.stats().total_entries, 0);
    }

    #[test]
    fn test_malformed_cache_resets_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("symbol_cache.json");
        fs::write(&path, "{not valid json").unwrap();

        let mut memory = SymbolMemory::open(&path);
        assert!(memory.lookup("anything").is_none());
        assert_eq!(memory.stats().total_entries, 0);
    }

    #[test]
    fn test_clear_expired_counts() {
        let dir = tempdir().unwrap();
        let mut memory = memory_in(&dir);
        memory.store("fresh", "FRESH", CacheConfidence::High, CacheSource::User);
        memory.store("stale", "STALE", CacheConfidence::Low, CacheSource::Google);
        memory.entries.get_mut("stale").unwrap().timestamp =
            Utc::now() - Duration::days(MAX_AGE_DAYS + 2);

        assert_eq!(memory.clear_expired(), 1);
        assert_eq!(memory.stats().total_entries, 1);
    }

    #[test]
    fn test_stats_grouping() {
        let dir = tempdir().unwrap();
        let mut memory = memory_in(&dir);
        memory.store("a", "A1", CacheConfidence::High, CacheSource::Google);
        memory.store("b", "B1", CacheConfidence::High, CacheSource::TradingView);

        let stats = memory.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.by_source.get("GOOGLE"), Some(&1));
        assert_eq!(stats.by_confidence.get("HIGH"), Some(&2));
    }
}
