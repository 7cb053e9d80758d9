use analysis_core::{FinancialTimeline, MetricValue, RatioTimeline};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::error::RetrievalResult;
use crate::index::RetrievalIndex;

pub const DEFAULT_CACHE_TTL_SECS: i64 = 3600;

/// Hex characters kept from the snapshot digest
const VERSION_LEN: usize = 16;

#[derive(Clone)]
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

/// Per-company retrieval indexes, keyed by ticker and snapshot version.
///
/// A new snapshot for the same ticker gets a new version, so a stale index
/// is never served for changed data. Entries also expire after the TTL.
pub struct IndexCache {
    entries: DashMap<String, CacheEntry<Arc<RetrievalIndex>>>,
    ttl_secs: i64,
}

impl IndexCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_secs,
        }
    }

    fn key(ticker: &str, version: &str) -> String {
        format!("{}:{}", ticker.to_uppercase(), version)
    }

    fn is_fresh(&self, entry: &CacheEntry<Arc<RetrievalIndex>>) -> bool {
        (Utc::now() - entry.cached_at).num_seconds() < self.ttl_secs
    }

    pub fn get(&self, ticker: &str, version: &str) -> Option<Arc<RetrievalIndex>> {
        let key = Self::key(ticker, version);
        if let Some(entry) = self.entries.get(&key) {
            if self.is_fresh(&entry) {
                tracing::debug!("Index cache hit for {}", key);
                return Some(Arc::clone(&entry.data));
            }
        }
        None
    }

    pub fn insert(&self, ticker: &str, version: &str, index: Arc<RetrievalIndex>) {
        self.entries.insert(
            Self::key(ticker, version),
            CacheEntry {
                data: index,
                cached_at: Utc::now(),
            },
        );
    }

    /// Cached index, or build and cache one. Build failures are not cached.
    ///
    /// Expired entries, including superseded snapshot versions, are dropped
    /// before a new index is stored.
    pub fn get_or_build<F>(&self, ticker: &str, version: &str, build: F) -> RetrievalResult<Arc<RetrievalIndex>>
    where
        F: FnOnce() -> RetrievalResult<RetrievalIndex>,
    {
        if let Some(index) = self.get(ticker, version) {
            return Ok(index);
        }

        let index = Arc::new(build()?);
        let purged = self.purge_expired();
        if purged > 0 {
            tracing::debug!("Dropped {} expired retrieval indexes", purged);
        }
        self.insert(ticker, version, Arc::clone(&index));
        tracing::info!("Cached retrieval index for {} ({} documents)", ticker, index.corpus().len());
        Ok(index)
    }

    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| self.is_fresh(entry));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for IndexCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL_SECS)
    }
}

/// Content version of a company snapshot: the leading hex digits of a
/// SHA-256 over its canonical JSON.
pub fn snapshot_version(
    ticker: &str,
    financial: &FinancialTimeline,
    ratios: &RatioTimeline,
    current_margin: MetricValue,
) -> String {
    let canonical = json!({
        "ticker": ticker.to_uppercase(),
        "financial": financial,
        "ratios": ratios,
        "current_margin": current_margin,
    });
    let digest = Sha256::digest(canonical.to_string().as_bytes());
    let mut version = hex::encode(digest);
    version.truncate(VERSION_LEN);
    version
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentCorpus;
    use crate::error::RetrievalError;
    use crate::index::RetrievalConfig;
    use crate::synthesizer::DocumentSynthesizer;
    use analysis_core::{metric, Series, Timeline};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn financial(last_revenue: f64) -> FinancialTimeline {
        let mut timeline = Timeline::new();
        timeline.insert(
            metric::REVENUE,
            Series::from_pairs([("2021".to_string(), 100e9), ("2022".to_string(), last_revenue)]).unwrap(),
        );
        timeline
    }

    fn build(fin: &FinancialTimeline) -> RetrievalResult<RetrievalIndex> {
        let corpus = DocumentSynthesizer::new().synthesize("TICK", fin, &Timeline::new(), &BTreeMap::new());
        RetrievalIndex::build(corpus, &RetrievalConfig::default())
    }

    #[test]
    fn test_snapshot_version_tracks_content() {
        let a = snapshot_version("TICK", &financial(90e9), &Timeline::new(), MetricValue::Unknown);
        let b = snapshot_version("tick", &financial(90e9), &Timeline::new(), MetricValue::Unknown);
        let c = snapshot_version("TICK", &financial(95e9), &Timeline::new(), MetricValue::Unknown);
        let d = snapshot_version("TICK", &financial(90e9), &Timeline::new(), MetricValue::Known(12.0));

        assert_eq!(a.len(), VERSION_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_get_or_build_builds_once_per_version() {
        let cache = IndexCache::default();
        let builds = AtomicUsize::new(0);
        let fin = financial(90e9);
        let version = snapshot_version("TICK", &fin, &Timeline::new(), MetricValue::Unknown);

        for _ in 0..3 {
            cache
                .get_or_build("TICK", &version, || {
                    builds.fetch_add(1, Ordering::SeqCst);
                    build(&fin)
                })
                .unwrap();
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);

        // a changed snapshot gets its own entry
        let changed = financial(95e9);
        let new_version = snapshot_version("TICK", &changed, &Timeline::new(), MetricValue::Unknown);
        cache.get_or_build("TICK", &new_version, || build(&changed)).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_build_errors_are_not_cached() {
        let cache = IndexCache::default();
        let err = cache
            .get_or_build("EMPTY", "v1", || {
                RetrievalIndex::build(DocumentCorpus::default(), &RetrievalConfig::default())
            })
            .unwrap_err();
        assert_eq!(err, RetrievalError::EmptyCorpus);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let cache = IndexCache::new(0);
        let fin = financial(90e9);
        cache.get_or_build("TICK", "v1", || build(&fin)).unwrap();
        assert!(cache.get("TICK", "v1").is_none());
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_versions_are_dropped_on_build() {
        let cache = IndexCache::new(0);
        for i in 0..10 {
            let fin = financial(90e9 + i as f64 * 1e9);
            let version = snapshot_version("TICK", &fin, &Timeline::new(), MetricValue::Unknown);
            cache.get_or_build("TICK", &version, || build(&fin)).unwrap();
            assert_eq!(cache.len(), 1);
        }
    }
}
