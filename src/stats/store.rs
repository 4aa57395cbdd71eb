//! In-memory statistics store shared by the prober and the SNMP agent.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Write as _;
use std::time::Instant;

use super::aggregate::{CacheSummary, SiteAggregate};
use crate::models::TestRecord;

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Point-in-time copy of the store, safe to read without locking.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub summary: CacheSummary,
    /// Aggregates keyed by their stable site index.
    pub sites: BTreeMap<u32, SiteAggregate>,
}

struct Inner {
    history: VecDeque<TestRecord>,
    capacity: usize,
    aggregates: HashMap<String, SiteAggregate>,
    site_index: HashMap<String, u32>,
    next_index: u32,
}

/// Thread-safe statistics store.
///
/// Holds a bounded FIFO of recent records plus one aggregate per site. Each
/// site gets an index on first sight that is never reused, so OIDs built from
/// it stay stable across polls.
pub struct StatsStore {
    inner: RwLock<Inner>,
    started: Instant,
}

impl Default for StatsStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl StatsStore {
    /// Create a store retaining at most `capacity` records (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: RwLock::new(Inner {
                history: VecDeque::with_capacity(capacity),
                capacity,
                aggregates: HashMap::new(),
                site_index: HashMap::new(),
                next_index: 0,
            }),
            started: Instant::now(),
        }
    }

    pub fn write(&self, record: &TestRecord) {
        let mut inner = self.inner.write();

        if inner.history.len() >= inner.capacity {
            inner.history.pop_front();
        }
        inner.history.push_back(record.clone());

        let key = record.site_key();
        if !inner.site_index.contains_key(key) {
            inner.next_index += 1;
            let idx = inner.next_index;
            inner.site_index.insert(key.to_string(), idx);
        }

        inner
            .aggregates
            .entry(key.to_string())
            .or_insert_with(|| SiteAggregate::new(key, record))
            .record(record);
    }

    pub fn cache_summary(&self) -> CacheSummary {
        let inner = self.inner.read();
        self.summary_locked(&inner)
    }

    pub fn site_aggregates(&self) -> BTreeMap<u32, SiteAggregate> {
        let inner = self.inner.read();
        Self::aggregates_locked(&inner)
    }

    /// Summary and aggregates copied under a single read lock.
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.read();
        StatsSnapshot {
            summary: self.summary_locked(&inner),
            sites: Self::aggregates_locked(&inner),
        }
    }

    /// Retained records, oldest first.
    pub fn recent_records(&self) -> Vec<TestRecord> {
        self.inner.read().history.iter().cloned().collect()
    }

    pub fn site_stats(&self, name: &str) -> Option<SiteAggregate> {
        self.inner.read().aggregates.get(name).cloned()
    }

    pub fn site_index(&self, name: &str) -> Option<u32> {
        self.inner.read().site_index.get(name).copied()
    }

    /// Operator-facing dump of every aggregate. Not meant to be parsed.
    pub fn describe(&self) -> String {
        let snap = self.snapshot();
        let mut out = String::new();

        let _ = writeln!(out, "Cache Size: {}", snap.summary.len);
        let _ = writeln!(out, "Max Cache Size: {}", snap.summary.capacity);
        let _ = writeln!(out, "Monitored Sites: {}", snap.summary.sites);
        let _ = writeln!(out, "Uptime: {}s", snap.summary.uptime.as_secs());

        for (idx, site) in &snap.sites {
            let _ = writeln!(out);
            let _ = writeln!(out, "Site [{}]: {}", idx, site.name);
            let _ = writeln!(out, "  Total Tests: {}", site.total_tests);
            let _ = writeln!(out, "  Successful: {}", site.successful_tests);
            let _ = writeln!(out, "  Failed: {}", site.failed_tests);
            let _ = writeln!(out, "  Last Duration: {} ms", site.last_duration_ms);
            let _ = writeln!(out, "  Avg Duration: {:.2} ms", site.avg_duration_ms);
            let _ = writeln!(
                out,
                "  Min/Max Duration: {}/{} ms",
                site.min_duration_ms, site.max_duration_ms
            );
        }

        out
    }

    fn summary_locked(&self, inner: &Inner) -> CacheSummary {
        CacheSummary {
            len: inner.history.len(),
            capacity: inner.capacity,
            sites: inner.site_index.len(),
            uptime: self.started.elapsed(),
        }
    }

    fn aggregates_locked(inner: &Inner) -> BTreeMap<u32, SiteAggregate> {
        inner
            .aggregates
            .iter()
            .filter_map(|(name, agg)| {
                inner
                    .site_index
                    .get(name)
                    .map(|idx| (*idx, agg.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SiteInfo, StatusInfo, TimingMetrics};
    use chrono::Utc;
    use std::sync::Arc;

    fn record(site: &str, test_id: &str, success: bool, duration: u64) -> TestRecord {
        TestRecord {
            timestamp: Utc::now(),
            test_id: test_id.to_string(),
            site: SiteInfo::new(site, &format!("https://{}", site)),
            status: StatusInfo {
                success,
                ..Default::default()
            },
            timings: TimingMetrics {
                total_duration_ms: duration,
                ..Default::default()
            },
            error: None,
        }
    }

    #[test]
    fn test_history_is_bounded_fifo() {
        let store = StatsStore::new(3);
        for i in 0..7 {
            store.write(&record("a.com", &i.to_string(), true, 10));
            assert!(store.cache_summary().len <= 3);
        }

        let ids: Vec<_> = store
            .recent_records()
            .into_iter()
            .map(|r| r.test_id)
            .collect();
        assert_eq!(ids, vec!["4", "5", "6"]);

        let summary = store.cache_summary();
        assert_eq!(summary.len, 3);
        assert_eq!(summary.capacity, 3);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let store = StatsStore::new(0);
        store.write(&record("a.com", "1", true, 10));
        store.write(&record("a.com", "2", true, 10));
        assert_eq!(store.cache_summary().capacity, 1);
        assert_eq!(store.recent_records()[0].test_id, "2");
    }

    #[test]
    fn test_site_index_follows_first_seen_order() {
        let store = StatsStore::new(10);
        store.write(&record("zeta.com", "1", true, 10));
        store.write(&record("alpha.com", "2", true, 10));
        store.write(&record("zeta.com", "3", false, 10));
        store.write(&record("mid.com", "4", true, 10));

        assert_eq!(store.site_index("zeta.com"), Some(1));
        assert_eq!(store.site_index("alpha.com"), Some(2));
        assert_eq!(store.site_index("mid.com"), Some(3));
        assert_eq!(store.cache_summary().sites, 3);

        let names: Vec<_> = store
            .site_aggregates()
            .into_iter()
            .map(|(idx, agg)| (idx, agg.name))
            .collect();
        assert_eq!(
            names,
            vec![
                (1, "zeta.com".to_string()),
                (2, "alpha.com".to_string()),
                (3, "mid.com".to_string())
            ]
        );
    }

    #[test]
    fn test_indices_survive_history_eviction() {
        let store = StatsStore::new(1);
        store.write(&record("first.com", "1", true, 10));
        store.write(&record("second.com", "2", true, 10));
        store.write(&record("first.com", "3", true, 10));

        let a = store.snapshot();
        let b = store.snapshot();
        assert_eq!(a.sites.keys().collect::<Vec<_>>(), b.sites.keys().collect::<Vec<_>>());
        assert_eq!(a.sites[&1].name, "first.com");
        assert_eq!(a.sites[&1].total_tests, 2);
        assert_eq!(a.sites[&2].name, "second.com");
    }

    #[test]
    fn test_unnamed_site_uses_url() {
        let store = StatsStore::new(10);
        let mut rec = record("x", "1", true, 10);
        rec.site.name.clear();
        store.write(&rec);

        assert!(store.site_stats("https://x").is_some());
        assert_eq!(store.site_index("https://x"), Some(1));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = StatsStore::new(10);
        store.write(&record("a.com", "1", true, 100));
        let snap = store.snapshot();
        store.write(&record("a.com", "2", true, 300));

        assert_eq!(snap.sites[&1].total_tests, 1);
        assert_eq!(store.site_stats("a.com").unwrap().total_tests, 2);
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(StatsStore::new(50));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store.write(&record(&format!("site{}.com", t), &i.to_string(), i % 2 == 0, i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = store.snapshot();
        assert_eq!(snap.summary.len, 50);
        assert_eq!(snap.summary.sites, 4);
        let total: u64 = snap.sites.values().map(|s| s.total_tests).sum();
        assert_eq!(total, 400);
        let mut indices: Vec<_> = snap.sites.keys().copied().collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_describe_lists_sites() {
        let store = StatsStore::new(10);
        store.write(&record("example.com", "1", true, 150));
        store.write(&record("example.com", "2", false, 320));

        let text = store.describe();
        assert!(text.contains("Cache Size: 2"));
        assert!(text.contains("Site [1]: example.com"));
        assert!(text.contains("Avg Duration: 235.00 ms"));
    }
}
