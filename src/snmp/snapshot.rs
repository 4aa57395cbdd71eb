//! Read-only OID tree built from a stats snapshot.

use chrono::{DateTime, Utc};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::ops::Bound;

use super::oid::Oid;
use super::pdu::Value;
use crate::stats::{SiteAggregate, StatsSnapshot};

const CACHE_SIZE: u32 = 1;
const CACHE_CAPACITY: u32 = 2;
const SITE_COUNT: u32 = 3;
const UPTIME: u32 = 4;
const SITE_TABLE: u32 = 5;

/// Immutable OID → value table in walk order.
#[derive(Debug, Clone, Default)]
pub struct OidTree {
    values: BTreeMap<Oid, Value>,
}

impl OidTree {
    /// Lay out the summary scalars and one row of ten columns per site under `base`.
    pub fn build(base: &Oid, stats: &StatsSnapshot) -> Self {
        let mut values = BTreeMap::new();
        let summary = &stats.summary;

        values.insert(base.child(&[CACHE_SIZE, 0]), Value::Gauge32(gauge(summary.len as u64)));
        values.insert(
            base.child(&[CACHE_CAPACITY, 0]),
            Value::Gauge32(gauge(summary.capacity as u64)),
        );
        values.insert(base.child(&[SITE_COUNT, 0]), Value::Gauge32(gauge(summary.sites as u64)));
        values.insert(
            base.child(&[UPTIME, 0]),
            Value::TimeTicks((summary.uptime.as_secs() as u32).wrapping_mul(100)),
        );

        for (idx, site) in &stats.sites {
            for (column, value) in site_columns(site) {
                values.insert(base.child(&[SITE_TABLE, *idx, column]), value);
            }
        }

        Self { values }
    }

    pub fn get(&self, oid: &Oid) -> Option<&Value> {
        self.values.get(oid)
    }

    /// The first entry strictly after `oid`, if any.
    pub fn next_after(&self, oid: &Oid) -> Option<(&Oid, &Value)> {
        self.values
            .range((Bound::Excluded(oid), Bound::Unbounded))
            .next()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Oid, Value> {
        self.values.iter()
    }
}

fn site_columns(site: &SiteAggregate) -> [(u32, Value); 10] {
    [
        (1, Value::OctetString(site.name.as_bytes().to_vec())),
        (2, Value::Counter32(counter(site.total_tests))),
        (3, Value::Counter32(counter(site.successful_tests))),
        (4, Value::Counter32(counter(site.failed_tests))),
        (5, Value::Gauge32(unix_seconds(site.last_success))),
        (6, Value::Gauge32(unix_seconds(site.last_failure))),
        (7, Value::Gauge32(gauge(site.last_duration_ms))),
        (8, Value::Gauge32(gauge(site.avg_duration_ms.round() as u64))),
        (9, Value::Gauge32(gauge(site.max_duration_ms))),
        (10, Value::Gauge32(gauge(site.min_duration_ms))),
    ]
}

/// Counter32 wraps.
fn counter(v: u64) -> u32 {
    v as u32
}

/// Gauge32 latches at its maximum.
fn gauge(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

fn unix_seconds(t: Option<DateTime<Utc>>) -> u32 {
    t.map(|t| gauge(t.timestamp().max(0) as u64)).unwrap_or(0)
}
