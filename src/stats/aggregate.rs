//! Per-site running statistics.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::models::TestRecord;

/// Running totals for one site across every record seen since startup.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteAggregate {
    pub name: String,
    pub total_tests: u64,
    pub successful_tests: u64,
    pub failed_tests: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_duration_ms: u64,
    /// Mean over every observation, not a sliding window.
    pub avg_duration_ms: f64,
    pub max_duration_ms: u64,
    pub min_duration_ms: u64,
}

impl SiteAggregate {
    /// Start an aggregate seeded with the first record's duration as min and max.
    pub fn new(name: &str, first: &TestRecord) -> Self {
        let duration = first.total_duration_ms();
        Self {
            name: name.to_string(),
            total_tests: 0,
            successful_tests: 0,
            failed_tests: 0,
            last_success: None,
            last_failure: None,
            last_duration_ms: 0,
            avg_duration_ms: 0.0,
            max_duration_ms: duration,
            min_duration_ms: duration,
        }
    }

    pub fn record(&mut self, record: &TestRecord) {
        let duration = record.total_duration_ms();

        self.total_tests += 1;
        self.last_duration_ms = duration;

        if record.status.success {
            self.successful_tests += 1;
            self.last_success = Some(record.timestamp);
        } else {
            self.failed_tests += 1;
            self.last_failure = Some(record.timestamp);
        }

        self.min_duration_ms = self.min_duration_ms.min(duration);
        self.max_duration_ms = self.max_duration_ms.max(duration);

        let n = self.total_tests as f64;
        self.avg_duration_ms = (self.avg_duration_ms * (n - 1.0) + duration as f64) / n;
    }
}

/// Store-wide counters exposed at the top of the OID tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSummary {
    pub len: usize,
    pub capacity: usize,
    pub sites: usize,
    pub uptime: Duration,
}
