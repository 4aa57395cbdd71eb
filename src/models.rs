//! Test record types produced by the prober and consumed by the stats store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The outcome of testing a single site once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRecord {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    pub test_id: String,
    pub site: SiteInfo,
    pub status: StatusInfo,
    pub timings: TimingMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl TestRecord {
    /// Key used to group records per site: the name, or the URL when unnamed.
    pub fn site_key(&self) -> &str {
        if self.site.name.is_empty() {
            &self.site.url
        } else {
            &self.site.name
        }
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.timings.total_duration_ms
    }
}

/// A monitored site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteInfo {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl SiteInfo {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            category: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusInfo {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Timing measurements in milliseconds. Only the total is always present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_lookup_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_connection_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_handshake_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_first_byte_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_content_loaded_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_page_load_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_idle_ms: Option<u64>,
    pub total_duration_ms: u64,
}

/// Error details for a failed test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub error_type: String,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_phase: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, url: &str) -> TestRecord {
        TestRecord {
            timestamp: Utc::now(),
            test_id: "t-1".to_string(),
            site: SiteInfo::new(name, url),
            status: StatusInfo::default(),
            timings: TimingMetrics {
                total_duration_ms: 42,
                ..Default::default()
            },
            error: None,
        }
    }

    #[test]
    fn test_site_key_falls_back_to_url() {
        assert_eq!(record("example", "https://example.com").site_key(), "example");
        assert_eq!(record("", "https://example.com").site_key(), "https://example.com");
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(record("example", "https://example.com")).unwrap();
        assert!(json.get("@timestamp").is_some());
        assert_eq!(json["timings"]["total_duration_ms"], 42);
        assert!(json["timings"].get("dns_lookup_ms").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_deserialize_minimal_record() {
        let raw = r#"{
            "@timestamp": "2024-05-01T12:00:00Z",
            "test_id": "abc",
            "site": {"name": "example.com", "url": "https://example.com"},
            "status": {"success": false},
            "timings": {"total_duration_ms": 320}
        }"#;
        let rec: TestRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(rec.site_key(), "example.com");
        assert!(!rec.status.success);
        assert_eq!(rec.total_duration_ms(), 320);
        assert!(rec.timings.time_to_first_byte_ms.is_none());
    }
}
