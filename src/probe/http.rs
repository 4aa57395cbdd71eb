//! HTTP probe implementation.

use std::time::{Duration, Instant};

use chrono::Utc;

use super::ProbeError;
use crate::models::{ErrorInfo, SiteInfo, StatusInfo, TestRecord, TimingMetrics};

/// Run an HTTP GET against `site` and describe the outcome as a record.
///
/// Probe failures are part of the record, never an `Err`: a 4xx/5xx status,
/// a timeout or a connection error all yield `status.success == false`.
pub async fn run_http_probe(site: &SiteInfo, timeout: Duration) -> TestRecord {
    let timestamp = Utc::now();
    let start = Instant::now();

    let result = fetch(&site.url, timeout, start).await;

    let mut timings = TimingMetrics {
        total_duration_ms: elapsed_ms(start),
        ..Default::default()
    };
    let mut status = StatusInfo::default();

    let failure = match result {
        Ok((code, ttfb)) => {
            timings.time_to_first_byte_ms = Some(ttfb);
            status.http_status = Some(code);
            if code >= 400 {
                Some(ProbeError::Status(code))
            } else {
                None
            }
        }
        Err(e) => Some(e),
    };

    let error = match failure {
        None => {
            status.success = true;
            status.message = Some("OK".to_string());
            None
        }
        Some(e) => {
            status.message = Some(e.to_string());
            Some(ErrorInfo {
                error_type: e.kind().to_string(),
                error_message: e.to_string(),
                failure_phase: None,
            })
        }
    };

    TestRecord {
        timestamp,
        test_id: format!("{}-{:08x}", timestamp.timestamp_millis(), rand::random::<u32>()),
        site: site.clone(),
        status,
        timings,
        error,
    }
}

/// Status code and time to first byte, after reading the whole body.
async fn fetch(address: &str, timeout: Duration, start: Instant) -> Result<(u16, u64), ProbeError> {
    if address.trim().is_empty() {
        return Err(ProbeError::Config("empty URL".to_string()));
    }
    let url = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProbeError::Config(e.to_string()))?;

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| classify(e, timeout))?;
    let ttfb = elapsed_ms(start);
    let code = response.status().as_u16();

    // Read the full body to measure complete transfer time
    let _body = response.bytes().await.map_err(|e| classify(e, timeout))?;

    Ok((code, ttfb))
}

fn classify(e: reqwest::Error, timeout: Duration) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout(timeout)
    } else if e.is_builder() {
        ProbeError::Config(e.to_string())
    } else {
        ProbeError::Network(e.to_string())
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
