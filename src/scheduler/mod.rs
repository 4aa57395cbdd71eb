//! Scheduler module for running probes and feeding the stats store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock, Semaphore};

use crate::models::{SiteInfo, TestRecord};
use crate::probe::run_http_probe;
use crate::stats::StatsStore;

/// Probes started per site while earlier ones are still running.
const MAX_IN_FLIGHT: usize = 2;

/// Orchestrates one probe loop per site.
pub struct Scheduler {
    store: Arc<StatsStore>,
    interval: Duration,
    timeout: Duration,
    stop_chans: Arc<RwLock<HashMap<String, broadcast::Sender<()>>>>,
}

impl Scheduler {
    pub fn new(store: Arc<StatsStore>, interval: Duration, timeout: Duration) -> Self {
        Self {
            store,
            interval: if interval.is_zero() { Duration::from_secs(1) } else { interval },
            timeout: if timeout.is_zero() { Duration::from_secs(5) } else { timeout },
            stop_chans: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start monitoring every site in `sites`.
    pub async fn start(&self, sites: &[SiteInfo]) {
        tracing::info!(
            "Starting scheduler with {} sites (interval {:?}, timeout {:?})",
            sites.len(),
            self.interval,
            self.timeout
        );

        for site in sites {
            self.add_site(site.clone()).await;
        }
    }

    /// Add a site to be monitored. A site already running is left alone.
    pub async fn add_site(&self, site: SiteInfo) {
        let key = site_key(&site).to_string();
        let mut stop_chans = self.stop_chans.write().await;

        if stop_chans.contains_key(&key) {
            return;
        }

        let (stop_tx, stop_rx) = broadcast::channel(1);
        stop_chans.insert(key.clone(), stop_tx);
        drop(stop_chans);

        tracing::info!("Scheduler: Adding site {} ({})", key, site.url);

        let store = self.store.clone();
        let stop_chans = self.stop_chans.clone();
        let (interval, timeout) = (self.interval, self.timeout);

        tokio::spawn(async move {
            run_probe_loop(site, interval, timeout, store, stop_rx).await;

            // a re-added site owns a fresh sender; only drop our own
            let mut chans = stop_chans.write().await;
            if chans.get(&key).is_some_and(|tx| tx.receiver_count() == 0) {
                chans.remove(&key);
            }
        });
    }

    /// Stop monitoring one site. Returns whether it was running.
    pub async fn remove_site(&self, key: &str) -> bool {
        let mut stop_chans = self.stop_chans.write().await;

        match stop_chans.remove(key) {
            Some(stop_tx) => {
                let _ = stop_tx.send(());
                tracing::info!("Scheduler: Removed site {}", key);
                true
            }
            None => false,
        }
    }

    /// Stop every probe loop.
    pub async fn stop(&self) {
        let mut stop_chans = self.stop_chans.write().await;
        for (_, stop_tx) in stop_chans.drain() {
            let _ = stop_tx.send(());
        }
        tracing::info!("Scheduler stopped");
    }

    /// Number of sites currently scheduled.
    pub async fn running(&self) -> usize {
        self.stop_chans.read().await.len()
    }
}

fn site_key(site: &SiteInfo) -> &str {
    if site.name.is_empty() {
        &site.url
    } else {
        &site.name
    }
}

/// Run the probe loop for a single site.
async fn run_probe_loop(
    site: SiteInfo,
    interval_duration: Duration,
    timeout: Duration,
    store: Arc<StatsStore>,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let semaphore = Arc::new(Semaphore::new(MAX_IN_FLIGHT));

    let mut interval = tokio::time::interval(interval_duration);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                break;
            }
            _ = interval.tick() => {
                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(p) => p,
                    Err(_) => {
                        tracing::warn!("Skipping probe for {} due to overlap limit", site.url);
                        continue;
                    }
                };

                let site = site.clone();
                let store = store.clone();

                tokio::spawn(async move {
                    let _permit = permit;

                    // Add jitter to avoid thundering herd
                    let jitter = rand::random::<u64>() % 100;
                    tokio::time::sleep(Duration::from_millis(jitter)).await;

                    let record = run_http_probe(&site, timeout).await;
                    log_record(&record);
                    store.write(&record);
                });
            }
        }
    }
}

fn log_record(record: &TestRecord) {
    match &record.error {
        None => tracing::info!(
            "Probe {}: OK status={:?} total={} ms",
            record.site_key(),
            record.status.http_status,
            record.timings.total_duration_ms
        ),
        Some(err) => tracing::error!(
            "Probe failed for {}: {} ({}) after {} ms",
            record.site_key(),
            err.error_message,
            err.error_type,
            record.timings.total_duration_ms
        ),
    }
}
