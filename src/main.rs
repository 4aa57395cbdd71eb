//! sitewatch - site reachability monitor with an SNMP statistics agent.

use std::sync::Arc;

use sitewatch::config::Config;
use sitewatch::scheduler::Scheduler;
use sitewatch::snmp::SnmpAgent;
use sitewatch::stats::StatsStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("sitewatch=info".parse()?))
        .init();

    let cfg = Config::load();
    tracing::info!(
        "Starting sitewatch with {} sites, history capacity {}",
        cfg.sites.len(),
        cfg.history_capacity
    );

    let store = Arc::new(StatsStore::new(cfg.history_capacity));

    let agent = if cfg.snmp.enabled {
        Some(SnmpAgent::start(&cfg.snmp, store.clone()).await?)
    } else {
        tracing::info!("SNMP agent disabled");
        None
    };

    let scheduler = Scheduler::new(store.clone(), cfg.probe_interval, cfg.probe_timeout);
    scheduler.start(&cfg.sites).await;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    scheduler.stop().await;
    match agent {
        Some(agent) => agent.shutdown().await,
        None => tracing::info!("Final statistics:\n{}", store.describe()),
    }

    Ok(())
}
