//! Configuration module for sitewatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::SiteInfo;
use crate::snmp::{Oid, DEFAULT_ENTERPRISE_OID};
use crate::stats::DEFAULT_HISTORY_CAPACITY;

/// SNMP agent settings.
#[derive(Debug, Clone)]
pub struct SnmpConfig {
    /// Whether the agent is started at all (default: true)
    pub enabled: bool,
    /// Address to bind (default: "0.0.0.0")
    pub listen_address: String,
    /// UDP port; 0 picks an ephemeral port (default: 161)
    pub port: u16,
    /// Community string every request must carry (default: "public")
    pub community: String,
    /// Root of the exposed OID tree (default: .1.3.6.1.4.1.99999)
    pub enterprise_oid: Oid,
    /// How long `SnmpAgent::start` waits for the socket (default: 5s)
    pub startup_timeout: Duration,
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_address: "0.0.0.0".to_string(),
            port: 161,
            community: "public".to_string(),
            enterprise_oid: default_enterprise_oid(),
            startup_timeout: Duration::from_secs(5),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub snmp: SnmpConfig,
    /// Records retained in the history buffer (default: 100)
    pub history_capacity: usize,
    /// Sites to probe (default: example.com)
    pub sites: Vec<SiteInfo>,
    /// Delay between probes of one site (default: 30s)
    pub probe_interval: Duration,
    /// Per-probe timeout (default: 10s)
    pub probe_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snmp: SnmpConfig::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            sites: vec![SiteInfo::new("example.com", "https://example.com")],
            probe_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Environment variables:
    /// - `SITEWATCH_SNMP_ENABLED`: start the SNMP agent (default: true)
    /// - `SITEWATCH_SNMP_LISTEN_ADDRESS`: bind address (default: "0.0.0.0")
    /// - `SITEWATCH_SNMP_PORT`: UDP port (default: 161)
    /// - `SITEWATCH_SNMP_COMMUNITY`: community string (default: "public")
    /// - `SITEWATCH_SNMP_ENTERPRISE_OID`: base OID (default: .1.3.6.1.4.1.99999)
    /// - `SITEWATCH_SNMP_STARTUP_TIMEOUT_SECS`: startup wait (default: 5)
    /// - `SITEWATCH_HISTORY_CAPACITY`: history buffer size (default: 100)
    /// - `SITEWATCH_SITES`: comma-separated `name=url` or `url` entries
    /// - `SITEWATCH_PROBE_INTERVAL_SECS`: probe interval (default: 30)
    /// - `SITEWATCH_PROBE_TIMEOUT_SECS`: probe timeout (default: 10)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("SITEWATCH_SNMP_ENABLED") {
            match parse_bool(&v) {
                Some(enabled) => cfg.snmp.enabled = enabled,
                None => warn_invalid("SITEWATCH_SNMP_ENABLED", &v),
            }
        }

        if let Some(addr) = lookup("SITEWATCH_SNMP_LISTEN_ADDRESS") {
            if !addr.trim().is_empty() {
                cfg.snmp.listen_address = addr.trim().to_string();
            }
        }

        parse_into(&lookup, "SITEWATCH_SNMP_PORT", &mut cfg.snmp.port);

        if let Some(community) = lookup("SITEWATCH_SNMP_COMMUNITY") {
            cfg.snmp.community = community;
        }

        if let Some(v) = lookup("SITEWATCH_SNMP_ENTERPRISE_OID") {
            match v.parse::<Oid>() {
                Ok(oid) if !oid.is_empty() => cfg.snmp.enterprise_oid = oid,
                Ok(_) => {}
                Err(_) => warn_invalid("SITEWATCH_SNMP_ENTERPRISE_OID", &v),
            }
        }

        let mut secs = cfg.snmp.startup_timeout.as_secs_f64();
        parse_into(&lookup, "SITEWATCH_SNMP_STARTUP_TIMEOUT_SECS", &mut secs);
        cfg.snmp.startup_timeout = positive_duration(secs, cfg.snmp.startup_timeout);

        parse_into(&lookup, "SITEWATCH_HISTORY_CAPACITY", &mut cfg.history_capacity);

        if let Some(v) = lookup("SITEWATCH_SITES") {
            let sites = parse_sites(&v);
            if sites.is_empty() {
                warn_invalid("SITEWATCH_SITES", &v);
            } else {
                cfg.sites = sites;
            }
        }

        let mut secs = cfg.probe_interval.as_secs_f64();
        parse_into(&lookup, "SITEWATCH_PROBE_INTERVAL_SECS", &mut secs);
        cfg.probe_interval = positive_duration(secs, cfg.probe_interval);

        let mut secs = cfg.probe_timeout.as_secs_f64();
        parse_into(&lookup, "SITEWATCH_PROBE_TIMEOUT_SECS", &mut secs);
        cfg.probe_timeout = positive_duration(secs, cfg.probe_timeout);

        cfg
    }
}

pub fn default_enterprise_oid() -> Oid {
    Oid::from_str(DEFAULT_ENTERPRISE_OID).unwrap_or_default()
}

/// Parse `name=url,url2` into sites; a bare URL is named after its host.
pub fn parse_sites(raw: &str) -> Vec<SiteInfo> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((name, url)) => SiteInfo::new(name.trim(), url.trim()),
            None => SiteInfo::new(host_of(entry), entry),
        })
        .collect()
}

fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    rest.split(['/', ':', '?']).next().unwrap_or(rest)
}

fn parse_into<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(v) = lookup(key) {
        match v.trim().parse() {
            Ok(parsed) => *slot = parsed,
            Err(_) => warn_invalid(key, &v),
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn positive_duration(secs: f64, fallback: Duration) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        fallback
    }
}

fn warn_invalid(key: &str, value: &str) {
    tracing::warn!("Ignoring invalid value {:?} for {}", value, key);
}
