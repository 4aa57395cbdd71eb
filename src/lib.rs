//! sitewatch: site reachability probing with an SNMP statistics agent.

pub mod config;
pub mod models;
pub mod probe;
pub mod scheduler;
pub mod snmp;
pub mod stats;
