//! snmpcheck - health check for a running sitewatch SNMP agent.
//!
//! Exits non-zero when the agent does not answer or exposes no sites.

use std::time::Duration;

use clap::Parser;
use sitewatch::snmp::{client::numeric_value, Client, Oid, VarBind, DEFAULT_ENTERPRISE_OID};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "snmpcheck", about = "Query a sitewatch SNMP agent and verify it is serving data")]
struct Args {
    /// Agent host name or address
    #[arg(long, default_value = "127.0.0.1")]
    target: String,

    /// Agent UDP port
    #[arg(long, default_value_t = 161, env = "SITEWATCH_SNMP_PORT")]
    port: u16,

    /// Community string
    #[arg(long, default_value = "public", env = "SITEWATCH_SNMP_COMMUNITY")]
    community: String,

    /// Base OID of the statistics tree
    #[arg(long, default_value = DEFAULT_ENTERPRISE_OID, env = "SITEWATCH_SNMP_ENTERPRISE_OID")]
    base: Oid,

    /// Resends after the first attempt
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Per-attempt timeout in seconds
    #[arg(long, default_value_t = 3.0)]
    timeout: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("sitewatch=warn".parse()?))
        .init();

    let args = Args::parse();
    if !args.timeout.is_finite() || args.timeout <= 0.0 {
        return Err(format!("invalid timeout: {}", args.timeout).into());
    }

    let target = if args.target.contains(':') && !args.target.starts_with('[') {
        format!("[{}]:{}", args.target, args.port)
    } else {
        format!("{}:{}", args.target, args.port)
    };
    let client = Client::connect(&target, &args.community)
        .await?
        .with_timeout(Duration::from_secs_f64(args.timeout), args.retries);

    let cache = client.get(&[args.base.child(&[1, 0])]).await?;
    let cache_size = cache
        .first()
        .and_then(numeric_value)
        .ok_or_else(|| format!("no cache size at {}", args.base.child(&[1, 0])))?;

    let walked = client.walk(&args.base).await?;
    if walked.is_empty() {
        return Err(format!("walk of {} returned no variables", args.base).into());
    }

    let site_entries = count_site_entries(&args.base, &walked);
    if site_entries == 0 {
        return Err(format!("no site entries under {}", args.base.child(&[5])).into());
    }

    println!(
        "SNMP agent healthy: cache_size={}, variables={}, site_entries={}",
        cache_size,
        walked.len(),
        site_entries
    );
    Ok(())
}

/// Site name column entries: `<base>.5.<index>.1`.
fn count_site_entries(base: &Oid, walked: &[VarBind]) -> usize {
    let table = base.child(&[5]);
    walked
        .iter()
        .filter(|vb| {
            vb.oid.starts_with(&table)
                && vb.oid.len() == table.len() + 2
                && vb.oid.arcs().last() == Some(&1)
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitewatch::snmp::Value;

    #[test]
    fn test_count_site_entries() {
        let base: Oid = ".1.3.6.1.4.1.99999".parse().unwrap();
        let vb = |suffix: &[u32]| VarBind::new(base.child(suffix), Value::Gauge32(0));
        let walked = vec![
            vb(&[1, 0]),
            vb(&[3, 0]),
            vb(&[5, 1, 1]),
            vb(&[5, 1, 2]),
            vb(&[5, 2, 1]),
            vb(&[5, 2, 10]),
            vb(&[5, 3, 1, 1]),
        ];
        assert_eq!(count_site_entries(&base, &walked), 2);
        assert_eq!(count_site_entries(&base, &walked[..2]), 0);
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["snmpcheck", "--port", "1161"]).unwrap();
        assert_eq!(args.port, 1161);
        assert_eq!(args.base.to_string(), DEFAULT_ENTERPRISE_OID);
        assert_eq!(args.retries, 3);
    }
}
