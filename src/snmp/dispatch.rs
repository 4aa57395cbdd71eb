//! Request dispatch for Get, GetNext and GetBulk.

use thiserror::Error;

use super::oid::Oid;
use super::pdu::{error_status, Message, Pdu, PduKind, Value, VarBind};
use super::snapshot::OidTree;

/// Why a request got no reply at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("community string mismatch")]
    Community,
}

pub fn authorize(request: &Message, community: &[u8]) -> Result<(), Rejection> {
    if request.community != community {
        return Err(Rejection::Community);
    }
    Ok(())
}

/// Build the response to an authorized `request` against `tree`.
///
/// Unsupported PDU types still get a reply: `genErr` with the request's own
/// bindings echoed back.
pub fn dispatch(request: &Message, tree: &OidTree) -> Message {
    let pdu = &request.pdu;
    let response = match pdu.kind {
        PduKind::GetRequest => Pdu::response(pdu.request_id, get(tree, pdu.oids())),
        PduKind::GetNextRequest => Pdu::response(pdu.request_id, get_next(tree, pdu.oids())),
        PduKind::GetBulkRequest => {
            let oids: Vec<Oid> = pdu.oids().cloned().collect();
            Pdu::response(
                pdu.request_id,
                get_bulk(tree, pdu.non_repeaters(), pdu.max_repetitions(), &oids),
            )
        }
        _ => Pdu {
            error_status: error_status::GEN_ERR,
            ..Pdu::response(pdu.request_id, pdu.varbinds.clone())
        },
    };

    Message {
        version: request.version,
        community: request.community.clone(),
        pdu: response,
    }
}

/// Whether `kind` is one of the read operations the agent serves.
pub fn is_supported(kind: PduKind) -> bool {
    matches!(
        kind,
        PduKind::GetRequest | PduKind::GetNextRequest | PduKind::GetBulkRequest
    )
}

pub fn get<'a>(tree: &OidTree, oids: impl IntoIterator<Item = &'a Oid>) -> Vec<VarBind> {
    oids.into_iter()
        .map(|oid| match tree.get(oid) {
            Some(value) => VarBind::new(oid.clone(), value.clone()),
            None => VarBind::new(oid.clone(), Value::NoSuchObject),
        })
        .collect()
}

pub fn get_next<'a>(tree: &OidTree, oids: impl IntoIterator<Item = &'a Oid>) -> Vec<VarBind> {
    oids.into_iter().map(|oid| next_binding(tree, oid)).collect()
}

/// Non-repeaters resolve once each; every remaining OID walks up to
/// `max_repetitions` steps, ending early with `endOfMibView`.
pub fn get_bulk(tree: &OidTree, non_repeaters: i32, max_repetitions: i32, oids: &[Oid]) -> Vec<VarBind> {
    let non_repeaters = (non_repeaters.max(0) as usize).min(oids.len());
    let max_repetitions = max_repetitions.max(1) as usize;
    let (singles, cursors) = oids.split_at(non_repeaters);

    // each cursor yields at most one binding per entry plus the end marker
    let per_cursor = max_repetitions.min(tree.len() + 1);
    let mut out = Vec::with_capacity(singles.len() + cursors.len() * per_cursor);
    out.extend(get_next(tree, singles));

    for start in cursors {
        let mut current = start.clone();
        for _ in 0..max_repetitions {
            let binding = next_binding(tree, &current);
            let exhausted = binding.value == Value::EndOfMibView;
            current = binding.oid.clone();
            out.push(binding);
            if exhausted {
                break;
            }
        }
    }

    out
}

fn next_binding(tree: &OidTree, oid: &Oid) -> VarBind {
    match tree.next_after(oid) {
        Some((next, value)) => VarBind::new(next.clone(), value.clone()),
        None => VarBind::new(oid.clone(), Value::EndOfMibView),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snmp::pdu::Version;
    use crate::stats::{CacheSummary, SiteAggregate, StatsSnapshot};
    use std::time::Duration;

    fn base() -> Oid {
        ".1.3.6.1.4.1.55555".parse().unwrap()
    }

    fn site(name: &str) -> SiteAggregate {
        SiteAggregate {
            name: name.to_string(),
            total_tests: 2,
            successful_tests: 1,
            failed_tests: 1,
            last_success: None,
            last_failure: None,
            last_duration_ms: 320,
            avg_duration_ms: 235.0,
            max_duration_ms: 320,
            min_duration_ms: 150,
        }
    }

    /// 4 scalars + 10 columns per site.
    fn tree(sites: u32) -> OidTree {
        let stats = StatsSnapshot {
            summary: CacheSummary {
                len: 2,
                capacity: 100,
                sites: sites as usize,
                uptime: Duration::from_secs(3),
            },
            sites: (1..=sites).map(|i| (i, site(&format!("s{}.com", i)))).collect(),
        };
        OidTree::build(&base(), &stats)
    }

    fn message(pdu: Pdu) -> Message {
        Message::new(Version::V2c, "public", pdu)
    }

    #[test]
    fn test_get_mixes_hits_and_misses() {
        let t = tree(1);
        let oids = vec![base().child(&[99, 0]), base().child(&[1, 0]), base().child(&[5, 1, 1])];
        let out = get(&t, &oids);

        assert_eq!(out.len(), 3);
        assert_eq!(out[0], VarBind::new(oids[0].clone(), Value::NoSuchObject));
        assert_eq!(out[1].value, Value::Gauge32(2));
        assert_eq!(out[2].value.as_text(), Some("s1.com"));
        assert_eq!(out[2].oid, oids[2]);
    }

    #[test]
    fn test_get_next_from_outside_table() {
        let t = tree(1);
        let before = ".1.3.6.1.4.1".parse::<Oid>().unwrap();
        let out = get_next(&t, [&before, &base().child(&[3, 5]), &base().child(&[5, 1, 10])]);

        assert_eq!(out[0].oid, base().child(&[1, 0]));
        assert_eq!(out[1].oid, base().child(&[4, 0]));
        assert_eq!(out[2], VarBind::new(base().child(&[5, 1, 10]), Value::EndOfMibView));
    }

    #[test]
    fn test_get_next_walk_visits_every_entry_once() {
        let t = tree(3);
        let mut cursor = Oid::default();
        let mut visited = Vec::new();
        loop {
            let b = next_binding(&t, &cursor);
            if b.value == Value::EndOfMibView {
                break;
            }
            cursor = b.oid.clone();
            visited.push(b.oid);
        }
        let expected: Vec<_> = t.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(visited, expected);
    }

    #[test]
    fn test_get_bulk_counts() {
        let t = tree(2);
        let oids = vec![base(), base().child(&[2, 0]), base().child(&[5, 1])];
        let out = get_bulk(&t, 1, 3, &oids);

        // k + m*r
        assert_eq!(out.len(), 1 + 2 * 3);
        assert_eq!(out[0].oid, base().child(&[1, 0]));
        assert_eq!(out[1].oid, base().child(&[3, 0]));
        assert_eq!(out[2].oid, base().child(&[4, 0]));
        assert_eq!(out[3].oid, base().child(&[5, 1, 1]));
        assert_eq!(out[4].oid, base().child(&[5, 1, 1]));
        assert_eq!(out[5].oid, base().child(&[5, 1, 2]));
        assert_eq!(out[6].oid, base().child(&[5, 1, 3]));
    }

    #[test]
    fn test_get_bulk_stops_at_end_of_tree() {
        let t = tree(1);
        let out = get_bulk(&t, 0, 10, &[base().child(&[5, 1, 8])]);

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].oid, base().child(&[5, 1, 9]));
        assert_eq!(out[1].oid, base().child(&[5, 1, 10]));
        assert_eq!(out[2], VarBind::new(base().child(&[5, 1, 10]), Value::EndOfMibView));
    }

    #[test]
    fn test_get_bulk_clamps_arguments() {
        let t = tree(1);
        let oids = vec![base(), base().child(&[1, 0])];

        // max_repetitions below one acts as one
        assert_eq!(get_bulk(&t, 0, 0, &oids).len(), 2);
        assert_eq!(get_bulk(&t, 0, -5, &oids).len(), 2);
        // non_repeaters beyond the list treats every OID as a single
        assert_eq!(get_bulk(&t, 10, 4, &oids).len(), 2);
        assert_eq!(get_bulk(&t, -1, 2, &oids).len(), 4);
        assert!(get_bulk(&t, 0, 5, &[]).is_empty());
    }

    #[test]
    fn test_get_bulk_huge_max_repetitions() {
        let t = tree(1);
        let oids = vec![base(); 4];
        let out = get_bulk(&t, 0, i32::MAX, &oids);

        // every cursor walks the 14 entries, then one endOfMibView
        assert_eq!(out.len(), 4 * 15);
        for row in out.chunks(15) {
            assert_eq!(row[0].oid, base().child(&[1, 0]));
            assert_eq!(row[13].oid, base().child(&[5, 1, 10]));
            assert_eq!(row[14], VarBind::new(base().child(&[5, 1, 10]), Value::EndOfMibView));
        }
    }

    #[test]
    fn test_authorize_rejects_wrong_community() {
        let req = Message::new(
            Version::V2c,
            "guess",
            Pdu::request(PduKind::GetRequest, 1, &[base().child(&[1, 0])]),
        );
        assert_eq!(authorize(&req, b"public"), Err(Rejection::Community));
        assert_eq!(authorize(&req, b"guess"), Ok(()));
    }

    #[test]
    fn test_dispatch_echoes_ids() {
        let req = Message::new(
            Version::V1,
            "public",
            Pdu::request(PduKind::GetNextRequest, 4242, &[base()]),
        );
        let resp = dispatch(&req, &tree(1));

        assert_eq!(resp.version, Version::V1);
        assert_eq!(resp.community, b"public");
        assert_eq!(resp.pdu.kind, PduKind::Response);
        assert_eq!(resp.pdu.request_id, 4242);
        assert_eq!(resp.pdu.error_status, error_status::NO_ERROR);
        assert_eq!(resp.pdu.varbinds[0].oid, base().child(&[1, 0]));
    }

    #[test]
    fn test_dispatch_bulk_uses_pdu_fields() {
        let req = message(Pdu::get_bulk(7, 0, 5, &[base()]));
        let resp = dispatch(&req, &tree(1));
        assert_eq!(resp.pdu.varbinds.len(), 5);
        assert_eq!(resp.pdu.error_status, 0);
        assert_eq!(resp.pdu.error_index, 0);
    }

    #[test]
    fn test_dispatch_set_is_gen_err() {
        let mut pdu = Pdu::request(PduKind::SetRequest, 3, &[base().child(&[1, 0])]);
        pdu.varbinds[0].value = Value::Gauge32(9);
        let resp = dispatch(&message(pdu.clone()), &tree(1));
        assert!(!is_supported(pdu.kind));

        assert_eq!(resp.pdu.kind, PduKind::Response);
        assert_eq!(resp.pdu.error_status, error_status::GEN_ERR);
        assert_eq!(resp.pdu.varbinds, pdu.varbinds);
    }
}
