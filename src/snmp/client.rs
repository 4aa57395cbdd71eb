//! Minimal SNMP v2c client: Get, GetNext, GetBulk and Walk over UDP.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::Instant;

use super::ber::CodecError;
use super::oid::Oid;
use super::pdu::{error_status, Message, Pdu, PduKind, Value, VarBind, Version};

/// Client error types.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not resolve {0}")]
    Resolve(String),
    #[error("no response after {attempts} attempt(s)")]
    Timeout { attempts: u32 },
    #[error("agent returned error status {status} at index {index}")]
    ErrorStatus { status: i32, index: i32 },
    #[error("malformed response: {0}")]
    Codec(#[from] CodecError),
    #[error("agent returned non-increasing OID {0} during walk")]
    NonIncreasing(Oid),
}

pub struct Client {
    socket: UdpSocket,
    community: String,
    timeout: Duration,
    retries: u32,
}

impl Client {
    /// Resolve `target` (`host:port`) and connect a local UDP socket to it.
    pub async fn connect(target: &str, community: &str) -> Result<Self, ClientError> {
        let peer = tokio::net::lookup_host(target)
            .await?
            .next()
            .ok_or_else(|| ClientError::Resolve(target.to_string()))?;

        let local: SocketAddr = if peer.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(peer).await?;

        Ok(Self {
            socket,
            community: community.to_string(),
            timeout: Duration::from_secs(3),
            retries: 3,
        })
    }

    /// Per-attempt timeout and number of resends after the first attempt.
    pub fn with_timeout(mut self, timeout: Duration, retries: u32) -> Self {
        self.timeout = timeout;
        self.retries = retries;
        self
    }

    pub async fn get(&self, oids: &[Oid]) -> Result<Vec<VarBind>, ClientError> {
        let pdu = Pdu::request(PduKind::GetRequest, next_request_id(), oids);
        Ok(self.request(pdu).await?.varbinds)
    }

    pub async fn get_next(&self, oids: &[Oid]) -> Result<Vec<VarBind>, ClientError> {
        let pdu = Pdu::request(PduKind::GetNextRequest, next_request_id(), oids);
        Ok(self.request(pdu).await?.varbinds)
    }

    pub async fn get_bulk(
        &self,
        non_repeaters: i32,
        max_repetitions: i32,
        oids: &[Oid],
    ) -> Result<Vec<VarBind>, ClientError> {
        let pdu = Pdu::get_bulk(next_request_id(), non_repeaters, max_repetitions, oids);
        Ok(self.request(pdu).await?.varbinds)
    }

    /// Every binding under `root`, in walk order, via repeated GetNext.
    pub async fn walk(&self, root: &Oid) -> Result<Vec<VarBind>, ClientError> {
        let mut out = Vec::new();
        let mut cursor = root.clone();

        loop {
            let Some(vb) = self.get_next(std::slice::from_ref(&cursor)).await?.pop() else {
                break;
            };
            if vb.value.is_exception() || !vb.oid.starts_with(root) {
                break;
            }
            if vb.oid <= cursor {
                return Err(ClientError::NonIncreasing(vb.oid));
            }
            cursor = vb.oid.clone();
            out.push(vb);
        }

        Ok(out)
    }

    /// Send `pdu` and wait for the matching response, resending on timeout.
    pub async fn request(&self, pdu: Pdu) -> Result<Pdu, ClientError> {
        let request_id = pdu.request_id;
        let packet = Message::new(Version::V2c, &self.community, pdu).encode();
        let mut buf = vec![0u8; 65535];

        for attempt in 0..=self.retries {
            if attempt > 0 {
                tracing::debug!("SNMP request {} retry {}", request_id, attempt);
            }
            self.socket.send(&packet).await?;

            let deadline = Instant::now() + self.timeout;
            loop {
                let len = match tokio::time::timeout_at(deadline, self.socket.recv(&mut buf)).await {
                    Ok(received) => received?,
                    Err(_) => break,
                };

                let msg = match Message::decode(&buf[..len]) {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::debug!("Ignoring undecodable SNMP response: {}", e);
                        continue;
                    }
                };
                // a late answer to an earlier attempt or request
                if msg.pdu.kind != PduKind::Response || msg.pdu.request_id != request_id {
                    continue;
                }
                if msg.pdu.error_status != error_status::NO_ERROR {
                    return Err(ClientError::ErrorStatus {
                        status: msg.pdu.error_status,
                        index: msg.pdu.error_index,
                    });
                }
                return Ok(msg.pdu);
            }
        }

        Err(ClientError::Timeout {
            attempts: self.retries + 1,
        })
    }
}

fn next_request_id() -> i32 {
    rand::random::<i32>() & i32::MAX
}

/// Non-negative numeric value of a binding, if it has one.
pub fn numeric_value(vb: &VarBind) -> Option<u64> {
    match vb.value {
        Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => None,
        ref v => v.as_u64(),
    }
}
