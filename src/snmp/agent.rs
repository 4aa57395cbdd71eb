//! UDP listener serving the statistics tree to SNMP pollers.
//!
//! One background task owns the socket. Each datagram is decoded,
//! authorized, answered from a fresh [`OidTree`] and replied to in place;
//! nothing is queued or retried.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;

use super::ber::CodecError;
use super::dispatch::{authorize, dispatch, is_supported};
use super::oid::Oid;
use super::pdu::{error_status, Message, PduKind};
use super::snapshot::OidTree;
use crate::config::SnmpConfig;
use crate::models::TestRecord;
use crate::stats::StatsStore;

/// Receive buffer size.
const MAX_DATAGRAM: usize = 65535;
/// Largest payload a single UDP/IPv4 datagram can carry.
pub const MAX_UDP_PAYLOAD: usize = 65507;

/// Agent error types.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("timeout waiting for SNMP agent to start after {0:?}")]
    StartupTimeout(Duration),
    #[error("SNMP agent exited before signalling startup")]
    StartupAborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Created,
    Starting,
    Listening,
    Closing,
    Closed,
}

/// Handle to a running SNMP agent.
///
/// Dropping the handle also stops the listener, but only [`SnmpAgent::shutdown`]
/// waits for it to finish.
pub struct SnmpAgent {
    store: Arc<StatsStore>,
    local_addr: SocketAddr,
    state: Arc<watch::Sender<ListenerState>>,
    stop: parking_lot::Mutex<Option<broadcast::Sender<()>>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SnmpAgent {
    /// Bind the socket and start serving.
    ///
    /// Returns only once the socket is bound, or with the bind error, or after
    /// `config.startup_timeout`.
    pub async fn start(config: &SnmpConfig, store: Arc<StatsStore>) -> Result<Self, AgentError> {
        let (state, _) = watch::channel(ListenerState::Created);
        let state = Arc::new(state);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = broadcast::channel(1);

        let listener = Listener {
            community: config.community.as_bytes().to_vec(),
            base: config.enterprise_oid.clone(),
            store: store.clone(),
            state: state.clone(),
        };
        let bind_addr = format!("{}:{}", config.listen_address, config.port);
        let task = tokio::spawn(listener.run(bind_addr, ready_tx, stop_rx));

        let local_addr = match tokio::time::timeout(config.startup_timeout, ready_rx).await {
            Ok(Ok(Ok(addr))) => addr,
            Ok(Ok(Err(e))) => return Err(e),
            Ok(Err(_)) => return Err(AgentError::StartupAborted),
            Err(_) => {
                task.abort();
                return Err(AgentError::StartupTimeout(config.startup_timeout));
            }
        };

        tracing::info!(
            "SNMP agent listening on {} (base OID {})",
            local_addr,
            config.enterprise_oid
        );

        Ok(Self {
            store,
            local_addr,
            state,
            stop: parking_lot::Mutex::new(Some(stop_tx)),
            task: tokio::sync::Mutex::new(Some(task)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Bound UDP port; the assigned one when configured with port 0.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    pub fn store(&self) -> &Arc<StatsStore> {
        &self.store
    }

    /// Record a completed test. Callable from any thread.
    pub fn write(&self, record: &TestRecord) {
        self.store.write(record);
    }

    /// Human-readable dump of the current aggregates.
    pub fn describe(&self) -> String {
        self.store.describe()
    }

    /// Stop the listener and wait for its task to exit. Safe to call repeatedly
    /// and concurrently; every caller returns after the listener is closed.
    pub async fn shutdown(&self) {
        let stop = self.stop.lock().take();
        if let Some(stop) = stop {
            tracing::info!("Shutting down SNMP agent...");
            self.state.send_replace(ListenerState::Closing);
            let _ = stop.send(());
        }

        let mut task = self.task.lock().await;
        if let Some(handle) = task.take() {
            if let Err(e) = handle.await {
                tracing::error!("SNMP agent task failed: {}", e);
            }
            self.log_final_stats();
        }
    }

    fn log_final_stats(&self) {
        tracing::info!("SNMP agent stopped. Final statistics:");
        for site in self.store.site_aggregates().values() {
            tracing::info!(
                "  {}: {} tests ({} success, {} failed), avg: {:.2} ms",
                site.name,
                site.total_tests,
                site.successful_tests,
                site.failed_tests,
                site.avg_duration_ms
            );
        }
    }
}

/// State owned by the listener task.
struct Listener {
    community: Vec<u8>,
    base: Oid,
    store: Arc<StatsStore>,
    state: Arc<watch::Sender<ListenerState>>,
}

impl Listener {
    async fn run(
        self,
        bind_addr: String,
        ready: oneshot::Sender<Result<SocketAddr, AgentError>>,
        mut stop: broadcast::Receiver<()>,
    ) {
        self.state.send_replace(ListenerState::Starting);

        let bound = match UdpSocket::bind(&bind_addr).await {
            Ok(socket) => socket.local_addr().map(|addr| (socket, addr)),
            Err(e) => Err(e),
        };
        let (socket, local_addr) = match bound {
            Ok(bound) => bound,
            Err(source) => {
                self.state.send_replace(ListenerState::Closed);
                let _ = ready.send(Err(AgentError::Bind {
                    addr: bind_addr,
                    source,
                }));
                return;
            }
        };

        self.state.send_replace(ListenerState::Listening);
        if ready.send(Ok(local_addr)).is_err() {
            // start() gave up waiting
            self.state.send_replace(ListenerState::Closed);
            return;
        }

        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            tokio::select! {
                // also fires when the handle is dropped
                _ = stop.recv() => break,
                received = socket.recv_from(&mut buf) => match received {
                    Ok((len, peer)) => {
                        let Some(reply) = self.handle_datagram(&buf[..len], peer) else {
                            continue;
                        };
                        if let Err(e) = socket.send_to(&reply, peer).await {
                            tracing::warn!("SNMP write error to {}: {}", peer, e);
                        }
                    }
                    Err(e) => tracing::warn!("SNMP agent read error: {}", e),
                },
            }
        }

        drop(socket);
        self.state.send_replace(ListenerState::Closed);
    }

    /// Decode, authorize and answer one datagram. `None` means no reply.
    fn handle_datagram(&self, packet: &[u8], peer: SocketAddr) -> Option<Vec<u8>> {
        let request = match Message::decode(packet) {
            Ok(msg) => msg,
            Err(CodecError::UnsupportedVersion(v)) => {
                tracing::warn!("SNMP unsupported version {} from {}", v, peer);
                return None;
            }
            Err(e) => {
                tracing::warn!("SNMP decode error from {}: {}", peer, e);
                return None;
            }
        };

        if let Err(rejection) = authorize(&request, &self.community) {
            tracing::warn!("SNMP request from {} dropped: {}", peer, rejection);
            return None;
        }

        if !is_supported(request.pdu.kind) {
            tracing::warn!("SNMP unsupported PDU type {:?} from {}", request.pdu.kind, peer);
        }

        // the store lock is held only inside snapshot()
        let tree = OidTree::build(&self.base, &self.store.snapshot());
        let response = dispatch(&request, &tree);

        tracing::trace!(
            "SNMP {:?} from {}: {} in, {} out",
            request.pdu.kind,
            peer,
            request.pdu.varbinds.len(),
            response.pdu.varbinds.len()
        );

        Some(encode_reply(
            response,
            request.pdu.kind == PduKind::GetBulkRequest,
        ))
    }
}

/// Encode `response`, keeping it within one datagram. Bulk replies lose
/// trailing bindings; anything else becomes an empty `tooBig`.
fn encode_reply(mut response: Message, truncatable: bool) -> Vec<u8> {
    let mut bytes = response.encode();
    if bytes.len() <= MAX_UDP_PAYLOAD {
        return bytes;
    }

    if truncatable {
        while bytes.len() > MAX_UDP_PAYLOAD && !response.pdu.varbinds.is_empty() {
            let count = response.pdu.varbinds.len();
            let per_binding = (bytes.len() / count).max(1);
            let excess = bytes.len() - MAX_UDP_PAYLOAD;
            let drop_count = (excess / per_binding + 1).min(count);
            response.pdu.varbinds.truncate(count - drop_count);
            bytes = response.encode();
        }
        return bytes;
    }

    tracing::warn!("SNMP response too big ({} bytes)", bytes.len());
    response.pdu.error_status = error_status::TOO_BIG;
    response.pdu.error_index = 0;
    response.pdu.varbinds.clear();
    response.encode()
}
