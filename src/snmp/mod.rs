//! SNMP v1/v2c agent exposing site statistics, plus a small client.
//!
//! Only the read operations (Get, GetNext, GetBulk) are served.

pub mod agent;
pub mod ber;
pub mod client;
pub mod dispatch;
pub mod oid;
pub mod pdu;
pub mod snapshot;

pub use agent::{AgentError, ListenerState, SnmpAgent, MAX_UDP_PAYLOAD};
pub use ber::CodecError;
pub use client::{Client, ClientError};
pub use dispatch::Rejection;
pub use oid::{Oid, OidParseError, DEFAULT_ENTERPRISE_OID};
pub use pdu::{error_status, Message, Pdu, PduKind, Value, VarBind, Version};
pub use snapshot::OidTree;
