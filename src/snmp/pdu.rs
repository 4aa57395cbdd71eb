//! SNMP v1/v2c message encoding and decoding.

use super::ber::{
    decode_integer, decode_oid, decode_unsigned, write_integer, write_oid, write_tlv,
    write_unsigned, CodecError, Reader, TAG_INTEGER, TAG_NULL, TAG_OCTET_STRING, TAG_OID,
    TAG_SEQUENCE,
};
use super::oid::Oid;

const TAG_IP_ADDRESS: u8 = 0x40;
const TAG_COUNTER32: u8 = 0x41;
const TAG_GAUGE32: u8 = 0x42;
const TAG_TIME_TICKS: u8 = 0x43;
const TAG_OPAQUE: u8 = 0x44;
const TAG_COUNTER64: u8 = 0x46;
const TAG_NO_SUCH_OBJECT: u8 = 0x80;
const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
const TAG_END_OF_MIB_VIEW: u8 = 0x82;

/// Error-status values carried in responses.
pub mod error_status {
    pub const NO_ERROR: i32 = 0;
    pub const TOO_BIG: i32 = 1;
    pub const GEN_ERR: i32 = 5;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
    V2c,
}

impl Version {
    fn wire(self) -> i64 {
        match self {
            Version::V1 => 0,
            Version::V2c => 1,
        }
    }

    fn from_wire(v: i64) -> Result<Self, CodecError> {
        match v {
            0 => Ok(Version::V1),
            1 => Ok(Version::V2c),
            other => Err(CodecError::UnsupportedVersion(other)),
        }
    }
}

/// A variable-binding value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i32),
    OctetString(Vec<u8>),
    Null,
    ObjectIdentifier(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl Value {
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// Numeric view of integer-like values.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Integer(v) => u64::try_from(*v).ok(),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v as u64),
            Value::Counter64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::OctetString(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Value::Integer(v) => write_integer(out, TAG_INTEGER, *v as i64),
            Value::OctetString(bytes) => write_tlv(out, TAG_OCTET_STRING, bytes),
            Value::Null => write_tlv(out, TAG_NULL, &[]),
            Value::ObjectIdentifier(oid) => write_oid(out, oid),
            Value::IpAddress(ip) => write_tlv(out, TAG_IP_ADDRESS, ip),
            Value::Counter32(v) => write_unsigned(out, TAG_COUNTER32, *v as u64),
            Value::Gauge32(v) => write_unsigned(out, TAG_GAUGE32, *v as u64),
            Value::TimeTicks(v) => write_unsigned(out, TAG_TIME_TICKS, *v as u64),
            Value::Opaque(bytes) => write_tlv(out, TAG_OPAQUE, bytes),
            Value::Counter64(v) => write_unsigned(out, TAG_COUNTER64, *v),
            Value::NoSuchObject => write_tlv(out, TAG_NO_SUCH_OBJECT, &[]),
            Value::NoSuchInstance => write_tlv(out, TAG_NO_SUCH_INSTANCE, &[]),
            Value::EndOfMibView => write_tlv(out, TAG_END_OF_MIB_VIEW, &[]),
        }
    }

    fn decode(tag: u8, content: &[u8]) -> Result<Self, CodecError> {
        Ok(match tag {
            TAG_INTEGER => Value::Integer(
                i32::try_from(decode_integer(content)?)
                    .map_err(|_| CodecError::IntegerOverflow(content.len()))?,
            ),
            TAG_OCTET_STRING => Value::OctetString(content.to_vec()),
            TAG_NULL => Value::Null,
            TAG_OID => Value::ObjectIdentifier(decode_oid(content)?),
            TAG_IP_ADDRESS => Value::IpAddress(
                content.try_into().map_err(|_| CodecError::BadLength)?,
            ),
            TAG_COUNTER32 => Value::Counter32(decode_u32(content)?),
            TAG_GAUGE32 => Value::Gauge32(decode_u32(content)?),
            TAG_TIME_TICKS => Value::TimeTicks(decode_u32(content)?),
            TAG_OPAQUE => Value::Opaque(content.to_vec()),
            TAG_COUNTER64 => Value::Counter64(decode_unsigned(content)?),
            TAG_NO_SUCH_OBJECT => Value::NoSuchObject,
            TAG_NO_SUCH_INSTANCE => Value::NoSuchInstance,
            TAG_END_OF_MIB_VIEW => Value::EndOfMibView,
            other => return Err(CodecError::UnknownTag(other)),
        })
    }
}

fn decode_u32(content: &[u8]) -> Result<u32, CodecError> {
    let v = decode_unsigned(content)?;
    u32::try_from(v).map_err(|_| CodecError::IntegerOverflow(content.len()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: Value,
}

impl VarBind {
    pub fn new(oid: Oid, value: Value) -> Self {
        Self { oid, value }
    }

    /// A request binding: the OID with a NULL value.
    pub fn null(oid: Oid) -> Self {
        Self::new(oid, Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduKind {
    GetRequest,
    GetNextRequest,
    Response,
    SetRequest,
    Trap,
    GetBulkRequest,
    InformRequest,
    TrapV2,
    Report,
}

impl PduKind {
    fn tag(self) -> u8 {
        match self {
            PduKind::GetRequest => 0xa0,
            PduKind::GetNextRequest => 0xa1,
            PduKind::Response => 0xa2,
            PduKind::SetRequest => 0xa3,
            PduKind::Trap => 0xa4,
            PduKind::GetBulkRequest => 0xa5,
            PduKind::InformRequest => 0xa6,
            PduKind::TrapV2 => 0xa7,
            PduKind::Report => 0xa8,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, CodecError> {
        Ok(match tag {
            0xa0 => PduKind::GetRequest,
            0xa1 => PduKind::GetNextRequest,
            0xa2 => PduKind::Response,
            0xa3 => PduKind::SetRequest,
            0xa4 => PduKind::Trap,
            0xa5 => PduKind::GetBulkRequest,
            0xa6 => PduKind::InformRequest,
            0xa7 => PduKind::TrapV2,
            0xa8 => PduKind::Report,
            other => return Err(CodecError::UnknownTag(other)),
        })
    }
}

/// A protocol data unit.
///
/// GetBulk reuses the error-status and error-index slots for non-repeaters
/// and max-repetitions; see [`Pdu::non_repeaters`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub kind: PduKind,
    pub request_id: i32,
    pub error_status: i32,
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    pub fn request(kind: PduKind, request_id: i32, oids: &[Oid]) -> Self {
        Self {
            kind,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().cloned().map(VarBind::null).collect(),
        }
    }

    pub fn get_bulk(request_id: i32, non_repeaters: i32, max_repetitions: i32, oids: &[Oid]) -> Self {
        Self {
            error_status: non_repeaters,
            error_index: max_repetitions,
            ..Self::request(PduKind::GetBulkRequest, request_id, oids)
        }
    }

    pub fn response(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            kind: PduKind::Response,
            request_id,
            error_status: error_status::NO_ERROR,
            error_index: 0,
            varbinds,
        }
    }

    pub fn non_repeaters(&self) -> i32 {
        self.error_status
    }

    pub fn max_repetitions(&self) -> i32 {
        self.error_index
    }

    pub fn oids(&self) -> impl Iterator<Item = &Oid> {
        self.varbinds.iter().map(|vb| &vb.oid)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        let mut list = Vec::new();
        for vb in &self.varbinds {
            let mut entry = Vec::new();
            write_oid(&mut entry, &vb.oid);
            vb.value.encode(&mut entry);
            write_tlv(&mut list, TAG_SEQUENCE, &entry);
        }

        let mut body = Vec::with_capacity(list.len() + 16);
        write_integer(&mut body, TAG_INTEGER, self.request_id as i64);
        write_integer(&mut body, TAG_INTEGER, self.error_status as i64);
        write_integer(&mut body, TAG_INTEGER, self.error_index as i64);
        write_tlv(&mut body, TAG_SEQUENCE, &list);

        write_tlv(out, self.kind.tag(), &body);
    }

    /// A v1 Trap carries enterprise, agent address, trap codes and a
    /// timestamp in place of the id and error fields. Those header fields are
    /// skipped and the PDU decodes with request id 0, so it can still be
    /// answered with a `genErr` echo of its bindings.
    fn decode(tag: u8, content: &[u8]) -> Result<Self, CodecError> {
        let kind = PduKind::from_tag(tag)?;
        let mut body = Reader::new(content);

        if kind == PduKind::Trap {
            decode_oid(body.read_expected(TAG_OID)?)?;
            body.read_expected(TAG_IP_ADDRESS)?;
            body.read_integer()?;
            body.read_integer()?;
            body.read_expected(TAG_TIME_TICKS)?;
            return Ok(Self {
                kind,
                request_id: 0,
                error_status: 0,
                error_index: 0,
                varbinds: decode_varbinds(&mut body)?,
            });
        }

        let request_id = body.read_i32()?;
        let error_status = body.read_i32()?;
        let error_index = body.read_i32()?;

        Ok(Self {
            kind,
            request_id,
            error_status,
            error_index,
            varbinds: decode_varbinds(&mut body)?,
        })
    }
}

fn decode_varbinds(body: &mut Reader<'_>) -> Result<Vec<VarBind>, CodecError> {
    let mut list = Reader::new(body.read_expected(TAG_SEQUENCE)?);
    let mut varbinds = Vec::new();
    while !list.is_empty() {
        let mut entry = Reader::new(list.read_expected(TAG_SEQUENCE)?);
        let oid = decode_oid(entry.read_expected(TAG_OID)?)?;
        let (value_tag, value_content) = entry.read_any()?;
        varbinds.push(VarBind::new(oid, Value::decode(value_tag, value_content)?));
    }
    Ok(varbinds)
}

/// A complete community-based SNMP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub version: Version,
    pub community: Vec<u8>,
    pub pdu: Pdu,
}

impl Message {
    pub fn new(version: Version, community: &str, pdu: Pdu) -> Self {
        Self {
            version,
            community: community.as_bytes().to_vec(),
            pdu,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        write_integer(&mut body, TAG_INTEGER, self.version.wire());
        write_tlv(&mut body, TAG_OCTET_STRING, &self.community);
        self.pdu.encode(&mut body);

        let mut out = Vec::with_capacity(body.len() + 4);
        write_tlv(&mut out, TAG_SEQUENCE, &body);
        out
    }

    /// Decode one datagram. The version is checked before anything after it,
    /// so v3 messages fail with [`CodecError::UnsupportedVersion`].
    pub fn decode(packet: &[u8]) -> Result<Self, CodecError> {
        let mut outer = Reader::new(packet);
        let mut msg = Reader::new(outer.read_expected(TAG_SEQUENCE)?);
        if !outer.is_empty() {
            return Err(CodecError::TrailingData(outer.remaining()));
        }

        let version = Version::from_wire(msg.read_integer()?)?;
        let community = msg.read_expected(TAG_OCTET_STRING)?.to_vec();
        let (tag, content) = msg.read_any()?;
        let pdu = Pdu::decode(tag, content)?;

        Ok(Self {
            version,
            community,
            pdu,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(s: &str) -> Oid {
        s.parse().unwrap()
    }

    // GetRequest v2c, community "public", request-id 1, sysDescr.0
    const SYS_DESCR_GET: [u8; 40] = [
        0x30, 0x26, 0x02, 0x01, 0x01, 0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c', 0xa0, 0x19,
        0x02, 0x01, 0x01, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00, 0x30, 0x0e, 0x30, 0x0c, 0x06, 0x08,
        0x2b, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00, 0x05, 0x00,
    ];

    #[test]
    fn test_decode_known_get_request() {
        let msg = Message::decode(&SYS_DESCR_GET).unwrap();
        assert_eq!(msg.version, Version::V2c);
        assert_eq!(msg.community, b"public");
        assert_eq!(msg.pdu.kind, PduKind::GetRequest);
        assert_eq!(msg.pdu.request_id, 1);
        assert_eq!(msg.pdu.varbinds, vec![VarBind::null(oid("1.3.6.1.2.1.1.1.0"))]);
    }

    #[test]
    fn test_encode_matches_known_bytes() {
        let msg = Message::new(
            Version::V2c,
            "public",
            Pdu::request(PduKind::GetRequest, 1, &[oid("1.3.6.1.2.1.1.1.0")]),
        );
        assert_eq!(msg.encode(), SYS_DESCR_GET.to_vec());
    }

    #[test]
    fn test_response_with_every_value_type() {
        let base = oid(".1.3.6.1.4.1.99999");
        let varbinds = vec![
            VarBind::new(base.child(&[1, 0]), Value::Gauge32(u32::MAX)),
            VarBind::new(base.child(&[4, 0]), Value::TimeTicks(360_000)),
            VarBind::new(base.child(&[5, 1, 1]), Value::OctetString(b"example.com".to_vec())),
            VarBind::new(base.child(&[5, 1, 2]), Value::Counter32(2)),
            VarBind::new(base.child(&[6]), Value::Integer(-42)),
            VarBind::new(base.child(&[7]), Value::ObjectIdentifier(base.clone())),
            VarBind::new(base.child(&[8]), Value::IpAddress([127, 0, 0, 1])),
            VarBind::new(base.child(&[9]), Value::Counter64(u64::MAX)),
            VarBind::new(base.child(&[10]), Value::NoSuchObject),
            VarBind::new(base.child(&[11]), Value::EndOfMibView),
        ];
        let msg = Message::new(Version::V1, "secret", Pdu::response(-7, varbinds));

        let decoded = Message::decode(&msg.encode()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_decode_v1_trap() {
        let base = oid(".1.3.6.1.4.1.99999");
        let mut entry = Vec::new();
        write_oid(&mut entry, &base.child(&[1, 0]));
        write_unsigned(&mut entry, TAG_GAUGE32, 5);
        let mut list = Vec::new();
        write_tlv(&mut list, TAG_SEQUENCE, &entry);

        let mut body = Vec::new();
        write_oid(&mut body, &base);
        write_tlv(&mut body, TAG_IP_ADDRESS, &[10, 0, 0, 1]);
        write_integer(&mut body, TAG_INTEGER, 6);
        write_integer(&mut body, TAG_INTEGER, 1);
        write_unsigned(&mut body, TAG_TIME_TICKS, 4200);
        write_tlv(&mut body, TAG_SEQUENCE, &list);

        let mut msg = Vec::new();
        write_integer(&mut msg, TAG_INTEGER, 0);
        write_tlv(&mut msg, TAG_OCTET_STRING, b"public");
        write_tlv(&mut msg, 0xa4, &body);
        let mut packet = Vec::new();
        write_tlv(&mut packet, TAG_SEQUENCE, &msg);

        let decoded = Message::decode(&packet).unwrap();
        assert_eq!(decoded.version, Version::V1);
        assert_eq!(decoded.pdu.kind, PduKind::Trap);
        assert_eq!(decoded.pdu.request_id, 0);
        assert_eq!(
            decoded.pdu.varbinds,
            vec![VarBind::new(base.child(&[1, 0]), Value::Gauge32(5))]
        );
    }

    #[test]
    fn test_get_bulk_fields() {
        let pdu = Pdu::get_bulk(9, 1, 25, &[oid(".1.3"), oid(".1.4")]);
        let msg = Message::new(Version::V2c, "public", pdu);
        let decoded = Message::decode(&msg.encode()).unwrap();
        assert_eq!(decoded.pdu.kind, PduKind::GetBulkRequest);
        assert_eq!(decoded.pdu.non_repeaters(), 1);
        assert_eq!(decoded.pdu.max_repetitions(), 25);
        assert_eq!(decoded.pdu.oids().count(), 2);
    }

    #[test]
    fn test_rejects_v3() {
        let mut packet = SYS_DESCR_GET;
        packet[4] = 0x03;
        assert_eq!(
            Message::decode(&packet),
            Err(CodecError::UnsupportedVersion(3))
        );
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(Message::decode(&[]).is_err());
        assert!(Message::decode(&SYS_DESCR_GET[..20]).is_err());
        assert!(Message::decode(b"not an snmp packet").is_err());

        let mut trailing = SYS_DESCR_GET.to_vec();
        trailing.push(0x00);
        assert_eq!(Message::decode(&trailing), Err(CodecError::TrailingData(1)));

        let mut bad_pdu = SYS_DESCR_GET;
        bad_pdu[13] = 0xaf;
        assert_eq!(Message::decode(&bad_pdu), Err(CodecError::UnknownTag(0xaf)));
    }
}
