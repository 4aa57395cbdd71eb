//! Minimal ASN.1 BER primitives for the SNMP message subset.

use thiserror::Error;

use super::oid::Oid;

pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_NULL: u8 = 0x05;
pub const TAG_OID: u8 = 0x06;
pub const TAG_SEQUENCE: u8 = 0x30;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of data at offset {0}")]
    Truncated(usize),
    #[error("expected tag 0x{expected:02x}, got 0x{actual:02x}")]
    UnexpectedTag { expected: u8, actual: u8 },
    #[error("unsupported tag 0x{0:02x}")]
    UnknownTag(u8),
    #[error("unsupported length encoding")]
    BadLength,
    #[error("integer does not fit: {0} bytes")]
    IntegerOverflow(usize),
    #[error("malformed object identifier")]
    BadOid,
    #[error("unsupported SNMP version {0}")]
    UnsupportedVersion(i64),
    #[error("{0} trailing bytes after message")]
    TrailingData(usize),
}

/// Append a tag-length-value triple.
pub fn write_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    write_length(out, content.len());
    out.extend_from_slice(content);
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

/// Two's-complement, shortest form.
pub fn write_integer(out: &mut Vec<u8>, tag: u8, value: i64) {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    write_tlv(out, tag, &bytes[start..]);
}

/// Unsigned application types (Counter32, Gauge32, ...) with a leading zero
/// when the high bit would otherwise read as a sign.
pub fn write_unsigned(out: &mut Vec<u8>, tag: u8, value: u64) {
    let bytes = value.to_be_bytes();
    let skip = bytes[..7].iter().take_while(|b| **b == 0).count();
    let mut content = Vec::with_capacity(9);
    if bytes[skip] & 0x80 != 0 {
        content.push(0);
    }
    content.extend_from_slice(&bytes[skip..]);
    write_tlv(out, tag, &content);
}

pub fn write_oid(out: &mut Vec<u8>, oid: &Oid) {
    let arcs = oid.arcs();
    let first = arcs.first().copied().unwrap_or(0) as u64;
    let second = arcs.get(1).copied().unwrap_or(0) as u64;

    let mut content = Vec::with_capacity(arcs.len() + 4);
    push_subidentifier(&mut content, first * 40 + second);
    for arc in arcs.iter().skip(2) {
        push_subidentifier(&mut content, *arc as u64);
    }
    write_tlv(out, TAG_OID, &content);
}

fn push_subidentifier(out: &mut Vec<u8>, mut value: u64) {
    let mut groups = [0u8; 10];
    let mut n = 0;
    loop {
        groups[n] = (value & 0x7f) as u8;
        n += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        out.push(groups[i] | continuation);
    }
}

/// Cursor over a BER byte slice.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn byte(&mut self) -> Result<u8, CodecError> {
        let b = *self.buf.get(self.pos).ok_or(CodecError::Truncated(self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn length(&mut self) -> Result<usize, CodecError> {
        let first = self.byte()?;
        if first & 0x80 == 0 {
            return Ok(first as usize);
        }
        let count = (first & 0x7f) as usize;
        if count == 0 || count > std::mem::size_of::<u32>() {
            return Err(CodecError::BadLength);
        }
        let mut len = 0usize;
        for _ in 0..count {
            len = (len << 8) | self.byte()? as usize;
        }
        Ok(len)
    }

    /// Read any TLV, returning its tag and content.
    pub fn read_any(&mut self) -> Result<(u8, &'a [u8]), CodecError> {
        let tag = self.byte()?;
        let len = self.length()?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(CodecError::Truncated(self.buf.len()))?;
        let content = &self.buf[self.pos..end];
        self.pos = end;
        Ok((tag, content))
    }

    pub fn read_expected(&mut self, tag: u8) -> Result<&'a [u8], CodecError> {
        let (actual, content) = self.read_any()?;
        if actual != tag {
            return Err(CodecError::UnexpectedTag {
                expected: tag,
                actual,
            });
        }
        Ok(content)
    }

    pub fn read_integer(&mut self) -> Result<i64, CodecError> {
        let content = self.read_expected(TAG_INTEGER)?;
        decode_integer(content)
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        let value = self.read_integer()?;
        i32::try_from(value).map_err(|_| CodecError::IntegerOverflow(8))
    }
}

pub fn decode_integer(content: &[u8]) -> Result<i64, CodecError> {
    if content.is_empty() {
        return Err(CodecError::IntegerOverflow(0));
    }
    if content.len() > 8 {
        return Err(CodecError::IntegerOverflow(content.len()));
    }
    let negative = content[0] & 0x80 != 0;
    let mut value: i64 = if negative { -1 } else { 0 };
    for b in content {
        value = (value << 8) | *b as i64;
    }
    Ok(value)
}

pub fn decode_unsigned(content: &[u8]) -> Result<u64, CodecError> {
    let digits = match content {
        [] => return Err(CodecError::IntegerOverflow(0)),
        [0, rest @ ..] if !rest.is_empty() => rest,
        all => all,
    };
    if digits.len() > 8 {
        return Err(CodecError::IntegerOverflow(content.len()));
    }
    Ok(digits.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
}

pub fn decode_oid(content: &[u8]) -> Result<Oid, CodecError> {
    if content.is_empty() {
        return Err(CodecError::BadOid);
    }

    let mut subids = Vec::with_capacity(content.len());
    let mut acc: u64 = 0;
    let mut pending = false;
    for b in content {
        if acc > (u64::MAX >> 7) {
            return Err(CodecError::BadOid);
        }
        acc = (acc << 7) | (*b & 0x7f) as u64;
        pending = true;
        if b & 0x80 == 0 {
            subids.push(acc);
            acc = 0;
            pending = false;
        }
    }
    if pending {
        return Err(CodecError::BadOid);
    }

    let first = subids[0];
    let (a, b) = match first {
        0..=39 => (0, first),
        40..=79 => (1, first - 40),
        _ => (2, first - 80),
    };

    let mut arcs = Vec::with_capacity(subids.len() + 1);
    arcs.push(a as u32);
    arcs.push(u32::try_from(b).map_err(|_| CodecError::BadOid)?);
    for id in &subids[1..] {
        arcs.push(u32::try_from(*id).map_err(|_| CodecError::BadOid)?);
    }
    Ok(Oid::new(arcs))
}
