//! Minimal DNS wire codec (RFC 1035).
//!
//! Name parsing and record emission over caller-provided byte buffers with
//! explicit cursors. Nothing here allocates; the responder hands in the
//! fixed 512-byte reply buffer and a fixed name buffer, and every writer
//! either commits a complete record or leaves the cursor untouched.

use std::fmt;
use std::net::IpAddr;

/// Maximum UDP message size without EDNS(0).
pub(crate) const MAX_PACKET_SIZE: usize = 512;
/// Fixed DNS header size.
pub(crate) const HEADER_SIZE: usize = 12;

// RFC 1035: maximum label length is 63 octets, maximum name length is
// 255 octets on the wire = 253 characters in presentation form.
const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 253;

// A compression pointer must refer strictly backward, so a chain shrinks
// at every hop; the depth cap is a second line of defense.
const MAX_POINTER_DEPTH: u8 = 127;

// Record types this server understands (RFC 1035 + RFC 3596)
pub(crate) const TYPE_A: u16 = 1;
pub(crate) const TYPE_NS: u16 = 2;
pub(crate) const TYPE_SOA: u16 = 6;
pub(crate) const TYPE_AAAA: u16 = 28;
pub(crate) const QTYPE_ANY: u16 = 255;

pub(crate) const CLASS_IN: u16 = 1;
pub(crate) const QCLASS_ANY: u16 = 255;

/// DNS response codes used by the responder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rcode {
    NoError = 0,
    FormErr = 1,
    NotImp = 4,
    Refused = 5,
}

/// Codec-internal errors. These never reach the wire; the responder maps
/// them to response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WireError {
    /// Premature end of input, bad label, or a non-backward pointer
    Malformed,
    /// Parsed name does not fit the name buffer
    NameTooLong,
    /// A label exceeds 63 characters
    LabelTooLong,
    /// Leading dot or two consecutive dots
    EmptyLabel,
    /// Not enough room left in the output buffer
    NoSpace,
    /// Address family does not match the record type
    WrongFamily,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Malformed => write!(f, "malformed name encoding"),
            WireError::NameTooLong => write!(f, "name exceeds maximum length"),
            WireError::LabelTooLong => write!(f, "label exceeds 63 characters"),
            WireError::EmptyLabel => write!(f, "empty label"),
            WireError::NoSpace => write!(f, "insufficient space in output buffer"),
            WireError::WrongFamily => write!(f, "address family mismatch"),
        }
    }
}

/// Fixed-capacity buffer holding a parsed name in presentation form
/// (dot-separated labels, no trailing dot).
pub(crate) struct NameBuf {
    buf: [u8; MAX_NAME_LEN],
    len: usize,
}

impl NameBuf {
    pub(crate) const fn new() -> Self {
        NameBuf {
            buf: [0; MAX_NAME_LEN],
            len: 0,
        }
    }

    fn push(&mut self, byte: u8) -> Result<(), WireError> {
        if self.len == MAX_NAME_LEN {
            return Err(WireError::NameTooLong);
        }
        self.buf[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Presentation form of the name. Labels are checked for UTF-8
    /// validity as they are copied in, so this cannot fail in practice.
    pub(crate) fn as_str(&self) -> &str {
        std::str::from_utf8(self.as_bytes()).unwrap_or("")
    }
}

/// Read a possibly-compressed name starting at `*cursor`, appending its
/// presentation form to `out`. On success the cursor sits on the first
/// byte after the name (for a compressed name, after the pointer). On
/// error the cursor position is unspecified and `out` holds scratch.
pub(crate) fn parse_name(
    buf: &[u8],
    cursor: &mut usize,
    end: usize,
    out: &mut NameBuf,
) -> Result<(), WireError> {
    parse_labels(buf, cursor, end, out, 0)
}

fn parse_labels(
    buf: &[u8],
    cursor: &mut usize,
    end: usize,
    out: &mut NameBuf,
    depth: u8,
) -> Result<(), WireError> {
    if depth > MAX_POINTER_DEPTH {
        return Err(WireError::Malformed);
    }
    let mut first = true;
    loop {
        if *cursor >= end {
            return Err(WireError::Malformed);
        }
        let octet = buf[*cursor] as usize;
        *cursor += 1;
        if octet == 0 {
            return Ok(());
        }
        if !first {
            out.push(b'.')?;
        }
        first = false;
        if octet & 0xC0 == 0xC0 {
            if *cursor >= end {
                return Err(WireError::Malformed);
            }
            let target = ((octet & 0x3F) << 8) | buf[*cursor] as usize;
            *cursor += 1;
            // The rest of the name continues at `target`, which must lie
            // strictly before the pointer itself; bounding the reference
            // there makes pointer loops unrepresentable.
            let pointer_pos = *cursor - 2;
            if target >= pointer_pos {
                return Err(WireError::Malformed);
            }
            let mut ref_cursor = target;
            return parse_labels(buf, &mut ref_cursor, pointer_pos, out, depth + 1);
        }
        if octet > MAX_LABEL_LEN {
            return Err(WireError::Malformed);
        }
        if *cursor + octet > end {
            return Err(WireError::Malformed);
        }
        let label = &buf[*cursor..*cursor + octet];
        if label.contains(&b'.') || std::str::from_utf8(label).is_err() {
            return Err(WireError::Malformed);
        }
        for &b in label {
            out.push(b)?;
        }
        *cursor += octet;
    }
}

/// Write `name` in wire format at `*cursor`. With `pointer`, the
/// terminating zero octet is replaced by a compression pointer to that
/// offset. A single trailing dot in `name` is tolerated.
pub(crate) fn write_name(
    buf: &mut [u8],
    cursor: &mut usize,
    end: usize,
    name: &str,
    pointer: Option<u16>,
) -> Result<(), WireError> {
    if !name.is_empty() {
        let name = name.strip_suffix('.').unwrap_or(name);
        if name.is_empty() {
            return Err(WireError::EmptyLabel);
        }
        for label in name.split('.') {
            if label.is_empty() {
                return Err(WireError::EmptyLabel);
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(WireError::LabelTooLong);
            }
            if *cursor + label.len() + 2 > end {
                return Err(WireError::NoSpace);
            }
            buf[*cursor] = label.len() as u8;
            *cursor += 1;
            buf[*cursor..*cursor + label.len()].copy_from_slice(label.as_bytes());
            *cursor += label.len();
        }
    }
    match pointer {
        None => {
            if *cursor >= end {
                return Err(WireError::NoSpace);
            }
            buf[*cursor] = 0;
            *cursor += 1;
        }
        Some(offset) => {
            if *cursor + 2 > end {
                return Err(WireError::NoSpace);
            }
            buf[*cursor] = (offset >> 8) as u8 | 0xC0;
            buf[*cursor + 1] = (offset & 0xFF) as u8;
            *cursor += 2;
        }
    }
    Ok(())
}

fn put_u16(buf: &mut [u8], cursor: &mut usize, value: u16) {
    buf[*cursor..*cursor + 2].copy_from_slice(&value.to_be_bytes());
    *cursor += 2;
}

fn put_u32(buf: &mut [u8], cursor: &mut usize, value: u32) {
    buf[*cursor..*cursor + 4].copy_from_slice(&value.to_be_bytes());
    *cursor += 4;
}

/// Common record prologue: owner NAME, TYPE, CLASS, TTL. Callers rewind
/// the cursor on error.
fn write_rr_start(
    buf: &mut [u8],
    cursor: &mut usize,
    end: usize,
    name: &str,
    pointer: Option<u16>,
    rtype: u16,
    class: u16,
    ttl: u32,
) -> Result<(), WireError> {
    write_name(buf, cursor, end, name, pointer)?;
    if *cursor + 8 > end {
        return Err(WireError::NoSpace);
    }
    put_u16(buf, cursor, rtype);
    put_u16(buf, cursor, class);
    put_u32(buf, cursor, ttl);
    Ok(())
}

/// Write an A record. `addr` must be IPv4.
pub(crate) fn write_record_a(
    buf: &mut [u8],
    cursor: &mut usize,
    end: usize,
    name: &str,
    pointer: Option<u16>,
    class: u16,
    ttl: u32,
    addr: &IpAddr,
) -> Result<(), WireError> {
    let IpAddr::V4(v4) = addr else {
        return Err(WireError::WrongFamily);
    };
    let octets = v4.octets();
    let start = *cursor;
    let result = (|| {
        write_rr_start(buf, cursor, end, name, pointer, TYPE_A, class, ttl)?;
        if *cursor + 6 > end {
            return Err(WireError::NoSpace);
        }
        put_u16(buf, cursor, 4);
        buf[*cursor..*cursor + 4].copy_from_slice(&octets);
        *cursor += 4;
        Ok(())
    })();
    if result.is_err() {
        *cursor = start;
    }
    result
}

/// Write an AAAA record. `addr` must be IPv6.
pub(crate) fn write_record_aaaa(
    buf: &mut [u8],
    cursor: &mut usize,
    end: usize,
    name: &str,
    pointer: Option<u16>,
    class: u16,
    ttl: u32,
    addr: &IpAddr,
) -> Result<(), WireError> {
    let IpAddr::V6(v6) = addr else {
        return Err(WireError::WrongFamily);
    };
    let octets = v6.octets();
    let start = *cursor;
    let result = (|| {
        write_rr_start(buf, cursor, end, name, pointer, TYPE_AAAA, class, ttl)?;
        if *cursor + 18 > end {
            return Err(WireError::NoSpace);
        }
        put_u16(buf, cursor, 16);
        buf[*cursor..*cursor + 16].copy_from_slice(&octets);
        *cursor += 16;
        Ok(())
    })();
    if result.is_err() {
        *cursor = start;
    }
    result
}

/// Write an NS record. RDLENGTH is back-patched once the nameserver name
/// has been written (uncompressed, as RDATA names are never compressed).
pub(crate) fn write_record_ns(
    buf: &mut [u8],
    cursor: &mut usize,
    end: usize,
    name: &str,
    pointer: Option<u16>,
    class: u16,
    ttl: u32,
    ns: &str,
) -> Result<(), WireError> {
    let start = *cursor;
    let result = (|| {
        write_rr_start(buf, cursor, end, name, pointer, TYPE_NS, class, ttl)?;
        if *cursor + 2 > end {
            return Err(WireError::NoSpace);
        }
        let rdlength_at = *cursor;
        *cursor += 2;
        let rdata_start = *cursor;
        write_name(buf, cursor, end, ns, None)?;
        let rdlength = (*cursor - rdata_start) as u16;
        buf[rdlength_at..rdlength_at + 2].copy_from_slice(&rdlength.to_be_bytes());
        Ok(())
    })();
    if result.is_err() {
        *cursor = start;
    }
    result
}

/// Write an SOA record: MNAME, RNAME, then SERIAL, REFRESH, RETRY,
/// EXPIRE, MINIMUM. RDLENGTH is back-patched.
#[allow(clippy::too_many_arguments)]
pub(crate) fn write_record_soa(
    buf: &mut [u8],
    cursor: &mut usize,
    end: usize,
    name: &str,
    pointer: Option<u16>,
    class: u16,
    ttl: u32,
    mname: &str,
    rname: &str,
    serial: u32,
    refresh: u32,
    retry: u32,
    expire: u32,
    minimum: u32,
) -> Result<(), WireError> {
    let start = *cursor;
    let result = (|| {
        write_rr_start(buf, cursor, end, name, pointer, TYPE_SOA, class, ttl)?;
        if *cursor + 2 > end {
            return Err(WireError::NoSpace);
        }
        let rdlength_at = *cursor;
        *cursor += 2;
        let rdata_start = *cursor;
        write_name(buf, cursor, end, mname, None)?;
        write_name(buf, cursor, end, rname, None)?;
        if *cursor + 20 > end {
            return Err(WireError::NoSpace);
        }
        put_u32(buf, cursor, serial);
        put_u32(buf, cursor, refresh);
        put_u32(buf, cursor, retry);
        put_u32(buf, cursor, expire);
        put_u32(buf, cursor, minimum);
        let rdlength = (*cursor - rdata_start) as u16;
        buf[rdlength_at..rdlength_at + 2].copy_from_slice(&rdlength.to_be_bytes());
        Ok(())
    })();
    if result.is_err() {
        *cursor = start;
    }
    result
}

// ==================== Helper for building DNS packets (tests) ====================
