//! Query responder: applies zone policy and the address selector to a
//! parsed query and assembles a bounded response.
//!
//! `handle` is a pure transformation over caller-owned buffers; all
//! mutable state is passed in, so any number of responder loops can share
//! one `Responder`.

use std::net::{IpAddr, Ipv4Addr};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::dns::wire::{
    parse_name, write_record_a, write_record_aaaa, write_record_ns, write_record_soa, NameBuf,
    Rcode, WireError, CLASS_IN, HEADER_SIZE, MAX_PACKET_SIZE, QCLASS_ANY, QTYPE_ANY, TYPE_A,
    TYPE_AAAA, TYPE_NS, TYPE_SOA,
};
use crate::seeds::AddressSelector;

/// Upper bound on addresses requested from the selector per query.
pub const MAX_ADDRS: usize = 32;

// SOA timing fields, fixed by policy.
const SOA_REFRESH: u32 = 604_800;
const SOA_RETRY: u32 = 86_400;
const SOA_EXPIRE: u32 = 2_592_000;
const SOA_MINIMUM: u32 = 604_800;

/// Static description of the delegated zone. Immutable for the server
/// lifetime.
#[derive(Debug, Clone)]
pub struct Zone {
    /// Zone apex. Queries for this name or any name ending in
    /// `.<host>` are answered; everything else is refused.
    pub host: String,
    /// Nameserver advertised in NS records and as the SOA MNAME.
    pub ns: String,
    /// SOA RNAME in dot-separated form. `None` suppresses SOA records.
    pub mbox: Option<String>,
    /// TTL in seconds for A/AAAA answers.
    pub data_ttl: u32,
    /// TTL in seconds for NS and SOA records.
    pub ns_ttl: u32,
}

/// Stateless query handler for a single zone.
pub struct Responder<S> {
    zone: Zone,
    selector: S,
}

impl<S: AddressSelector> Responder<S> {
    pub fn new(zone: Zone, selector: S) -> Self {
        Responder { zone, selector }
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    /// Process one datagram and build the reply in `reply`. Returns the
    /// reply length, or `None` when the datagram is shorter than a DNS
    /// header and gets no reply at all.
    pub fn handle(&self, query: &[u8], reply: &mut [u8; MAX_PACKET_SIZE]) -> Option<usize> {
        if query.len() < HEADER_SIZE {
            return None;
        }

        // Echo ID and flags, then normalize: clear RCODE, TC and RA.
        reply[..4].copy_from_slice(&query[..4]);
        reply[3] &= !0x0F;
        reply[2] &= !0x02;
        reply[3] &= !0x80;

        // A response, not a query
        if query[2] & 0x80 != 0 {
            return Some(set_rcode(reply, Rcode::FormErr));
        }
        // Only standard queries
        if (query[2] >> 3) & 0x0F != 0 {
            return Some(set_rcode(reply, Rcode::FormErr));
        }

        let qdcount = u16::from_be_bytes([query[4], query[5]]);
        if qdcount == 0 {
            return Some(set_rcode(reply, Rcode::NoError));
        }
        if qdcount > 1 {
            return Some(set_rcode(reply, Rcode::NotImp));
        }

        let mut cursor = HEADER_SIZE;
        let qname_offset = HEADER_SIZE as u16;
        let mut name = NameBuf::new();
        match parse_name(query, &mut cursor, query.len(), &mut name) {
            Ok(()) => {}
            Err(WireError::NameTooLong) => return Some(set_rcode(reply, Rcode::Refused)),
            Err(_) => return Some(set_rcode(reply, Rcode::FormErr)),
        }
        if !self.zone_match(name.as_bytes()) {
            return Some(set_rcode(reply, Rcode::Refused));
        }
        if query.len() < cursor + 4 {
            return Some(set_rcode(reply, Rcode::FormErr));
        }
        let qtype = u16::from_be_bytes([query[cursor], query[cursor + 1]]);
        let qclass = u16::from_be_bytes([query[cursor + 2], query[cursor + 3]]);
        cursor += 4;

        // Question accepted: echo it and commit to a response header.
        reply[HEADER_SIZE..cursor].copy_from_slice(&query[HEADER_SIZE..cursor]);
        reply[4] = 0;
        reply[5] = 1; // QDCOUNT = 1
        reply[2] |= 0x80; // QR

        let class_ok = qclass == CLASS_IN || qclass == QCLASS_ANY;
        let ns_in_answer = (qtype == TYPE_NS || qtype == QTYPE_ANY) && class_ok;

        let mut out = cursor;

        // Unless the answer section itself will carry the NS record, an
        // authority record (NS or SOA) must fit after the answers. Its
        // worst-case size is reserved at the tail of the buffer before
        // any answer is written, keeping the response under 512 bytes
        // without truncation.
        let max_auth_size = if ns_in_answer {
            0
        } else {
            self.max_authority_size(reply, out, qname_offset)
        };
        let answer_end = MAX_PACKET_SIZE - max_auth_size;

        let mut ancount: u16 = 0;
        let mut nscount: u16 = 0;
        let mut have_ns = false;
        let serial = unix_time();

        // Answer section
        if ns_in_answer
            && write_record_ns(
                reply,
                &mut out,
                answer_end,
                "",
                Some(qname_offset),
                CLASS_IN,
                self.zone.ns_ttl,
                &self.zone.ns,
            )
            .is_ok()
        {
            ancount += 1;
            have_ns = true;
        }

        if (qtype == TYPE_SOA || qtype == QTYPE_ANY) && class_ok {
            if let Some(mbox) = &self.zone.mbox {
                if write_record_soa(
                    reply,
                    &mut out,
                    answer_end,
                    "",
                    Some(qname_offset),
                    CLASS_IN,
                    self.zone.ns_ttl,
                    &self.zone.ns,
                    mbox,
                    serial,
                    SOA_REFRESH,
                    SOA_RETRY,
                    SOA_EXPIRE,
                    SOA_MINIMUM,
                )
                .is_ok()
                {
                    ancount += 1;
                }
            }
        }

        if (qtype == TYPE_A || qtype == TYPE_AAAA || qtype == QTYPE_ANY) && class_ok {
            let want_v4 = qtype == TYPE_A || qtype == QTYPE_ANY;
            let want_v6 = qtype == TYPE_AAAA || qtype == QTYPE_ANY;
            let mut addrs = [IpAddr::V4(Ipv4Addr::UNSPECIFIED); MAX_ADDRS];
            let count = self
                .selector
                .select(name.as_str(), &mut addrs, want_v4, want_v6)
                .min(MAX_ADDRS);
            for addr in &addrs[..count] {
                let written = match addr {
                    IpAddr::V4(_) => write_record_a(
                        reply,
                        &mut out,
                        answer_end,
                        "",
                        Some(qname_offset),
                        CLASS_IN,
                        self.zone.data_ttl,
                        addr,
                    ),
                    IpAddr::V6(_) => write_record_aaaa(
                        reply,
                        &mut out,
                        answer_end,
                        "",
                        Some(qname_offset),
                        CLASS_IN,
                        self.zone.data_ttl,
                        addr,
                    ),
                };
                if written.is_err() {
                    // out of room; keep what already fits
                    break;
                }
                ancount += 1;
            }
        }

        // Authority section
        if ancount > 0 && !have_ns {
            if write_record_ns(
                reply,
                &mut out,
                MAX_PACKET_SIZE,
                "",
                Some(qname_offset),
                CLASS_IN,
                self.zone.ns_ttl,
                &self.zone.ns,
            )
            .is_ok()
            {
                nscount += 1;
            }
        } else if ancount == 0 {
            // Negative response: answer with SOA, never a bare NS. A
            // resolver takes a lone NS as a referral and would chase it
            // right back here in a loop.
            if let Some(mbox) = &self.zone.mbox {
                if write_record_soa(
                    reply,
                    &mut out,
                    MAX_PACKET_SIZE,
                    "",
                    Some(qname_offset),
                    CLASS_IN,
                    self.zone.ns_ttl,
                    &self.zone.ns,
                    mbox,
                    serial,
                    SOA_REFRESH,
                    SOA_RETRY,
                    SOA_EXPIRE,
                    SOA_MINIMUM,
                )
                .is_ok()
                {
                    nscount += 1;
                }
            }
        }

        reply[2] |= 0x04; // AA
        reply[6..8].copy_from_slice(&ancount.to_be_bytes());
        reply[8..10].copy_from_slice(&nscount.to_be_bytes());
        reply[10] = 0;
        reply[11] = 0; // ARCOUNT

        Some(out)
    }

    /// Case-insensitive match: the apex itself, or any name ending in
    /// `.<apex>`.
    fn zone_match(&self, name: &[u8]) -> bool {
        let host = self.zone.host.as_bytes();
        if name.eq_ignore_ascii_case(host) {
            return true;
        }
        name.len() >= host.len() + 2
            && name[name.len() - host.len() - 1] == b'.'
            && name[name.len() - host.len()..].eq_ignore_ascii_case(host)
    }

    /// Trial-write both authority candidates at `at` and return the
    /// larger byte count. The scribbled bytes are overwritten by the real
    /// answer records.
    fn max_authority_size(
        &self,
        reply: &mut [u8; MAX_PACKET_SIZE],
        at: usize,
        qname_offset: u16,
    ) -> usize {
        let mut max = 0;

        let mut probe = at;
        if write_record_ns(
            reply,
            &mut probe,
            MAX_PACKET_SIZE,
            "",
            Some(qname_offset),
            CLASS_IN,
            self.zone.ns_ttl,
            &self.zone.ns,
        )
        .is_ok()
        {
            max = probe - at;
        }

        if let Some(mbox) = &self.zone.mbox {
            let mut probe = at;
            if write_record_soa(
                reply,
                &mut probe,
                MAX_PACKET_SIZE,
                "",
                Some(qname_offset),
                CLASS_IN,
                self.zone.ns_ttl,
                &self.zone.ns,
                mbox,
                0,
                SOA_REFRESH,
                SOA_RETRY,
                SOA_EXPIRE,
                SOA_MINIMUM,
            )
            .is_ok()
            {
                max = max.max(probe - at);
            }
        }

        max
    }
}

/// Rewrite the header for an error reply: RCODE in the low four bits of
/// byte 3, all section counts zeroed. The reply is the bare header.
fn set_rcode(reply: &mut [u8; MAX_PACKET_SIZE], rcode: Rcode) -> usize {
    reply[3] |= rcode as u8 & 0x0F;
    for b in &mut reply[4..HEADER_SIZE] {
        *b = 0;
    }
    HEADER_SIZE
}

/// SOA serial: current wall-clock seconds.
fn unix_time() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
