use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::{headers, Range};

/// Errors surfaced while walking a frame's headers.
///
/// These are classification failures, not non-matches: a frame the walk
/// cannot make sense of is reported to the caller instead of being silently
/// passed as "not filtered".
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MatchError {
    /// The frame is shorter than the headers its ether type implies.
    #[error("undersized packet: need {needed} bytes, have {have}")]
    UndersizedPacket {
        /// Bytes the walk needed to read.
        needed: usize,
        /// Bytes actually present.
        have: usize,
    },
    /// An IPv6 next-header value the walk does not understand.
    #[error("unrecognized IPv6 header type {0}")]
    UnrecognizedHeaderType(u8),
}

/// Error parsing rule text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A rule did not have exactly three `;`-separated fields.
    #[error("rule {index}: expected 3 fields (ethertype;protocol;port), found {found}")]
    FieldCount {
        /// 0-based index of the offending rule in its list.
        index: usize,
        /// Number of fields actually present.
        found: usize,
    },
}

/// A single deny rule over (ether type, IP protocol, port).
///
/// The ether type is evaluated first since it changes the meaning of the
/// other two fields. "Port" is really "transport selector": for ICMP and
/// ICMPv6 it matches the message type byte instead of a port number.
///
/// The text form is `ethertype;protocol;port` with each field `*`, a single
/// integer, or `a-b`. Numeric fields are lenient: a token that fails to
/// parse as an integer (including the empty token) reads as 0, matching the
/// `strtoul` behavior rule strings have historically been written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rule {
    ether_type: Range<u32>,
    protocol: Range<u32>,
    port: Range<u32>,
}

impl Rule {
    /// Creates a rule from its three ranges.
    pub fn new(ether_type: Range<u32>, protocol: Range<u32>, port: Range<u32>) -> Self {
        Self { ether_type, protocol, port }
    }

    /// The ether-type range.
    pub fn ether_type(&self) -> Range<u32> {
        self.ether_type
    }

    /// The IP-protocol range.
    pub fn protocol(&self) -> Range<u32> {
        self.protocol
    }

    /// The port (or ICMP-type) range.
    pub fn port(&self) -> Range<u32> {
        self.port
    }

    /// Tests this rule against a frame.
    ///
    /// `header` is the frame payload starting at the IP header (for IPv4 and
    /// IPv6 ether types); for any other ether type it is not inspected.
    pub fn matches(&self, ether_type: u32, header: &[u8]) -> Result<bool, MatchError> {
        if !self.ether_type.contains(ether_type) {
            return Ok(false);
        }

        match ether_type {
            headers::ETHERTYPE_IPV4 => self.match_ipv4(header),
            headers::ETHERTYPE_IPV6 => self.match_ipv6(header),
            // Protocol and port have no meaning outside IP; the ether-type
            // match alone decides.
            _ => Ok(true),
        }
    }

    fn match_ipv4(&self, header: &[u8]) -> Result<bool, MatchError> {
        if header.len() < 20 {
            return Err(MatchError::UndersizedPacket { needed: 20, have: header.len() });
        }

        let protocol = u32::from(header[9]);
        if !self.protocol.contains(protocol) {
            return Ok(false);
        }

        if self.port.is_wildcard() {
            // Protocol-only rule, nothing left to check.
            return Ok(true);
        }

        // Only fragment 0 carries the transport header, so a port rule can
        // never match a later fragment.
        let fragment_offset = u16::from_be_bytes([header[6], header[7]]) & 0x1fff;
        if fragment_offset != 0 {
            return Ok(false);
        }

        let ihl = usize::from(header[0] & 0x0f) * 4;
        match protocol {
            headers::IPPROTO_ICMP => {
                let icmp_type = read_u8(header, ihl)?;
                tracing::trace!(
                    "icmp {} ({})",
                    icmp_type,
                    headers::icmp_type_name(u32::from(icmp_type))
                );
                Ok(self.port.contains(u32::from(icmp_type)))
            }
            headers::IPPROTO_TCP |
            headers::IPPROTO_UDP |
            headers::IPPROTO_SCTP |
            headers::IPPROTO_UDPLITE => {
                let port = read_u16(header, ihl + 2)?;
                Ok(self.port.contains(u32::from(port)))
            }
            // Port has no defined meaning for this protocol; the protocol
            // match stands on its own.
            _ => Ok(true),
        }
    }

    fn match_ipv6(&self, header: &[u8]) -> Result<bool, MatchError> {
        if header.len() < 40 {
            return Err(MatchError::UndersizedPacket { needed: 40, have: header.len() });
        }

        let mut next_header = header[6];
        let mut offset = 40usize;

        loop {
            let nh = u32::from(next_header);
            match nh {
                headers::IPV6_HOP_BY_HOP |
                headers::IPV6_ROUTING |
                headers::IPV6_DEST_OPTS |
                headers::IPV6_MOBILITY => {
                    // An explicitly selected extension header matches as-is,
                    // without descending further. A wildcard keeps walking
                    // toward the real payload.
                    if self.protocol.selects(nh) {
                        return Ok(true);
                    }
                    next_header = read_u8(header, offset)?;
                    let ext_len = read_u8(header, offset + 1)?;
                    offset += 8 + 8 * usize::from(ext_len);
                }
                headers::IPV6_FRAGMENT => {
                    if self.protocol.selects(nh) {
                        return Ok(true);
                    }
                    next_header = read_u8(header, offset)?;
                    offset += 8;
                }
                // Nothing is readable past an ESP or AH header; the chain
                // ends here and the protocol range decides.
                headers::IPPROTO_ESP | headers::IPPROTO_AH => {
                    return Ok(self.protocol.contains(nh));
                }
                headers::IPPROTO_ICMPV6 => {
                    if !self.protocol.contains(nh) {
                        return Ok(false);
                    }
                    if self.port.is_wildcard() {
                        return Ok(true);
                    }
                    let icmp_type = read_u8(header, offset)?;
                    return Ok(self.port.contains(u32::from(icmp_type)));
                }
                headers::IPPROTO_TCP |
                headers::IPPROTO_UDP |
                headers::IPPROTO_SCTP |
                headers::IPPROTO_UDPLITE => {
                    if !self.protocol.contains(nh) {
                        return Ok(false);
                    }
                    if self.port.is_wildcard() {
                        return Ok(true);
                    }
                    let port = read_u16(header, offset + 2)?;
                    return Ok(self.port.contains(u32::from(port)));
                }
                other => {
                    tracing::trace!(
                        "unrecognized ipv6 next-header {} ({})",
                        other,
                        headers::ip_protocol_name(other)
                    );
                    return Err(MatchError::UnrecognizedHeaderType(next_header));
                }
            }
        }
    }

    pub(crate) fn parse_indexed(s: &str, index: usize) -> Result<Self, ParseError> {
        let fields: Vec<&str> = s.split(';').collect();
        if fields.len() != 3 {
            return Err(ParseError::FieldCount { index, found: fields.len() });
        }

        Ok(Self::new(
            parse_field(fields[0]),
            parse_field(fields[1]),
            parse_field(fields[2]),
        ))
    }
}

impl FromStr for Rule {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_indexed(s, 0)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{};{}", self.ether_type, self.protocol, self.port)
    }
}

fn parse_field(token: &str) -> Range<u32> {
    let token = token.trim();
    if token == "*" {
        return Range::wildcard();
    }

    match token.split_once('-') {
        Some((start, end)) => Range::new(lenient_u32(start), lenient_u32(end)),
        None => Range::single(lenient_u32(token)),
    }
}

// Unparseable numeric tokens (including the empty token) read as 0, as
// strtoul does. Rule strings have been hand-edited against that behavior
// for long enough that it is part of the format.
fn lenient_u32(token: &str) -> u32 {
    token.trim().parse().unwrap_or(0)
}

fn read_u8(buf: &[u8], offset: usize) -> Result<u8, MatchError> {
    buf.get(offset)
        .copied()
        .ok_or(MatchError::UndersizedPacket { needed: offset + 1, have: buf.len() })
}

fn read_u16(buf: &[u8], offset: usize) -> Result<u16, MatchError> {
    match buf.get(offset..offset + 2) {
        Some(b) => Ok(u16::from_be_bytes([b[0], b[1]])),
        None => Err(MatchError::UndersizedPacket { needed: offset + 2, have: buf.len() }),
    }
}
