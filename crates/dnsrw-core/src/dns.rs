//! DNS wire codec
//!
//! Parses the first question of a DNS message and serializes synthetic
//! answers. Only the slice of the wire format needed for rewriting is
//! implemented; everything else is forwarded untouched by the engine.

use crate::error::{Error, Result};
use std::fmt;
use std::net::Ipv4Addr;

/// DNS header length in bytes
pub const HEADER_LEN: usize = 12;

/// TTL of synthesized answer records, in seconds
pub const ANSWER_TTL: u32 = 3600;

const FLAG_QR: u16 = 0x8000;
const FLAG_AA: u16 = 0x0400;
const FLAG_RD: u16 = 0x0100;
const FLAG_RA: u16 = 0x0080;
const RCODE_NXDOMAIN: u16 = 3;
const CLASS_IN: u16 = 1;

// Answer names point back at the question name, which always starts right
// after the 12-byte header.
const QUESTION_NAME_POINTER: [u8; 2] = [0xC0, 0x0C];

// Compression pointers may only move, never cycle; real messages need a
// handful at most.
const MAX_POINTER_JUMPS: usize = 8;

/// Record type of a DNS question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    /// IPv4 host address (type 1)
    A,
    /// IPv6 host address (type 28)
    Aaaa,
    /// HTTPS service binding (type 65)
    Https,
    /// Any other record type
    Other(u16),
}

impl QueryType {
    /// Create from the wire type code
    pub fn from_u16(code: u16) -> Self {
        match code {
            1 => QueryType::A,
            28 => QueryType::Aaaa,
            65 => QueryType::Https,
            other => QueryType::Other(other),
        }
    }

    /// Wire type code
    pub fn to_u16(self) -> u16 {
        match self {
            QueryType::A => 1,
            QueryType::Aaaa => 28,
            QueryType::Https => 65,
            QueryType::Other(code) => code,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::A => write!(f, "A"),
            QueryType::Aaaa => write!(f, "AAAA"),
            QueryType::Https => write!(f, "HTTPS"),
            QueryType::Other(code) => write!(f, "TYPE{code}"),
        }
    }
}

/// The first question of a DNS message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Queried name, lower-cased, without the trailing dot
    pub name: String,
    /// Question type
    pub qtype: QueryType,
    /// Question class (IN for anything we answer)
    pub qclass: u16,
}

/// Transaction id of a DNS message
pub fn transaction_id(message: &[u8]) -> Result<u16> {
    if message.len() < 2 {
        return Err(Error::dns_parse("message too short for a transaction id"));
    }
    Ok(u16::from_be_bytes([message[0], message[1]]))
}

/// Parse the first question record of a DNS message
///
/// A message without a question record is a parse failure; the caller is
/// expected to fail open and forward the original packet.
pub fn parse_question(message: &[u8]) -> Result<Question> {
    if message.len() < HEADER_LEN {
        return Err(Error::dns_parse(format!(
            "message too short: {} bytes",
            message.len()
        )));
    }

    let qdcount = u16::from_be_bytes([message[4], message[5]]);
    if qdcount == 0 {
        return Err(Error::dns_parse("no question record"));
    }

    let mut offset = HEADER_LEN;
    let name = parse_name(message, &mut offset)?;

    if offset + 4 > message.len() {
        return Err(Error::dns_parse("question truncated"));
    }
    let qtype = u16::from_be_bytes([message[offset], message[offset + 1]]);
    let qclass = u16::from_be_bytes([message[offset + 2], message[offset + 3]]);

    Ok(Question {
        name,
        qtype: QueryType::from_u16(qtype),
        qclass,
    })
}

/// Build a response answering the question with a single A record
///
/// Sets the query-response and authoritative-answer flags, echoes the
/// question, and appends one A/IN record with [`ANSWER_TTL`] pointing at
/// `address`.
pub fn build_answer(id: u16, question: &Question, address: Ipv4Addr) -> Vec<u8> {
    let mut out = header(id, FLAG_QR | FLAG_AA | FLAG_RD | FLAG_RA, 1);
    push_question(&mut out, question);

    out.extend_from_slice(&QUESTION_NAME_POINTER);
    out.extend_from_slice(&QueryType::A.to_u16().to_be_bytes());
    out.extend_from_slice(&CLASS_IN.to_be_bytes());
    out.extend_from_slice(&ANSWER_TTL.to_be_bytes());
    out.extend_from_slice(&4u16.to_be_bytes());
    out.extend_from_slice(&address.octets());
    out
}

/// Build an NXDOMAIN response echoing the question
pub fn build_nxdomain(id: u16, question: &Question) -> Vec<u8> {
    let mut out = header(id, FLAG_QR | FLAG_AA | FLAG_RD | FLAG_RA | RCODE_NXDOMAIN, 0);
    push_question(&mut out, question);
    out
}

fn header(id: u16, flags: u16, ancount: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&id.to_be_bytes());
    out.extend_from_slice(&flags.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    out.extend_from_slice(&ancount.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // NSCOUNT
    out.extend_from_slice(&0u16.to_be_bytes()); // ARCOUNT
    out
}

fn push_question(out: &mut Vec<u8>, question: &Question) {
    encode_name(&question.name, out);
    out.extend_from_slice(&question.qtype.to_u16().to_be_bytes());
    out.extend_from_slice(&question.qclass.to_be_bytes());
}

fn encode_name(name: &str, out: &mut Vec<u8>) {
    for label in name.split('.').filter(|label| !label.is_empty()) {
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
}

/// Parse a (possibly compressed) name, advancing `offset` past it
fn parse_name(message: &[u8], offset: &mut usize) -> Result<String> {
    let mut labels: Vec<String> = Vec::new();
    let mut pos = *offset;
    let mut jumped = false;
    let mut jumps = 0;

    loop {
        let len = *message
            .get(pos)
            .ok_or_else(|| Error::dns_parse("name extends beyond message"))?
            as usize;

        if len == 0 {
            pos += 1;
            break;
        }

        if len & 0xC0 == 0xC0 {
            let low = *message
                .get(pos + 1)
                .ok_or_else(|| Error::dns_parse("compression pointer extends beyond message"))?
                as usize;
            jumps += 1;
            if jumps > MAX_POINTER_JUMPS {
                return Err(Error::dns_parse("compression pointer loop"));
            }
            if !jumped {
                *offset = pos + 2;
                jumped = true;
            }
            pos = ((len & 0x3F) << 8) | low;
            continue;
        }

        if len & 0xC0 != 0 {
            return Err(Error::dns_parse(format!("reserved label type: {len:#x}")));
        }

        pos += 1;
        let label = message
            .get(pos..pos + len)
            .ok_or_else(|| Error::dns_parse("label extends beyond message"))?;
        labels.push(String::from_utf8_lossy(label).to_lowercase());
        pos += len;
    }

    if !jumped {
        *offset = pos;
    }

    Ok(labels.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Standard query for example.com, type A
    fn example_com_query() -> Vec<u8> {
        vec![
            0x12, 0x34, // Transaction ID
            0x01, 0x00, // Flags: standard query, recursion desired
            0x00, 0x01, // Questions: 1
            0x00, 0x00, // Answer RRs: 0
            0x00, 0x00, // Authority RRs: 0
            0x00, 0x00, // Additional RRs: 0
            0x07, b'e', b'x', b'a', b'm', b'p', b'l', b'e', // "example"
            0x03, b'c', b'o', b'm', // "com"
            0x00, // root
            0x00, 0x01, // Type: A
            0x00, 0x01, // Class: IN
        ]
    }

    #[test]
    fn test_parse_simple_query() {
        let message = example_com_query();
        let question = parse_question(&message).unwrap();

        assert_eq!(question.name, "example.com");
        assert_eq!(question.qtype, QueryType::A);
        assert_eq!(question.qclass, 1);
        assert_eq!(transaction_id(&message).unwrap(), 0x1234);
    }

    #[test]
    fn test_parse_lowercases_name() {
        let mut message = example_com_query();
        message[13] = b'E';
        message[14] = b'X';
        let question = parse_question(&message).unwrap();
        assert_eq!(question.name, "example.com");
    }

    #[test]
    fn test_parse_aaaa_and_https_types() {
        let mut message = example_com_query();
        message[26] = 28;
        assert_eq!(parse_question(&message).unwrap().qtype, QueryType::Aaaa);
        message[26] = 65;
        assert_eq!(parse_question(&message).unwrap().qtype, QueryType::Https);
        message[26] = 16;
        assert_eq!(
            parse_question(&message).unwrap().qtype,
            QueryType::Other(16)
        );
    }

    #[test]
    fn test_parse_rejects_empty_question_section() {
        let mut message = example_com_query();
        message[5] = 0; // QDCOUNT = 0
        assert!(parse_question(&message).is_err());
    }

    #[test]
    fn test_parse_rejects_short_message() {
        assert!(parse_question(&[0x12, 0x34, 0x01, 0x00]).is_err());
    }

    #[test]
    fn test_parse_rejects_truncated_question() {
        let message = example_com_query();
        assert!(parse_question(&message[..message.len() - 2]).is_err());
    }

    #[test]
    fn test_parse_compressed_name() {
        // Question name is a pointer to a name stored after the question.
        // Contrived but exercises the jump path.
        let message = vec![
            0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0xC0, 0x12, // pointer to offset 18
            0x00, 0x01, 0x00, 0x01, // qtype, qclass
            0x03, b'f', b'o', b'o', 0x03, b'b', b'a', b'r', 0x00, // "foo.bar" at 18
        ];
        let question = parse_question(&message).unwrap();
        assert_eq!(question.name, "foo.bar");
        assert_eq!(question.qtype, QueryType::A);
    }

    #[test]
    fn test_parse_rejects_pointer_loop() {
        let message = vec![
            0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0xC0, 0x0C, // points at itself
            0x00, 0x01, 0x00, 0x01,
        ];
        assert!(parse_question(&message).is_err());
    }

    #[test]
    fn test_build_answer_layout() {
        let question = Question {
            name: "example.com".to_string(),
            qtype: QueryType::A,
            qclass: 1,
        };
        let answer = build_answer(0x1234, &question, Ipv4Addr::new(1, 2, 3, 4));

        // Header
        assert_eq!(&answer[0..2], &[0x12, 0x34]);
        let flags = u16::from_be_bytes([answer[2], answer[3]]);
        assert_ne!(flags & FLAG_QR, 0);
        assert_ne!(flags & FLAG_AA, 0);
        assert_eq!(flags & 0x000F, 0); // NOERROR
        assert_eq!(&answer[4..6], &[0x00, 0x01]); // QDCOUNT
        assert_eq!(&answer[6..8], &[0x00, 0x01]); // ANCOUNT

        // Question echo
        let echoed = parse_question(&answer).unwrap();
        assert_eq!(echoed, question);

        // Answer record sits right after the 17-byte question
        let rr = &answer[HEADER_LEN + 17..];
        assert_eq!(&rr[0..2], &QUESTION_NAME_POINTER);
        assert_eq!(&rr[2..4], &[0x00, 0x01]); // type A
        assert_eq!(&rr[4..6], &[0x00, 0x01]); // class IN
        assert_eq!(u32::from_be_bytes([rr[6], rr[7], rr[8], rr[9]]), ANSWER_TTL);
        assert_eq!(&rr[10..12], &[0x00, 0x04]); // RDLENGTH
        assert_eq!(&rr[12..16], &[1, 2, 3, 4]); // RDATA
        assert_eq!(rr.len(), 16);
    }

    #[test]
    fn test_answer_roundtrip_via_parser() {
        let question = parse_question(&example_com_query()).unwrap();
        let answer = build_answer(0xBEEF, &question, Ipv4Addr::new(5, 6, 7, 8));

        assert_eq!(transaction_id(&answer).unwrap(), 0xBEEF);
        let parsed = parse_question(&answer).unwrap();
        assert_eq!(parsed.name, question.name);
        assert_eq!(parsed.qtype, question.qtype);
        // The answer's pointer resolves back to the question name
        let mut offset = HEADER_LEN + 17;
        let rr_name = parse_name(&answer, &mut offset).unwrap();
        assert_eq!(rr_name, "example.com");
    }

    #[test]
    fn test_build_nxdomain() {
        let question = Question {
            name: "blocked.example".to_string(),
            qtype: QueryType::Aaaa,
            qclass: 1,
        };
        let response = build_nxdomain(0x4242, &question);

        let flags = u16::from_be_bytes([response[2], response[3]]);
        assert_ne!(flags & FLAG_QR, 0);
        assert_eq!(flags & 0x000F, RCODE_NXDOMAIN);
        assert_eq!(&response[6..8], &[0x00, 0x00]); // no answers

        let echoed = parse_question(&response).unwrap();
        assert_eq!(echoed, question);
        // Nothing after the question section
        assert_eq!(response.len(), HEADER_LEN + 1 + 7 + 1 + 7 + 1 + 4);
    }

    #[test]
    fn test_query_type_display() {
        assert_eq!(QueryType::A.to_string(), "A");
        assert_eq!(QueryType::Aaaa.to_string(), "AAAA");
        assert_eq!(QueryType::Https.to_string(), "HTTPS");
        assert_eq!(QueryType::Other(16).to_string(), "TYPE16");
    }
}
