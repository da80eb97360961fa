//! Integration tests for packet surgery and the DNS codec
//!
//! Covers the checksum self-consistency property and the full
//! question-to-response round trip across module boundaries.

use dnsrw_core::dns::{self, QueryType};
use dnsrw_core::packet::{build_dns_response, internet_checksum, ipv4_header_checksum};
use proptest::prelude::*;
use std::net::Ipv4Addr;

/// Query packet helper shared with the engine tests
fn dns_query_packet(domain: &str) -> Vec<u8> {
    let mut dns = vec![
        0x51, 0x77, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    for label in domain.split('.') {
        dns.push(label.len() as u8);
        dns.extend_from_slice(label.as_bytes());
    }
    dns.push(0);
    dns.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);

    let total_len = (28 + dns.len()) as u16;
    let udp_len = (8 + dns.len()) as u16;
    let mut packet = vec![
        0x45, 0x00,
        (total_len >> 8) as u8, (total_len & 0xFF) as u8,
        0x00, 0x01, 0x00, 0x00,
        0x40, 0x11, 0x00, 0x00,
        0x0A, 0x00, 0x00, 0x02,
        0x08, 0x08, 0x08, 0x08,
        0xA0, 0x01, 0x00, 0x35,
        (udp_len >> 8) as u8, (udp_len & 0xFF) as u8,
        0x00, 0x00,
    ];
    packet.extend_from_slice(&dns);
    packet
}

#[test]
fn question_to_response_roundtrip() {
    let request = dns_query_packet("www.example.com");
    let message = &request[28..];

    let id = dns::transaction_id(message).unwrap();
    let question = dns::parse_question(message).unwrap();
    assert_eq!(question.name, "www.example.com");
    assert_eq!(question.qtype, QueryType::A);

    let answer = dns::build_answer(id, &question, Ipv4Addr::new(203, 0, 113, 7));
    let response = build_dns_response(&request, 20, &answer).unwrap();

    // The response parses as a DNS message answering the same question
    let response_dns = &response[28..];
    assert_eq!(dns::transaction_id(response_dns).unwrap(), id);
    let echoed = dns::parse_question(response_dns).unwrap();
    assert_eq!(echoed, question);
    assert_eq!(
        &response_dns[response_dns.len() - 4..],
        &[203, 0, 113, 7]
    );

    // And its IP header verifies under RFC 1071
    assert_eq!(internet_checksum(&response[..20]), 0);
}

proptest! {
    /// Inserting a freshly computed checksum makes any 20-byte header
    /// self-consistent: an independent RFC 1071 sum over the complete
    /// header folds to zero.
    #[test]
    fn checksum_self_consistency(mut header in proptest::collection::vec(any::<u8>(), 20)) {
        let checksum = ipv4_header_checksum(&header);
        header[10..12].copy_from_slice(&checksum.to_be_bytes());
        prop_assert_eq!(internet_checksum(&header), 0);
    }

    /// Same property for longer buffers, including odd lengths where the
    /// trailing byte pads into the high half of a final word
    #[test]
    fn checksum_self_consistency_with_options(
        mut header in proptest::collection::vec(any::<u8>(), 24..=61)
    ) {
        let checksum = ipv4_header_checksum(&header);
        header[10..12].copy_from_slice(&checksum.to_be_bytes());
        prop_assert_eq!(internet_checksum(&header), 0);
    }

    /// Classification never panics and never changes its mind
    #[test]
    fn classify_total_and_idempotent(packet in proptest::collection::vec(any::<u8>(), 0..128)) {
        let first = dnsrw_core::packet::classify(&packet);
        let second = dnsrw_core::packet::classify(&packet);
        prop_assert_eq!(first, second);
    }
}
