//! DNS response packet construction
//!
//! Builds a reply by mutating a copy of the request rather than building a
//! packet from first principles; only the fields that actually change are
//! recomputed.

use super::checksum::internet_checksum;
use super::UDP_HEADER_LEN;
use crate::error::{Error, Result};
use bytes::BytesMut;

/// Build an IP/UDP response packet around a DNS answer payload
///
/// `request` must be the original IPv4 request packet and `ip_header_len`
/// its IP header length as reported by classification. The returned packet
/// reuses the request's IP header with source/destination swapped, carries
/// a fresh UDP header with swapped ports, and ends with `dns_payload`.
///
/// The UDP checksum is left at zero, which IPv4 permits.
pub fn build_dns_response(
    request: &[u8],
    ip_header_len: usize,
    dns_payload: &[u8],
) -> Result<BytesMut> {
    if ip_header_len < 20 || request.len() < ip_header_len + UDP_HEADER_LEN {
        return Err(Error::PacketTooSmall {
            expected: ip_header_len.max(20) + UDP_HEADER_LEN,
            actual: request.len(),
        });
    }

    let udp_len = UDP_HEADER_LEN + dns_payload.len();
    let total_len = ip_header_len + udp_len;

    let mut response = BytesMut::with_capacity(total_len);

    // IP header, copied verbatim then patched in place
    response.extend_from_slice(&request[..ip_header_len]);

    // Swap source (12..16) and destination (16..20) addresses
    response[12..16].copy_from_slice(&request[16..20]);
    response[16..20].copy_from_slice(&request[12..16]);

    // New total length
    response[2..4].copy_from_slice(&(total_len as u16).to_be_bytes());

    // Zero the checksum field, then recompute over the full header
    response[10] = 0;
    response[11] = 0;
    let ip_checksum = internet_checksum(&response[..ip_header_len]);
    response[10..12].copy_from_slice(&ip_checksum.to_be_bytes());

    // UDP header: ports swapped relative to the request
    let src_port = &request[ip_header_len..ip_header_len + 2];
    let dst_port = &request[ip_header_len + 2..ip_header_len + 4];
    response.extend_from_slice(dst_port);
    response.extend_from_slice(src_port);
    response.extend_from_slice(&(udp_len as u16).to_be_bytes());
    response.extend_from_slice(&[0, 0]); // UDP checksum: optional over IPv4

    response.extend_from_slice(dns_payload);

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{destination_ip, source_ip};

    fn dns_request() -> Vec<u8> {
        let payload = [0xAAu8; 24];
        let total_len = (20 + 8 + payload.len()) as u16;
        let mut packet = vec![
            0x45, 0x00,
            (total_len >> 8) as u8, (total_len & 0xFF) as u8,
            0x00, 0x01, 0x00, 0x00,
            0x40, 0x11, 0x00, 0x00,
            0x0A, 0x00, 0x00, 0x02, // Source IP: 10.0.0.2
            0x08, 0x08, 0x08, 0x08, // Dest IP: 8.8.8.8
            0xD4, 0x31, 0x00, 0x35, // Src Port (54321), Dst Port (53)
            0x00, 0x20, 0x00, 0x00, // UDP length (32), checksum
        ];
        packet.extend_from_slice(&payload);
        packet
    }

    #[test]
    fn test_addresses_and_ports_swapped() {
        let request = dns_request();
        let answer = [0x11u8; 45];
        let response = build_dns_response(&request, 20, &answer).unwrap();

        assert_eq!(source_ip(&response), destination_ip(&request));
        assert_eq!(destination_ip(&response), source_ip(&request));
        // Source port 53, destination port 54321
        assert_eq!(&response[20..22], &[0x00, 0x35]);
        assert_eq!(&response[22..24], &[0xD4, 0x31]);
    }

    #[test]
    fn test_lengths() {
        let request = dns_request();
        let answer = [0x11u8; 45];
        let response = build_dns_response(&request, 20, &answer).unwrap();

        assert_eq!(response.len(), 20 + 8 + 45);
        let total = u16::from_be_bytes([response[2], response[3]]);
        assert_eq!(total as usize, response.len());
        let udp_len = u16::from_be_bytes([response[24], response[25]]);
        assert_eq!(udp_len as usize, 8 + 45);
    }

    #[test]
    fn test_ip_checksum_self_consistent() {
        let request = dns_request();
        let response = build_dns_response(&request, 20, &[0x22u8; 31]).unwrap();

        // RFC 1071 verification over the complete header sums to zero
        assert_eq!(internet_checksum(&response[..20]), 0);
        // And the field itself is not trivially zero
        assert_ne!(&response[10..12], &[0, 0]);
    }

    #[test]
    fn test_udp_checksum_zero() {
        let request = dns_request();
        let response = build_dns_response(&request, 20, &[0x33u8; 12]).unwrap();
        assert_eq!(&response[26..28], &[0, 0]);
    }

    #[test]
    fn test_payload_appended() {
        let request = dns_request();
        let answer = [0xCDu8; 17];
        let response = build_dns_response(&request, 20, &answer).unwrap();
        assert_eq!(&response[28..], &answer);
    }

    #[test]
    fn test_request_left_untouched() {
        let request = dns_request();
        let before = request.clone();
        let _ = build_dns_response(&request, 20, &[0u8; 8]).unwrap();
        assert_eq!(request, before);
    }

    #[test]
    fn test_truncated_request_rejected() {
        let request = dns_request();
        let result = build_dns_response(&request[..24], 20, &[0u8; 8]);
        assert!(matches!(result, Err(Error::PacketTooSmall { .. })));
    }
}
