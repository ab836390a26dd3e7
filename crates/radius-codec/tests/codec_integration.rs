//! End-to-end tests for the RADIUS codec
//!
//! These tests exercise the public API the way a client and a server
//! would use it:
//! - The worked example from RFC 2865 Section 7.1
//! - Reply verification against tampered packets
//! - Malformed input rejection
//! - Vendor-specific attributes
//! - Accounting requests
//! - Concurrent identifier allocation

use radius_codec::accounting::{AcctPacket, AcctStatusType};
use radius_codec::attributes::{AttributeKey, AttributeValue};
use radius_codec::dictionary::{AttributeDescriptor, Dictionary, MemoryDictionary};
use radius_codec::packet::{Code, IdAllocator, Packet, PacketError};
use radius_codec::{AuthPacket, CodecConfig, DataType};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread;

/// RFC 2865 Section 7.1: nemo / arctangent from NAS 192.168.1.16 port 3
const RFC_REQUEST: &str = "01000038\
    0f403f9473978057bd83d5cb98f4227a\
    01066e656d6f\
    02120dbe708d93d413ce3196e43f782a0aee\
    0406c0a80110\
    050600000003";

/// RFC 2865 Section 7.1: Access-Accept for the request above
const RFC_ACCEPT: &str = "02000026\
    86fe220e7624ba2a1005f6bf9b55e0b2\
    060600000001\
    0f0600000000\
    0e06c0a80103";

const RFC_SECRET: &[u8] = b"xyzzy5461";

fn dictionary() -> Arc<dyn Dictionary> {
    Arc::new(MemoryDictionary::rfc2865())
}

fn cisco_dictionary() -> Arc<dyn Dictionary> {
    Arc::new(
        MemoryDictionary::rfc2865()
            .with_vendor(9, "Cisco")
            .with_attribute(AttributeDescriptor::new("Cisco-AVPair", 1, DataType::String).vendor(9)),
    )
}

fn rfc_request() -> (Vec<u8>, AuthPacket) {
    let bytes = hex::decode(RFC_REQUEST).unwrap();
    let packet = AuthPacket::decode(&bytes, RFC_SECRET, dictionary()).unwrap();
    (bytes, packet)
}

#[test]
fn test_rfc2865_access_request() {
    let (bytes, mut request) = rfc_request();
    assert_eq!(request.packet_code(), Some(Code::AccessRequest));
    assert_eq!(request.id, Some(0));
    assert_eq!(request.raw_packet(), Some(bytes.as_slice()));

    assert_eq!(request.get_attribute("User-Name").unwrap(), vec![AttributeValue::from("nemo")]);
    assert_eq!(
        request.get_attribute("NAS-IP-Address").unwrap(),
        vec![AttributeValue::IpAddr(Ipv4Addr::new(192, 168, 1, 16))]
    );
    assert_eq!(request.get_attribute("NAS-Port").unwrap(), vec![AttributeValue::Integer(3)]);

    request.decrypt_attributes().unwrap();
    assert_eq!(
        request.get_attribute("User-Password").unwrap(),
        vec![AttributeValue::from("arctangent")]
    );
}

#[test]
fn test_rfc2865_access_request_reencodes_identically() {
    let (bytes, _) = rfc_request();
    let authenticator: [u8; 16] = bytes[4..20].try_into().unwrap();
    let ids = IdAllocator::new(0);

    let mut request = AuthPacket::new(RFC_SECRET, dictionary())
        .with_id(0)
        .with_authenticator(authenticator);
    request.add_attribute("User-Name", "nemo").unwrap();
    request.set_user_password(b"arctangent");
    request.add_attribute("NAS-IP-Address", Ipv4Addr::new(192, 168, 1, 16)).unwrap();
    request.add_attribute("NAS-Port", 3u32).unwrap();

    assert_eq!(request.encode_request(&ids).unwrap(), bytes);
}

#[test]
fn test_rfc2865_access_accept() {
    let (_, request) = rfc_request();
    let accept = hex::decode(RFC_ACCEPT).unwrap();

    let reply = Packet::decode(&accept, RFC_SECRET, dictionary()).unwrap();
    assert_eq!(reply.packet_code(), Some(Code::AccessAccept));
    assert_eq!(reply.get_attribute("Service-Type").unwrap(), vec![AttributeValue::from("Login-User")]);
    assert!(request.verify_reply(&reply, Some(&accept)));
    assert!(request.verify_reply(&reply, None));

    // The same reply built from scratch carries the same authenticator
    let mut built = request.create_reply();
    built.add_attribute("Service-Type", "Login-User").unwrap();
    built.add_attribute("Login-Service", 0u32).unwrap();
    built.add_attribute("Login-IP-Host", Ipv4Addr::new(192, 168, 1, 3)).unwrap();
    assert_eq!(built.encode_reply().unwrap(), accept);
}

#[test]
fn test_verify_reply_rejects_tampering() {
    let (_, request) = rfc_request();
    let accept = hex::decode(RFC_ACCEPT).unwrap();
    let reply = Packet::decode(&accept, RFC_SECRET, dictionary()).unwrap();

    // Any changed attribute byte
    for index in 20..accept.len() {
        let mut tampered = accept.clone();
        tampered[index] ^= 0x01;
        assert!(!request.verify_reply(&reply, Some(&tampered)), "byte {} flipped", index);
    }

    // Wrong secret on the requesting side
    let (bytes, _) = rfc_request();
    let wrong_secret = Packet::decode(&bytes, b"xyzzy5462", dictionary()).unwrap();
    assert!(!wrong_secret.verify_reply(&reply, Some(&accept)));

    // Different request authenticator
    let mut other = request.clone();
    other.authenticator = Some([0u8; 16]);
    assert!(!other.verify_reply(&reply, Some(&accept)));

    // Identifier mismatch
    let mut other = request.clone();
    other.id = Some(1);
    assert!(!other.verify_reply(&reply, Some(&accept)));
}

#[test]
fn test_reject_short_header() {
    let err = Packet::decode(&[0u8; 19], b"secret", dictionary()).unwrap_err();
    assert!(matches!(err, PacketError::HeaderCorrupt(_)));
}

#[test]
fn test_reject_length_mismatch() {
    let mut bytes = vec![1, 0, 0, 25];
    bytes.extend_from_slice(&[0u8; 16]);
    assert_eq!(
        Packet::decode(&bytes, b"secret", dictionary()).unwrap_err(),
        PacketError::LengthMismatch { declared: 25, actual: 20 }
    );
}

#[test]
fn test_reject_attribute_length_one() {
    let mut bytes = vec![1, 0, 0, 23];
    bytes.extend_from_slice(&[0u8; 16]);
    bytes.extend_from_slice(&[1, 1, 0]);
    assert!(matches!(
        Packet::decode(&bytes, b"secret", dictionary()),
        Err(PacketError::MalformedAttribute(_))
    ));
}

#[test]
fn test_reject_oversized_packet() {
    let mut bytes = vec![1, 0];
    bytes.extend_from_slice(&4100u16.to_be_bytes());
    bytes.extend_from_slice(&[0u8; 16]);
    bytes.resize(4100, 0);
    // Fill the body with empty Reply-Message attributes
    for chunk in bytes[20..].chunks_mut(2) {
        chunk.copy_from_slice(&[18, 2]);
    }

    assert!(Packet::decode(&bytes, b"secret", dictionary()).is_ok());

    let mut strict = Packet::new(0u8, b"secret", dictionary()).with_config(CodecConfig::rfc2865());
    assert_eq!(
        strict.decode_from_bytes(&bytes),
        Err(PacketError::PacketTooLarge { size: 4100, limit: 4096 })
    );
}

#[test]
fn test_vendor_attribute_roundtrip() {
    let ids = IdAllocator::new(0);
    let mut request = AuthPacket::new(b"secret", cisco_dictionary());
    request.add_attribute_raw((9u32, 1u8), b"x".to_vec());
    request.add_attribute("Cisco-AVPair", "shell:priv-lvl=15").unwrap();
    let bytes = request.encode_request(&ids).unwrap();

    // 26, len 9, vendor 9, type 1, len 3, 'x'
    assert_eq!(&bytes[20..29], &[26, 9, 0, 0, 0, 9, 1, 3, b'x']);

    let decoded = Packet::decode(&bytes, b"secret", cisco_dictionary()).unwrap();
    let key = AttributeKey::Vendor { vendor_id: 9, code: 1 };
    assert_eq!(
        decoded.get_attribute_raw(key).unwrap(),
        &[b"x".to_vec(), b"shell:priv-lvl=15".to_vec()]
    );
    assert_eq!(
        decoded.get_attribute("Cisco-AVPair").unwrap(),
        vec![AttributeValue::from("x"), AttributeValue::from("shell:priv-lvl=15")]
    );
}

#[test]
fn test_corrupt_vendor_attribute_kept_raw() {
    let mut bytes = vec![1, 0, 0, 29];
    bytes.extend_from_slice(&[0u8; 16]);
    // Inner length claims 9 bytes but only 3 follow
    bytes.extend_from_slice(&[26, 9, 0, 0, 0, 9, 1, 9, b'x']);

    let packet = Packet::decode(&bytes, b"secret", cisco_dictionary()).unwrap();
    assert_eq!(
        packet.get_attribute_raw(26u8).unwrap(),
        &[vec![0, 0, 0, 9, 1, 9, b'x']]
    );
    assert!(!packet.has_attribute_raw((9u32, 1u8)));
}

#[test]
fn test_accounting_request_roundtrip() {
    let ids = IdAllocator::new(200);
    let mut request = AcctPacket::new(b"secret", dictionary());
    request.add_attribute("Acct-Status-Type", AcctStatusType::Start.name()).unwrap();
    request.add_attribute("Acct-Session-Id", "session-0001").unwrap();
    request.add_attribute("NAS-IP-Address", Ipv4Addr::new(10, 0, 0, 1)).unwrap();
    let bytes = request.encode_request(&ids).unwrap();
    assert_eq!(bytes[0], Code::AccountingRequest.as_u8());
    assert_eq!(bytes[1], 201);

    let received = AcctPacket::decode(&bytes, b"secret", dictionary()).unwrap();
    assert!(received.verify_request());
    assert_eq!(
        received.get_attribute("Acct-Status-Type").unwrap(),
        vec![AttributeValue::from("Start")]
    );

    let response = received.create_reply().encode_reply().unwrap();
    let answer = Packet::decode(&response, b"secret", dictionary()).unwrap();
    assert_eq!(answer.packet_code(), Some(Code::AccountingResponse));
    assert!(request.verify_reply(&answer, Some(&response)));
}

#[test]
fn test_concurrent_id_allocation() {
    let ids = Arc::new(IdAllocator::new(0));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ids = Arc::clone(&ids);
            thread::spawn(move || (0..32).map(|_| ids.allocate()).collect::<Vec<u8>>())
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert(id), "id {} allocated twice", id);
        }
    }
    assert_eq!(seen.len(), 256);
}

#[test]
fn test_batch_construction_reports_skipped() {
    let mut packet = Packet::new(Code::AccessRequest, b"secret", dictionary());
    let skipped = packet.add_attributes([
        ("User-Name", AttributeValue::from("alice")),
        ("No-Such-Attribute", AttributeValue::from("x")),
        ("NAS-Port", AttributeValue::from("not a number")),
    ]);

    assert_eq!(skipped.len(), 2);
    assert_eq!(skipped[0].name, "No-Such-Attribute");
    assert_eq!(skipped[1].name, "NAS-Port");
    assert!(packet.has_attribute("User-Name"));
    assert!(!packet.has_attribute("NAS-Port"));
}
