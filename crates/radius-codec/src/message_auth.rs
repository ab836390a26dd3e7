//! Message-Authenticator Support (RFC 2869 Section 5.14, RFC 3579 Section 3.2)
//!
//! Message-Authenticator (type 80) is HMAC-MD5 keyed with the shared secret
//! over the whole packet, computed with its own 16 value bytes zeroed. For
//! replies the header carries the Request Authenticator while the HMAC is
//! computed, and the Response Authenticator is calculated afterwards over
//! the signed attribute.
//!
//! These helpers operate on encoded packets: add a zeroed placeholder with
//! [`add_placeholder`], encode, then sign the bytes.

use crate::attributes::RawAttributes;
use crate::packet::{AUTHENTICATOR_LENGTH, Packet, PacketError, digest};
use hmac::{Hmac, Mac};
use md5_digest::Md5;
use subtle::ConstantTimeEq;

type HmacMd5 = Hmac<Md5>;

/// Attribute type of Message-Authenticator
pub const MESSAGE_AUTHENTICATOR: u8 = 80;

const HEADER_LENGTH: usize = 20;

/// Calculate Message-Authenticator for a RADIUS packet
///
/// `packet_bytes` must already have the Message-Authenticator value zeroed.
pub fn calculate_message_authenticator(packet_bytes: &[u8], secret: &[u8]) -> [u8; 16] {
    let mut mac = HmacMd5::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(packet_bytes);

    let mut output = [0u8; 16];
    output.copy_from_slice(&mac.finalize().into_bytes());
    output
}

/// Append a zeroed Message-Authenticator to `packet`, replacing any existing one
pub fn add_placeholder(packet: &mut Packet) {
    packet.set_attribute_raw(MESSAGE_AUTHENTICATOR, vec![vec![0u8; 16]]);
}

/// Byte offset of the Message-Authenticator value, if the packet carries one
pub fn find_message_authenticator(packet_bytes: &[u8]) -> Result<Option<usize>, PacketError> {
    if packet_bytes.len() < HEADER_LENGTH {
        return Err(PacketError::HeaderCorrupt(format!(
            "Packet too short: {} bytes",
            packet_bytes.len()
        )));
    }

    for raw in RawAttributes::new(&packet_bytes[HEADER_LENGTH..]) {
        let raw = raw?;
        if raw.code != MESSAGE_AUTHENTICATOR {
            continue;
        }
        if raw.value.len() != 16 {
            return Err(PacketError::InvalidValue(format!(
                "Message-Authenticator must be 16 bytes, got {}",
                raw.value.len()
            )));
        }
        return Ok(Some(HEADER_LENGTH + raw.offset + 2));
    }
    Ok(None)
}

/// HMAC over `packet_bytes` with the value at `offset` zeroed and, for
/// replies, the request authenticator in the header
fn expected(
    packet_bytes: &[u8],
    offset: usize,
    secret: &[u8],
    request_authenticator: Option<&[u8; AUTHENTICATOR_LENGTH]>,
) -> [u8; 16] {
    let mut packet_copy = packet_bytes.to_vec();
    packet_copy[offset..offset + 16].fill(0);
    if let Some(authenticator) = request_authenticator {
        packet_copy[4..HEADER_LENGTH].copy_from_slice(authenticator);
    }
    calculate_message_authenticator(&packet_copy, secret)
}

/// Fill in the Message-Authenticator of an encoded packet
///
/// Pass `request_authenticator` when signing a reply; the Response
/// Authenticator is then recomputed to cover the signed attribute.
pub fn sign_message_authenticator(
    packet_bytes: &mut [u8],
    secret: &[u8],
    request_authenticator: Option<&[u8; AUTHENTICATOR_LENGTH]>,
) -> Result<(), PacketError> {
    let offset = find_message_authenticator(packet_bytes)?
        .ok_or(PacketError::Precondition("a Message-Authenticator attribute"))?;

    let mac = expected(packet_bytes, offset, secret, request_authenticator);
    packet_bytes[offset..offset + 16].copy_from_slice(&mac);

    if let Some(authenticator) = request_authenticator {
        let response = digest(&[
            &packet_bytes[..4],
            &authenticator[..],
            &packet_bytes[HEADER_LENGTH..],
            secret,
        ]);
        packet_bytes[4..HEADER_LENGTH].copy_from_slice(&response);
    }
    Ok(())
}

/// Verify Message-Authenticator in a RADIUS packet
///
/// Returns `Ok(None)` when the packet has no Message-Authenticator.
/// Pass `request_authenticator` when verifying a reply.
pub fn verify_message_authenticator(
    packet_bytes: &[u8],
    secret: &[u8],
    request_authenticator: Option<&[u8; AUTHENTICATOR_LENGTH]>,
) -> Result<Option<bool>, PacketError> {
    let Some(offset) = find_message_authenticator(packet_bytes)? else {
        return Ok(None);
    };

    let received = &packet_bytes[offset..offset + 16];
    let mac = expected(packet_bytes, offset, secret, request_authenticator);
    Ok(Some(mac.as_slice().ct_eq(received).into()))
}
