//! Access-Request / Access-Accept / Access-Reject framing (RFC 2865)
//!
//! In an Access-Request the authenticator is not a hash: it is 16 random
//! bytes that the server mixes into the Response Authenticator of its reply
//! and that seed the User-Password hiding cipher.

use crate::attributes::{AttributeKey, AttributeType};
use crate::dictionary::{Dictionary, EncryptionMethod};
use crate::packet::{
    AUTHENTICATOR_LENGTH, Code, IdAllocator, Packet, PacketError, digest,
};
use rand::Rng;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::debug;

const BLOCK_SIZE: usize = 16;

/// Generate a random Request Authenticator (16 bytes) per RFC 2865 Section 3
pub fn generate_request_authenticator() -> [u8; AUTHENTICATOR_LENGTH] {
    let mut rng = rand::rng();
    let mut authenticator = [0u8; AUTHENTICATOR_LENGTH];
    rng.fill(&mut authenticator);
    authenticator
}

/// Encrypt User-Password attribute per RFC 2865 Section 5.2
///
/// The password is first padded with zeros to a multiple of 16 bytes, then
/// XORed with MD5(secret + request_authenticator) for the first 16 bytes,
/// and MD5(secret + previous_ciphertext_block) for subsequent blocks. An
/// empty password becomes one block of padding.
pub fn encrypt_user_password(
    password: &[u8],
    secret: &[u8],
    authenticator: &[u8; AUTHENTICATOR_LENGTH],
) -> Vec<u8> {
    let blocks = password.len().div_ceil(BLOCK_SIZE).max(1);
    let mut padded = password.to_vec();
    padded.resize(blocks * BLOCK_SIZE, 0);

    let mut result = Vec::with_capacity(padded.len());
    let mut previous_block = *authenticator;

    for chunk in padded.chunks(BLOCK_SIZE) {
        let hash = digest(&[secret, &previous_block[..]]);

        let mut encrypted_block = [0u8; BLOCK_SIZE];
        for (out, (plain, key)) in encrypted_block.iter_mut().zip(chunk.iter().zip(hash)) {
            *out = plain ^ key;
        }

        previous_block = encrypted_block;
        result.extend_from_slice(&encrypted_block);
    }

    result
}

/// Decrypt User-Password attribute per RFC 2865 Section 5.2
///
/// Trailing zero padding is stripped from the result.
pub fn decrypt_user_password(
    encrypted: &[u8],
    secret: &[u8],
    authenticator: &[u8; AUTHENTICATOR_LENGTH],
) -> Result<Vec<u8>, PacketError> {
    if encrypted.is_empty() || encrypted.len() % BLOCK_SIZE != 0 {
        return Err(PacketError::InvalidValue(format!(
            "Hidden password length {} is not a positive multiple of {}",
            encrypted.len(),
            BLOCK_SIZE
        )));
    }

    let mut result = Vec::with_capacity(encrypted.len());
    let mut previous_block: &[u8] = authenticator;

    for chunk in encrypted.chunks(BLOCK_SIZE) {
        let hash = digest(&[secret, previous_block]);
        result.extend(chunk.iter().zip(hash).map(|(cipher, key)| cipher ^ key));
        previous_block = chunk;
    }

    // Remove padding (null bytes at the end)
    while result.last() == Some(&0) {
        result.pop();
    }

    Ok(result)
}

/// An authentication packet (Access-Request and its replies)
#[derive(Debug, Clone)]
pub struct AuthPacket {
    packet: Packet,
}

impl AuthPacket {
    /// A new Access-Request
    pub fn new(secret: impl AsRef<[u8]>, dictionary: Arc<dyn Dictionary>) -> Self {
        Self::with_code(Code::AccessRequest, secret, dictionary)
    }

    pub fn with_code(
        code: impl Into<u8>,
        secret: impl AsRef<[u8]>,
        dictionary: Arc<dyn Dictionary>,
    ) -> Self {
        AuthPacket {
            packet: Packet::new(code, secret, dictionary),
        }
    }

    /// Decode an authentication packet received from the network
    pub fn decode(
        data: &[u8],
        secret: impl AsRef<[u8]>,
        dictionary: Arc<dyn Dictionary>,
    ) -> Result<Self, PacketError> {
        Packet::decode(data, secret, dictionary).map(AuthPacket::from)
    }

    pub fn with_id(mut self, id: u8) -> Self {
        self.packet.id = Some(id);
        self
    }

    pub fn with_authenticator(mut self, authenticator: [u8; AUTHENTICATOR_LENGTH]) -> Self {
        self.packet.authenticator = Some(authenticator);
        self
    }

    pub fn into_packet(self) -> Packet {
        self.packet
    }

    /// Create a ready-to-transmit authentication request
    ///
    /// A random authenticator and an identifier from `ids` are assigned if
    /// the packet does not have them yet.
    pub fn encode_request(&mut self, ids: &IdAllocator) -> Result<Vec<u8>, PacketError> {
        let attributes = self.packet.encode_attributes()?;
        let authenticator = *self
            .packet
            .authenticator
            .get_or_insert_with(generate_request_authenticator);
        let id = self.packet.allocate_id(ids);
        let header = self.packet.header(id, attributes.len())?;

        let mut buffer = Vec::with_capacity(header.len() + AUTHENTICATOR_LENGTH + attributes.len());
        buffer.extend_from_slice(&header);
        buffer.extend_from_slice(&authenticator);
        buffer.extend_from_slice(&attributes);
        Ok(buffer)
    }

    /// Hide a password with this packet's secret and authenticator
    ///
    /// Creates the authenticator if the packet has none. Changing the
    /// authenticator afterwards invalidates the returned ciphertext.
    pub fn obfuscate_password(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let authenticator = *self
            .packet
            .authenticator
            .get_or_insert_with(generate_request_authenticator);
        encrypt_user_password(plaintext, self.packet.secret(), &authenticator)
    }

    /// Recover a password hidden with this packet's secret and request authenticator
    pub fn deobfuscate_password(&self, ciphertext: &[u8]) -> Result<Vec<u8>, PacketError> {
        let authenticator = self
            .packet
            .authenticator
            .ok_or(PacketError::Precondition("a request authenticator"))?;
        decrypt_user_password(ciphertext, self.packet.secret(), &authenticator)
    }

    /// Store `password` hidden under User-Password, replacing any previous value
    pub fn set_user_password(&mut self, password: &[u8]) {
        let key = self
            .packet
            .dictionary()
            .resolve_name(AttributeType::UserPassword.name())
            .map(|descriptor| descriptor.key())
            .unwrap_or(AttributeKey::from(AttributeType::UserPassword));
        let hidden = self.obfuscate_password(password);
        self.packet.set_attribute_raw(key, vec![hidden]);
    }

    /// Replace every password-hidden attribute value with its plaintext
    ///
    /// Attributes whose key has no dictionary entry are left untouched. On
    /// error no attribute is modified.
    pub fn decrypt_attributes(&mut self) -> Result<(), PacketError> {
        let dictionary = Arc::clone(self.packet.dictionary());
        let mut decrypted = Vec::new();
        for (key, values) in self.packet.iter() {
            let hidden = dictionary
                .descriptor_for_key(key)
                .is_some_and(|descriptor| descriptor.encryption == EncryptionMethod::UserPassword);
            if !hidden {
                continue;
            }
            let plaintexts = values
                .iter()
                .map(|value| self.deobfuscate_password(value))
                .collect::<Result<Vec<_>, _>>()?;
            decrypted.push((key, plaintexts));
        }

        debug!(attributes = decrypted.len(), "decrypted hidden attributes");
        for (key, plaintexts) in decrypted {
            self.packet.set_attribute_raw(key, plaintexts);
        }
        Ok(())
    }

    /// An Access-Accept skeleton answering this request
    pub fn create_reply(&self) -> AuthPacket {
        AuthPacket {
            packet: self.packet.create_reply(Code::AccessAccept),
        }
    }
}

impl From<Packet> for AuthPacket {
    fn from(packet: Packet) -> Self {
        AuthPacket { packet }
    }
}

impl Deref for AuthPacket {
    type Target = Packet;

    fn deref(&self) -> &Packet {
        &self.packet
    }
}

impl DerefMut for AuthPacket {
    fn deref_mut(&mut self) -> &mut Packet {
        &mut self.packet
    }
}

impl fmt::Display for AuthPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.packet, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeValue;
    use crate::dictionary::MemoryDictionary;

    fn dictionary() -> Arc<dyn Dictionary> {
        Arc::new(MemoryDictionary::rfc2865())
    }

    #[test]
    fn test_generate_authenticator() {
        let auth1 = generate_request_authenticator();
        let auth2 = generate_request_authenticator();
        // Should be random
        assert_ne!(auth1, auth2);
    }

    #[test]
    fn test_password_encryption_decryption() {
        let password = b"mysecretpassword";
        let secret = b"sharedsecret";
        let authenticator = [1u8; 16];

        let encrypted = encrypt_user_password(password, secret, &authenticator);
        assert_eq!(encrypted.len(), 16);
        let decrypted = decrypt_user_password(&encrypted, secret, &authenticator).unwrap();
        assert_eq!(decrypted, password);
    }

    #[test]
    fn test_password_encryption_empty() {
        let encrypted = encrypt_user_password(b"", b"sharedsecret", &[1u8; 16]);
        assert_eq!(encrypted.len(), 16); // Should be padded to 16 bytes
    }

    #[test]
    fn test_multi_block_chaining() {
        let secret = b"sharedsecret";
        let authenticator = [7u8; 16];
        let password = b"a password that spans two blocks";
        let encrypted = encrypt_user_password(password, secret, &authenticator);
        assert_eq!(encrypted.len(), 32);

        // Second block is keyed by the first ciphertext block, not the authenticator
        let key = digest(&[&secret[..], &encrypted[..16]]);
        let second: Vec<u8> = encrypted[16..].iter().zip(key).map(|(c, k)| c ^ k).collect();
        assert_eq!(second, password[16..]);
    }

    #[test]
    fn test_known_answer_vector() {
        let encrypted = encrypt_user_password(b"password", b"secret", &[0u8; 16]);
        let key = md5::compute([&b"secret"[..], &[0u8; 16][..]].concat()).0;

        let mut expected = [0u8; 16];
        expected[..8].copy_from_slice(b"password");
        for (byte, k) in expected.iter_mut().zip(key) {
            *byte ^= k;
        }
        assert_eq!(encrypted, expected);
    }

    #[test]
    fn test_decrypt_invalid_length() {
        assert!(decrypt_user_password(&[], b"s", &[0u8; 16]).is_err());
        assert!(decrypt_user_password(&[0u8; 17], b"s", &[0u8; 16]).is_err());
    }

    #[test]
    fn test_obfuscate_creates_authenticator() {
        let mut packet = AuthPacket::new(b"secret", dictionary());
        assert!(packet.authenticator.is_none());
        let hidden = packet.obfuscate_password(b"hunter2");
        let authenticator = packet.authenticator.unwrap();
        assert_eq!(hidden, encrypt_user_password(b"hunter2", b"secret", &authenticator));
        assert_eq!(packet.deobfuscate_password(&hidden).unwrap(), b"hunter2");
    }

    #[test]
    fn test_deobfuscate_requires_authenticator() {
        let packet = AuthPacket::new(b"secret", dictionary());
        assert_eq!(
            packet.deobfuscate_password(&[0u8; 16]),
            Err(PacketError::Precondition("a request authenticator"))
        );
    }

    #[test]
    fn test_encode_request_layout() {
        let ids = IdAllocator::new(0);
        let mut packet = AuthPacket::new(b"secret", dictionary()).with_authenticator([9u8; 16]);
        packet.add_attribute("User-Name", "alice").unwrap();

        let bytes = packet.encode_request(&ids).unwrap();
        assert_eq!(bytes[0], Code::AccessRequest.as_u8());
        assert_eq!(bytes[1], 1);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]) as usize, bytes.len());
        assert_eq!(&bytes[4..20], &[9u8; 16]);
        assert_eq!(&bytes[20..], &[1, 7, b'a', b'l', b'i', b'c', b'e']);
    }

    #[test]
    fn test_encode_request_assigns_authenticator_and_id() {
        let ids = IdAllocator::new(99);
        let mut packet = AuthPacket::new(b"secret", dictionary());
        let bytes = packet.encode_request(&ids).unwrap();
        assert_eq!(packet.id, Some(100));
        assert_eq!(&bytes[4..20], &packet.authenticator.unwrap());

        // A second encode reuses both
        let again = packet.encode_request(&ids).unwrap();
        assert_eq!(bytes, again);
    }

    #[test]
    fn test_decrypt_attributes() {
        let ids = IdAllocator::new(0);
        let mut request = AuthPacket::new(b"secret", dictionary());
        request.add_attribute("User-Name", "alice").unwrap();
        request.set_user_password(b"wonderland");
        request.add_attribute_raw(250u8, vec![0u8; 16]);
        let bytes = request.encode_request(&ids).unwrap();

        let mut received = AuthPacket::decode(&bytes, b"secret", dictionary()).unwrap();
        received.decrypt_attributes().unwrap();
        assert_eq!(
            received.get_attribute("User-Password").unwrap(),
            vec![AttributeValue::from("wonderland")]
        );
        assert_eq!(received.get_attribute_raw(250u8).unwrap(), &[vec![0u8; 16]]);
        assert_eq!(received.get_attribute("User-Name").unwrap(), vec![AttributeValue::from("alice")]);
    }

    #[test]
    fn test_decrypt_attributes_wrong_secret() {
        let ids = IdAllocator::new(0);
        let mut request = AuthPacket::new(b"secret", dictionary());
        request.set_user_password(b"wonderland");
        let bytes = request.encode_request(&ids).unwrap();

        let mut received = AuthPacket::decode(&bytes, b"not-the-secret", dictionary()).unwrap();
        received.decrypt_attributes().unwrap();
        let values = received.get_attribute_raw(AttributeType::UserPassword).unwrap();
        assert_ne!(values[0], b"wonderland");
    }

    #[test]
    fn test_reply_verification() {
        let ids = IdAllocator::new(0);
        let mut request = AuthPacket::new(b"secret", dictionary());
        request.add_attribute("User-Name", "alice").unwrap();
        request.encode_request(&ids).unwrap();

        let mut reply = request.create_reply();
        reply.add_attribute("Session-Timeout", 3600u32).unwrap();
        let raw_reply = reply.encode_reply().unwrap();

        let received = AuthPacket::decode(&raw_reply, b"secret", dictionary()).unwrap();
        assert_eq!(received.packet_code(), Some(Code::AccessAccept));
        assert!(request.verify_reply(&received, Some(&raw_reply)));
    }
}
