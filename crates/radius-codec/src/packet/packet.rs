use super::{Code, IdAllocator};
use crate::attributes::{
    Attribute, AttributeKey, AttributeValue, decode_attribute_stream, encode_attribute,
};
use crate::config::{CodecConfig, MIN_PACKET_SIZE};
use crate::dictionary::Dictionary;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Length of the Authenticator field
pub const AUTHENTICATOR_LENGTH: usize = 16;

/// Pseudo-attribute recording the address a request was received from
pub const CLIENT_IP_ADDRESS: &str = "Client-IP-Address";
/// Pseudo-attribute recording the authenticator a request carried
pub const REQUEST_AUTHENTICATOR: &str = "Request-Authenticator";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Packet header is corrupt: {0}")]
    HeaderCorrupt(String),
    #[error("Packet has invalid length: header says {declared} bytes, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("Packet too large: {size} bytes (limit {limit})")]
    PacketTooLarge { size: usize, limit: usize },
    #[error("Malformed attribute: {0}")]
    MalformedAttribute(String),
    #[error("Attribute encoding error: {0}")]
    Encoding(String),
    #[error("Invalid attribute value: {0}")]
    InvalidValue(String),
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),
    #[error("Operation requires {0}")]
    Precondition(&'static str),
}

/// An attribute dropped during batch construction, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAttribute {
    pub name: String,
    pub reason: PacketError,
}

/// An attribute key as presented to callers: its dictionary name when it has one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyName<'a> {
    Name(&'a str),
    Raw(AttributeKey),
}

/// RADIUS Packet structure as defined in RFC 2865 Section 3
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     Code      |  Identifier   |            Length             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// |                         Authenticator                         |
/// |                                                               |
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Attributes ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-
/// ```
///
/// Attributes are kept as an ordered multimap from [`AttributeKey`] to raw
/// values. Values of one key keep the order they were added or decoded in;
/// keys keep the order of their first occurrence. Name-based accessors go
/// through the packet's [`Dictionary`], raw accessors bypass it.
#[derive(Clone)]
pub struct Packet {
    /// Packet type (1 byte)
    pub code: u8,
    /// Packet identifier for matching requests/responses (1 byte)
    pub id: Option<u8>,
    /// Request or Response Authenticator (16 bytes)
    pub authenticator: Option<[u8; AUTHENTICATOR_LENGTH]>,
    /// Where the packet came from; not part of the wire format
    pub source: Option<SocketAddr>,
    secret: Zeroizing<Vec<u8>>,
    attributes: Vec<(AttributeKey, Vec<Vec<u8>>)>,
    dictionary: Arc<dyn Dictionary>,
    config: CodecConfig,
    raw: Option<Vec<u8>>,
}

impl Packet {
    pub fn new(code: impl Into<u8>, secret: impl AsRef<[u8]>, dictionary: Arc<dyn Dictionary>) -> Self {
        Packet {
            code: code.into(),
            id: None,
            authenticator: None,
            source: None,
            secret: Zeroizing::new(secret.as_ref().to_vec()),
            attributes: Vec::new(),
            dictionary,
            config: CodecConfig::default(),
            raw: None,
        }
    }

    /// Decode a packet received from the network
    pub fn decode(
        data: &[u8],
        secret: impl AsRef<[u8]>,
        dictionary: Arc<dyn Dictionary>,
    ) -> Result<Self, PacketError> {
        let mut packet = Packet::new(0u8, secret, dictionary);
        packet.decode_from_bytes(data)?;
        Ok(packet)
    }

    pub fn with_id(mut self, id: u8) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_authenticator(mut self, authenticator: [u8; AUTHENTICATOR_LENGTH]) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn with_source(mut self, source: SocketAddr) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    pub fn packet_code(&self) -> Option<Code> {
        Code::from_u8(self.code)
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn set_secret(&mut self, secret: impl AsRef<[u8]>) {
        self.secret = Zeroizing::new(secret.as_ref().to_vec());
    }

    pub fn dictionary(&self) -> &Arc<dyn Dictionary> {
        &self.dictionary
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// The exact bytes this packet was last decoded from
    pub fn raw_packet(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    /// Add an attribute by name, translating the value through the dictionary
    pub fn add_attribute(
        &mut self,
        name: &str,
        value: impl Into<AttributeValue>,
    ) -> Result<(), PacketError> {
        let attribute = self.encode_named(name, &value.into())?;
        self.push_raw(attribute.key, attribute.value);
        Ok(())
    }

    /// Add a raw value under a wire key, bypassing the dictionary
    pub fn add_attribute_raw(&mut self, key: impl Into<AttributeKey>, value: impl Into<Vec<u8>>) {
        self.push_raw(key.into(), value.into());
    }

    /// Replace all values of an attribute with a single named value
    pub fn set_attribute(
        &mut self,
        name: &str,
        value: impl Into<AttributeValue>,
    ) -> Result<(), PacketError> {
        let attribute = self.encode_named(name, &value.into())?;
        self.set_attribute_raw(attribute.key, vec![attribute.value]);
        Ok(())
    }

    /// Replace all values stored under a wire key
    pub fn set_attribute_raw(&mut self, key: impl Into<AttributeKey>, values: Vec<Vec<u8>>) {
        let key = key.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = values,
            None => self.attributes.push((key, values)),
        }
    }

    /// Decoded values of a named attribute; empty when the packet lacks it
    pub fn get_attribute(&self, name: &str) -> Result<Vec<AttributeValue>, PacketError> {
        let descriptor = self.dictionary.descriptor(name)?;
        self.get_attribute_raw(descriptor.key())
            .unwrap_or_default()
            .iter()
            .map(|raw| descriptor.decode_value(raw))
            .collect()
    }

    /// Raw values stored under a wire key
    pub fn get_attribute_raw(&self, key: impl Into<AttributeKey>) -> Option<&[Vec<u8>]> {
        let key = key.into();
        self.attributes
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, values)| values.as_slice())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.dictionary
            .resolve_name(name)
            .is_some_and(|descriptor| self.has_attribute_raw(descriptor.key()))
    }

    pub fn has_attribute_raw(&self, key: impl Into<AttributeKey>) -> bool {
        self.get_attribute_raw(key).is_some()
    }

    pub fn remove_attribute_raw(&mut self, key: impl Into<AttributeKey>) -> Option<Vec<Vec<u8>>> {
        let key = key.into();
        let index = self.attributes.iter().position(|(k, _)| *k == key)?;
        Some(self.attributes.remove(index).1)
    }

    pub fn clear_attributes(&mut self) {
        self.attributes.clear();
    }

    /// Attribute keys in order, named where the dictionary knows them
    pub fn keys(&self) -> Vec<KeyName<'_>> {
        self.attributes
            .iter()
            .map(|(key, _)| match self.dictionary.resolve_key(*key) {
                Some(name) => KeyName::Name(name),
                None => KeyName::Raw(*key),
            })
            .collect()
    }

    /// Every stored `(key, values)` group in order
    pub fn iter(&self) -> impl Iterator<Item = (AttributeKey, &[Vec<u8>])> {
        self.attributes
            .iter()
            .map(|(key, values)| (*key, values.as_slice()))
    }

    /// Add a batch of named attributes, skipping the ones that cannot be added
    ///
    /// Unknown names and unencodable values are logged and reported back
    /// instead of failing the whole batch.
    pub fn add_attributes<I, N, V>(&mut self, attributes: I) -> Vec<SkippedAttribute>
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: Into<AttributeValue>,
    {
        let mut skipped = Vec::new();
        for (name, value) in attributes {
            let name = name.as_ref();
            if let Err(reason) = self.add_attribute(name, value) {
                warn!(attribute = name, error = %reason, "discarding attribute");
                skipped.push(SkippedAttribute {
                    name: name.to_string(),
                    reason,
                });
            }
        }
        skipped
    }

    /// Generate a random authenticator suitable for a request
    pub fn create_authenticator() -> [u8; AUTHENTICATOR_LENGTH] {
        crate::auth::generate_request_authenticator()
    }

    /// Assign an identifier from `ids` unless one is already set
    pub fn allocate_id(&mut self, ids: &IdAllocator) -> u8 {
        *self.id.get_or_insert_with(|| ids.allocate())
    }

    /// Encode all attributes in order, one TLV per stored value
    pub fn encode_attributes(&self) -> Result<Vec<u8>, PacketError> {
        let mut buffer = Vec::new();
        for (key, values) in &self.attributes {
            for value in values {
                buffer.extend_from_slice(&encode_attribute(*key, value)?);
            }
        }
        Ok(buffer)
    }

    /// Build Code, Identifier and Length for a packet with `attributes_len` attribute bytes
    pub(crate) fn header(&self, id: u8, attributes_len: usize) -> Result<[u8; 4], PacketError> {
        let total_length = MIN_PACKET_SIZE + attributes_len;
        if total_length > self.config.max_packet_size {
            return Err(PacketError::PacketTooLarge {
                size: total_length,
                limit: self.config.max_packet_size,
            });
        }
        let length = u16::try_from(total_length).map_err(|_| PacketError::PacketTooLarge {
            size: total_length,
            limit: u16::MAX as usize,
        })?;
        let [high, low] = length.to_be_bytes();
        Ok([self.code, id, high, low])
    }

    /// Create a ready-to-transmit reply
    ///
    /// The authenticator field of `self` must hold the authenticator of the
    /// request being answered. Response Authenticator =
    /// MD5(Code + ID + Length + Request Authenticator + Attributes + Secret).
    pub fn encode_reply(&self) -> Result<Vec<u8>, PacketError> {
        let request_authenticator = self
            .authenticator
            .ok_or(PacketError::Precondition("a request authenticator"))?;
        if self.secret.is_empty() {
            return Err(PacketError::Precondition("a shared secret"));
        }
        let id = self.id.ok_or(PacketError::Precondition("a packet identifier"))?;

        let attributes = self.encode_attributes()?;
        let header = self.header(id, attributes.len())?;
        let authenticator = digest(&[
            &header[..],
            &request_authenticator[..],
            &attributes[..],
            &self.secret[..],
        ]);

        let mut buffer = Vec::with_capacity(MIN_PACKET_SIZE + attributes.len());
        buffer.extend_from_slice(&header);
        buffer.extend_from_slice(&authenticator);
        buffer.extend_from_slice(&attributes);
        Ok(buffer)
    }

    /// A reply skeleton sharing this packet's id, secret, authenticator and dictionary
    pub fn create_reply(&self, code: impl Into<u8>) -> Packet {
        Packet {
            code: code.into(),
            id: self.id,
            authenticator: self.authenticator,
            source: self.source,
            secret: self.secret.clone(),
            attributes: Vec::new(),
            dictionary: Arc::clone(&self.dictionary),
            config: self.config,
            raw: None,
        }
    }

    /// Check that `reply` answers this request and carries a valid Response Authenticator
    ///
    /// `raw_reply` should be the bytes as received. Without it the bytes the
    /// reply was decoded from are used, and failing that the reply is
    /// re-encoded from its attributes.
    pub fn verify_reply(&self, reply: &Packet, raw_reply: Option<&[u8]>) -> bool {
        match (self.id, reply.id) {
            (Some(request_id), Some(reply_id)) if request_id == reply_id => {}
            _ => return false,
        }
        let (Some(request_authenticator), Some(reply_authenticator)) =
            (self.authenticator, reply.authenticator)
        else {
            return false;
        };

        let reencoded;
        let raw: &[u8] = match raw_reply.or(reply.raw_packet()) {
            Some(raw) => raw,
            None => match reply.encode_as_received() {
                Ok(bytes) => {
                    reencoded = bytes;
                    reencoded.as_slice()
                }
                Err(_) => return false,
            },
        };
        if raw.len() < MIN_PACKET_SIZE {
            return false;
        }

        let hash = digest(&[
            &raw[0..4],
            &request_authenticator[..],
            &raw[MIN_PACKET_SIZE..],
            &self.secret[..],
        ]);
        hash.as_slice().ct_eq(reply_authenticator.as_slice()).into()
    }

    /// Encode with the stored authenticator copied verbatim into the header
    fn encode_as_received(&self) -> Result<Vec<u8>, PacketError> {
        let id = self.id.ok_or(PacketError::Precondition("a packet identifier"))?;
        let authenticator = self
            .authenticator
            .ok_or(PacketError::Precondition("an authenticator"))?;
        let attributes = self.encode_attributes()?;
        let header = self.header(id, attributes.len())?;

        let mut buffer = Vec::with_capacity(MIN_PACKET_SIZE + attributes.len());
        buffer.extend_from_slice(&header);
        buffer.extend_from_slice(&authenticator);
        buffer.extend_from_slice(&attributes);
        Ok(buffer)
    }

    /// Replace this packet's header and attributes with those decoded from `data`
    ///
    /// On error the packet is left unchanged.
    pub fn decode_from_bytes(&mut self, data: &[u8]) -> Result<(), PacketError> {
        if data.len() < MIN_PACKET_SIZE {
            return Err(PacketError::HeaderCorrupt(format!(
                "need {} bytes, got {}",
                MIN_PACKET_SIZE,
                data.len()
            )));
        }

        let length = u16::from_be_bytes([data[2], data[3]]) as usize;
        if length < MIN_PACKET_SIZE {
            return Err(PacketError::HeaderCorrupt(format!(
                "declared length {} is below the {} byte header",
                length, MIN_PACKET_SIZE
            )));
        }
        if length != data.len() {
            return Err(PacketError::LengthMismatch {
                declared: length,
                actual: data.len(),
            });
        }
        if length > self.config.max_packet_size {
            return Err(PacketError::PacketTooLarge {
                size: length,
                limit: self.config.max_packet_size,
            });
        }

        let decoded = decode_attribute_stream(&data[MIN_PACKET_SIZE..])?;
        let mut authenticator = [0u8; AUTHENTICATOR_LENGTH];
        authenticator.copy_from_slice(&data[4..MIN_PACKET_SIZE]);

        self.code = data[0];
        self.id = Some(data[1]);
        self.authenticator = Some(authenticator);
        self.attributes.clear();
        for Attribute { key, value } in decoded {
            self.push_raw(key, value);
        }
        self.raw = Some(data.to_vec());

        debug!(
            code = self.code,
            id = data[1],
            length,
            attributes = self.attributes.len(),
            "decoded packet"
        );
        Ok(())
    }

    /// Record the source address under the `Client-IP-Address` pseudo-attribute
    pub fn add_client_ip_address(&mut self) -> Result<(), PacketError> {
        let source = self.source.ok_or(PacketError::Precondition("a source address"))?;
        match source.ip() {
            IpAddr::V4(ip) => self.set_attribute(CLIENT_IP_ADDRESS, ip),
            IpAddr::V6(ip) => Err(PacketError::InvalidValue(format!(
                "{} is not an IPv4 address",
                ip
            ))),
        }
    }

    /// Record the authenticator under the `Request-Authenticator` pseudo-attribute
    pub fn add_request_authenticator(&mut self) -> Result<(), PacketError> {
        let authenticator = self
            .authenticator
            .ok_or(PacketError::Precondition("an authenticator"))?;
        self.set_attribute(REQUEST_AUTHENTICATOR, authenticator.to_vec())
    }

    fn encode_named(&self, name: &str, value: &AttributeValue) -> Result<Attribute, PacketError> {
        let descriptor = self.dictionary.descriptor(name)?;
        Attribute::new(descriptor.key(), descriptor.encode_value(value)?)
    }

    fn push_raw(&mut self, key: AttributeKey, value: Vec<u8>) {
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.attributes.push((key, vec![value])),
        }
    }
}

/// MD5 over the concatenation of `parts`
pub(crate) fn digest(parts: &[&[u8]]) -> [u8; AUTHENTICATOR_LENGTH] {
    let mut context = md5::Context::new();
    for part in parts {
        context.consume(part);
    }
    context.compute().0
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("code", &self.code)
            .field("id", &self.id)
            .field("source", &self.source)
            .field("attributes", &self.attributes)
            .field("secret", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.packet_code() {
            Some(code) => write!(f, "{}", code)?,
            None => write!(f, "Code-{}", self.code)?,
        }
        match self.id {
            Some(id) => writeln!(f, " id={}", id)?,
            None => writeln!(f)?,
        }

        for (key, values) in &self.attributes {
            let descriptor = self.dictionary.descriptor_for_key(*key);
            let name = match (descriptor, key) {
                (Some(descriptor), _) => descriptor.name.clone(),
                (None, AttributeKey::Vendor { vendor_id, code }) => {
                    match self.dictionary.resolve_vendor_name(*vendor_id) {
                        Some(vendor) => format!("{}-Attr-{}", vendor, code),
                        None => key.to_string(),
                    }
                }
                (None, AttributeKey::Simple(_)) => key.to_string(),
            };
            for raw in values {
                let value = descriptor
                    .and_then(|descriptor| descriptor.decode_value(raw).ok())
                    .unwrap_or_else(|| AttributeValue::Octets(raw.clone()));
                writeln!(f, "  {}: {}", name, value)?;
            }
        }
        Ok(())
    }
}
