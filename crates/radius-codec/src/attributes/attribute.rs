use super::AttributeKey;
use crate::packet::PacketError;
use tracing::{debug, trace};

/// Attribute type carrying vendor-specific sub-attributes (RFC 2865 Section 5.26)
pub const VENDOR_SPECIFIC: u8 = 26;

/// RADIUS Attribute as defined in RFC 2865 Section 5
///
/// ```text
///  0                   1                   2
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     Type      |    Length     |  Value ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Vendor keys are wrapped in a type 26 attribute:
///
/// ```text
/// |  Type = 26    |    Length     |            Vendor-Id
/// |   Vendor-Id (cont)            | Vendor type   | Vendor length |  Value ...
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: AttributeKey,
    pub value: Vec<u8>,
}

impl Attribute {
    /// Minimum attribute length (type + length fields = 2 bytes)
    pub const MIN_LENGTH: usize = 2;
    /// Maximum attribute length (255 bytes including type and length)
    pub const MAX_LENGTH: usize = 255;
    /// Maximum value length of a standard attribute
    pub const MAX_VALUE_LENGTH: usize = 253;
    /// Vendor-Id + vendor type + vendor length
    pub const VENDOR_HEADER_LENGTH: usize = 6;
    /// Maximum value length of a vendor sub-attribute
    pub const MAX_VENDOR_VALUE_LENGTH: usize =
        Self::MAX_LENGTH - Self::MIN_LENGTH - Self::VENDOR_HEADER_LENGTH;

    pub fn new(key: impl Into<AttributeKey>, value: Vec<u8>) -> Result<Self, PacketError> {
        let key = key.into();
        let limit = Self::max_value_length(key);
        if value.len() > limit {
            return Err(PacketError::Encoding(format!(
                "Attribute value too long: {} bytes (max {})",
                value.len(),
                limit
            )));
        }
        Ok(Attribute { key, value })
    }

    fn max_value_length(key: AttributeKey) -> usize {
        match key {
            AttributeKey::Simple(_) => Self::MAX_VALUE_LENGTH,
            AttributeKey::Vendor { .. } => Self::MAX_VENDOR_VALUE_LENGTH,
        }
    }

    /// Encode attribute to bytes
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        encode_attribute(self.key, &self.value)
    }

    /// Get the encoded length of this attribute
    pub fn encoded_length(&self) -> usize {
        match self.key {
            AttributeKey::Simple(_) => Self::MIN_LENGTH + self.value.len(),
            AttributeKey::Vendor { .. } => {
                Self::MIN_LENGTH + Self::VENDOR_HEADER_LENGTH + self.value.len()
            }
        }
    }
}

/// Encode one attribute occurrence, wrapping vendor keys in a type 26 attribute
pub fn encode_attribute(key: AttributeKey, value: &[u8]) -> Result<Vec<u8>, PacketError> {
    match key {
        AttributeKey::Simple(code) => encode_tlv(code, value),
        AttributeKey::Vendor { vendor_id, code } => {
            let inner = encode_tlv(code, value)?;
            let mut wrapped = Vec::with_capacity(4 + inner.len());
            wrapped.extend_from_slice(&vendor_id.to_be_bytes());
            wrapped.extend_from_slice(&inner);
            encode_tlv(VENDOR_SPECIFIC, &wrapped)
        }
    }
}

fn encode_tlv(code: u8, value: &[u8]) -> Result<Vec<u8>, PacketError> {
    let length = value.len() + Attribute::MIN_LENGTH;
    if length > Attribute::MAX_LENGTH {
        return Err(PacketError::Encoding(format!(
            "Encoded attribute {} too long: {} bytes",
            code, length
        )));
    }

    let mut buffer = Vec::with_capacity(length);
    buffer.push(code);
    buffer.push(length as u8);
    buffer.extend_from_slice(value);
    Ok(buffer)
}

/// One TLV as it appears on the wire, before vendor unwrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawAttribute<'a> {
    /// Offset of the type byte within the walked buffer
    pub offset: usize,
    pub code: u8,
    pub value: &'a [u8],
}

/// Iterator over the top-level TLVs of an attribute area
///
/// Yields an error and then stops at the first malformed header.
#[derive(Debug, Clone)]
pub struct RawAttributes<'a> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> RawAttributes<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        RawAttributes {
            data,
            offset: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for RawAttributes<'a> {
    type Item = Result<RawAttribute<'a>, PacketError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }

        let remaining = &self.data[self.offset..];
        let result = if remaining.len() < Attribute::MIN_LENGTH {
            Err(PacketError::MalformedAttribute(format!(
                "Attribute header is corrupt: {} trailing byte(s)",
                remaining.len()
            )))
        } else {
            let code = remaining[0];
            let length = remaining[1] as usize;
            if length < Attribute::MIN_LENGTH {
                Err(PacketError::MalformedAttribute(format!(
                    "Attribute {} length is too small ({})",
                    code, length
                )))
            } else if length > remaining.len() {
                Err(PacketError::MalformedAttribute(format!(
                    "Attribute {} overruns packet: length {}, {} byte(s) left",
                    code,
                    length,
                    remaining.len()
                )))
            } else {
                Ok(RawAttribute {
                    offset: self.offset,
                    code,
                    value: &remaining[Attribute::MIN_LENGTH..length],
                })
            }
        };

        match &result {
            Ok(raw) => self.offset += raw.value.len() + Attribute::MIN_LENGTH,
            Err(_) => self.failed = true,
        }
        Some(result)
    }
}

/// Decode an attribute area into `(key, value)` pairs in wire order
///
/// Type 26 attributes are unwrapped into vendor keys. A vendor attribute
/// that does not follow the RFC 2865 recommended layout (one sub-attribute
/// whose length accounts for the whole value) is kept as a raw type 26
/// attribute instead of failing the decode; several NAS vendors emit such
/// attributes.
pub fn decode_attribute_stream(data: &[u8]) -> Result<Vec<Attribute>, PacketError> {
    let mut attributes = Vec::new();
    for raw in RawAttributes::new(data) {
        let raw = raw?;
        trace!(code = raw.code, length = raw.value.len(), "decoded attribute");
        let attribute = if raw.code == VENDOR_SPECIFIC {
            decode_vendor_attribute(raw.value)
        } else {
            Attribute {
                key: AttributeKey::Simple(raw.code),
                value: raw.value.to_vec(),
            }
        };
        attributes.push(attribute);
    }
    Ok(attributes)
}

fn decode_vendor_attribute(data: &[u8]) -> Attribute {
    let raw_fallback = || Attribute {
        key: AttributeKey::Simple(VENDOR_SPECIFIC),
        value: data.to_vec(),
    };

    if data.len() < Attribute::VENDOR_HEADER_LENGTH {
        debug!(length = data.len(), "vendor attribute too short, keeping raw");
        return raw_fallback();
    }

    let vendor_id = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    let code = data[4];
    let inner_length = data[5] as usize;
    if data.len() != inner_length + 4 {
        debug!(
            vendor_id,
            code,
            inner_length,
            length = data.len(),
            "vendor attribute length mismatch, keeping raw"
        );
        return raw_fallback();
    }

    Attribute {
        key: AttributeKey::Vendor { vendor_id, code },
        value: data[Attribute::VENDOR_HEADER_LENGTH..].to_vec(),
    }
}
