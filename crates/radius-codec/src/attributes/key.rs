use super::AttributeType;
use std::fmt;

/// Wire identity of an attribute
///
/// Standard attributes are identified by their one-byte type. Vendor-Specific
/// attributes (type 26) are identified by the vendor's IANA enterprise number
/// together with the vendor's own inner type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeKey {
    Simple(u8),
    Vendor { vendor_id: u32, code: u8 },
}

impl AttributeKey {
    pub fn vendor(vendor_id: u32, code: u8) -> Self {
        AttributeKey::Vendor { vendor_id, code }
    }

    /// The attribute type byte this key carries (inner type for vendor keys)
    pub fn code(&self) -> u8 {
        match *self {
            AttributeKey::Simple(code) => code,
            AttributeKey::Vendor { code, .. } => code,
        }
    }

    pub fn vendor_id(&self) -> Option<u32> {
        match *self {
            AttributeKey::Simple(_) => None,
            AttributeKey::Vendor { vendor_id, .. } => Some(vendor_id),
        }
    }
}

impl From<u8> for AttributeKey {
    fn from(code: u8) -> Self {
        AttributeKey::Simple(code)
    }
}

impl From<AttributeType> for AttributeKey {
    fn from(attr_type: AttributeType) -> Self {
        AttributeKey::Simple(attr_type.as_u8())
    }
}

impl From<(u32, u8)> for AttributeKey {
    fn from((vendor_id, code): (u32, u8)) -> Self {
        AttributeKey::Vendor { vendor_id, code }
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKey::Simple(code) => write!(f, "Attr-{}", code),
            AttributeKey::Vendor { vendor_id, code } => write!(f, "Vendor-{}-Attr-{}", vendor_id, code),
        }
    }
}
