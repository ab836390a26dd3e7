//! Attribute dictionary
//!
//! The codec translates between attribute names and wire keys, and between
//! typed values and raw bytes, through the [`Dictionary`] trait. Parsing
//! dictionary files is left to the caller; [`MemoryDictionary`] is an
//! in-memory implementation that can be assembled in code, loaded from JSON,
//! or seeded with the standard RFC 2865/2866 attributes.
//!
//! # Example
//!
//! ```rust
//! use radius_codec::dictionary::{AttributeDescriptor, Dictionary, MemoryDictionary};
//! use radius_codec::{AttributeKey, DataType};
//!
//! let dict = MemoryDictionary::rfc2865()
//!     .with_vendor(9, "Cisco")
//!     .with_attribute(AttributeDescriptor::new("Cisco-AVPair", 1, DataType::String).vendor(9));
//!
//! assert_eq!(dict.resolve_key(AttributeKey::vendor(9, 1)), Some("Cisco-AVPair"));
//! assert_eq!(dict.resolve_vendor_name(9), Some("Cisco"));
//! ```

use crate::accounting::{AcctAuthentic, AcctStatusType, AcctTerminateCause};
use crate::attributes::{AttributeKey, AttributeType, AttributeValue, DataType};
use crate::packet::PacketError;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DictionaryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid dictionary: {0}")]
    Invalid(String),
}

/// Attribute lookups consumed by the packet layer
pub trait Dictionary: Send + Sync {
    /// Look up an attribute by its symbolic name
    fn resolve_name(&self, name: &str) -> Option<&AttributeDescriptor>;

    /// Look up the symbolic name of a wire key
    fn resolve_key(&self, key: AttributeKey) -> Option<&str>;

    /// Look up the symbolic name of a vendor
    fn resolve_vendor_name(&self, vendor_id: u32) -> Option<&str>;

    /// Like `resolve_name`, failing with `UnknownAttribute`
    fn descriptor(&self, name: &str) -> Result<&AttributeDescriptor, PacketError> {
        self.resolve_name(name)
            .ok_or_else(|| PacketError::UnknownAttribute(name.to_string()))
    }

    /// Descriptor of a wire key, if the key has a name
    fn descriptor_for_key(&self, key: AttributeKey) -> Option<&AttributeDescriptor> {
        self.resolve_key(key).and_then(|name| self.resolve_name(name))
    }
}

/// How an attribute value is hidden on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionMethod {
    #[default]
    None,
    /// RFC 2865 Section 5.2 User-Password hiding
    UserPassword,
}

/// Bidirectional mapping between symbolic value names and integers
///
/// Several names may alias one integer; all of them encode, and the most
/// recently defined one is used when decoding. In JSON the map is an object
/// read in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueMap {
    by_name: HashMap<String, u32>,
    by_value: HashMap<u32, String>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a symbolic value; the latest name for a value wins when decoding
    pub fn insert(&mut self, name: impl Into<String>, value: u32) {
        let name = name.into();
        if let Some(old) = self.by_name.insert(name.clone(), value) {
            if old != value && self.by_value.get(&old) == Some(&name) {
                self.by_value.remove(&old);
                if let Some(alias) = self.by_name.iter().find(|(_, v)| **v == old).map(|(n, _)| n.clone()) {
                    self.by_value.insert(old, alias);
                }
            }
        }
        self.by_value.insert(value, name);
    }

    pub fn value_of(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, value: u32) -> Option<&str> {
        self.by_value.get(&value).map(String::as_str)
    }

    /// Number of names, aliases included
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Entries ordered so that reinserting them reproduces this map
    fn ordered(&self) -> Vec<(&str, u32)> {
        let mut entries: Vec<(&str, u32)> = self
            .by_name
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
            .collect();
        entries.sort_by_key(|&(name, value)| (value, self.name_of(value) == Some(name), name));
        entries
    }
}

impl Serialize for ValueMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.ordered();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (name, value) in entries {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ValueMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ValueMapVisitor;

        impl<'de> Visitor<'de> for ValueMapVisitor {
            type Value = ValueMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of value names to integers")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ValueMap, A::Error> {
                let mut map = ValueMap::new();
                while let Some((name, value)) = access.next_entry::<String, u32>()? {
                    map.insert(name, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(ValueMapVisitor)
    }
}

/// Everything the codec needs to know about one attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    pub code: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<u32>,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub encryption: EncryptionMethod,
    #[serde(default, skip_serializing_if = "ValueMap::is_empty")]
    pub values: ValueMap,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, code: u8, data_type: DataType) -> Self {
        AttributeDescriptor {
            name: name.into(),
            code,
            vendor_id: None,
            data_type,
            encryption: EncryptionMethod::None,
            values: ValueMap::new(),
        }
    }

    /// Scope the attribute to a vendor
    pub fn vendor(mut self, vendor_id: u32) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }

    pub fn encrypted(mut self, method: EncryptionMethod) -> Self {
        self.encryption = method;
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, value: u32) -> Self {
        self.values.insert(name, value);
        self
    }

    /// Wire key of this attribute
    pub fn key(&self) -> AttributeKey {
        match self.vendor_id {
            Some(vendor_id) => AttributeKey::Vendor {
                vendor_id,
                code: self.code,
            },
            None => AttributeKey::Simple(self.code),
        }
    }

    /// Encode a value, preferring a matching symbolic value name
    pub fn encode_value(&self, value: &AttributeValue) -> Result<Vec<u8>, PacketError> {
        if let AttributeValue::String(name) = value {
            if let Some(number) = self.values.value_of(name) {
                return Ok(number.to_be_bytes().to_vec());
            }
        }
        self.data_type.encode(value)
    }

    /// Decode a raw value, preferring a matching symbolic value name
    pub fn decode_value(&self, raw: &[u8]) -> Result<AttributeValue, PacketError> {
        if !self.values.is_empty() {
            if let Ok(bytes) = <[u8; 4]>::try_from(raw) {
                if let Some(name) = self.values.name_of(u32::from_be_bytes(bytes)) {
                    return Ok(AttributeValue::String(name.to_string()));
                }
            }
        }
        self.data_type.decode(raw)
    }
}

/// Serialized form of a [`MemoryDictionary`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DictionaryFile {
    #[serde(default)]
    pub vendors: Vec<VendorEntry>,
    #[serde(default)]
    pub attributes: Vec<AttributeDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorEntry {
    pub id: u32,
    pub name: String,
}

/// In-memory dictionary
///
/// Defining an attribute whose name or key already exists replaces the
/// earlier definition.
#[derive(Debug, Clone, Default)]
pub struct MemoryDictionary {
    attributes: HashMap<String, AttributeDescriptor>,
    names: HashMap<AttributeKey, String>,
    vendors: HashMap<u32, String>,
}

impl MemoryDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard RFC 2865/2866/2869 attributes with their enumerated values
    pub fn rfc2865() -> Self {
        let mut dict = MemoryDictionary::new();
        for attr_type in AttributeType::ALL {
            let mut descriptor =
                AttributeDescriptor::new(attr_type.name(), attr_type.as_u8(), attr_type.data_type());
            if attr_type == AttributeType::UserPassword {
                descriptor.encryption = EncryptionMethod::UserPassword;
            }
            dict.insert(descriptor);
        }

        for (attr, values) in [
            (AttributeType::ServiceType, SERVICE_TYPES),
            (AttributeType::FramedProtocol, FRAMED_PROTOCOLS),
            (AttributeType::NasPortType, NAS_PORT_TYPES),
        ] {
            for &(name, value) in values {
                dict.define_value(attr, name, value);
            }
        }
        for status in AcctStatusType::ALL {
            dict.define_value(AttributeType::AcctStatusType, status.name(), status.as_u32());
        }
        for cause in AcctTerminateCause::ALL {
            dict.define_value(AttributeType::AcctTerminateCause, cause.name(), cause.as_u32());
        }
        for authentic in AcctAuthentic::ALL {
            dict.define_value(AttributeType::AcctAuthentic, authentic.name(), authentic.as_u32());
        }
        dict
    }

    fn define_value(&mut self, attr: AttributeType, name: &str, value: u32) {
        if let Some(descriptor) = self.attributes.get_mut(attr.name()) {
            descriptor.values.insert(name, value);
        }
    }

    /// Parse a dictionary from its JSON form
    pub fn from_json_str(json: &str) -> Result<Self, DictionaryError> {
        let file: DictionaryFile = serde_json::from_str(json)?;
        Self::try_from(file)
    }

    /// Load a dictionary from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, DictionaryError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Merge the definitions of a JSON dictionary file into this one
    pub fn merge_json_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), DictionaryError> {
        let contents = fs::read_to_string(path)?;
        let file: DictionaryFile = serde_json::from_str(&contents)?;
        self.extend_from_file(file)
    }

    /// Merge the definitions of a parsed dictionary file into this one
    pub fn extend_from_file(&mut self, file: DictionaryFile) -> Result<(), DictionaryError> {
        for vendor in file.vendors {
            self.insert_vendor(vendor.id, vendor.name);
        }
        for descriptor in file.attributes {
            if descriptor.name.is_empty() {
                return Err(DictionaryError::Invalid(format!(
                    "attribute with code {} has an empty name",
                    descriptor.code
                )));
            }
            if let Some(vendor_id) = descriptor.vendor_id {
                if !self.vendors.contains_key(&vendor_id) {
                    return Err(DictionaryError::Invalid(format!(
                        "attribute {} references undefined vendor {}",
                        descriptor.name, vendor_id
                    )));
                }
            }
            self.insert(descriptor);
        }
        Ok(())
    }

    pub fn insert(&mut self, descriptor: AttributeDescriptor) {
        let key = descriptor.key();
        if let Some(previous) = self.attributes.remove(&descriptor.name) {
            self.names.remove(&previous.key());
        }
        if let Some(previous_name) = self.names.insert(key, descriptor.name.clone()) {
            self.attributes.remove(&previous_name);
        }
        self.attributes.insert(descriptor.name.clone(), descriptor);
    }

    pub fn insert_vendor(&mut self, vendor_id: u32, name: impl Into<String>) {
        self.vendors.insert(vendor_id, name.into());
    }

    /// Add a symbolic value to an existing attribute
    pub fn add_value(
        &mut self,
        attribute: &str,
        name: impl Into<String>,
        value: u32,
    ) -> Result<(), DictionaryError> {
        let descriptor = self
            .attributes
            .get_mut(attribute)
            .ok_or_else(|| DictionaryError::Invalid(format!("unknown attribute {}", attribute)))?;
        descriptor.values.insert(name, value);
        Ok(())
    }

    pub fn with_attribute(mut self, descriptor: AttributeDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    pub fn with_vendor(mut self, vendor_id: u32, name: impl Into<String>) -> Self {
        self.insert_vendor(vendor_id, name);
        self
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn attributes(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.values()
    }
}

impl TryFrom<DictionaryFile> for MemoryDictionary {
    type Error = DictionaryError;

    fn try_from(file: DictionaryFile) -> Result<Self, Self::Error> {
        let mut dict = MemoryDictionary::new();
        dict.extend_from_file(file)?;
        Ok(dict)
    }
}

impl Dictionary for MemoryDictionary {
    fn resolve_name(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.get(name)
    }

    fn resolve_key(&self, key: AttributeKey) -> Option<&str> {
        self.names.get(&key).map(String::as_str)
    }

    fn resolve_vendor_name(&self, vendor_id: u32) -> Option<&str> {
        self.vendors.get(&vendor_id).map(String::as_str)
    }
}

const SERVICE_TYPES: &[(&str, u32)] = &[
    ("Login-User", 1),
    ("Framed-User", 2),
    ("Callback-Login-User", 3),
    ("Callback-Framed-User", 4),
    ("Outbound-User", 5),
    ("Administrative-User", 6),
    ("NAS-Prompt-User", 7),
    ("Authenticate-Only", 8),
    ("Callback-NAS-Prompt", 9),
    ("Call-Check", 10),
    ("Callback-Administrative", 11),
];

const FRAMED_PROTOCOLS: &[(&str, u32)] = &[
    ("PPP", 1),
    ("SLIP", 2),
    ("ARAP", 3),
    ("Gandalf-SLML", 4),
    ("Xylogics-IPX-SLIP", 5),
    ("X.75-Synchronous", 6),
];

const NAS_PORT_TYPES: &[(&str, u32)] = &[
    ("Async", 0),
    ("Sync", 1),
    ("ISDN", 2),
    ("ISDN-V120", 3),
    ("ISDN-V110", 4),
    ("Virtual", 5),
    ("PIAFS", 6),
    ("HDLC-Clear-Channel", 7),
    ("X.25", 8),
    ("X.75", 9),
    ("G.3-Fax", 10),
    ("SDSL", 11),
    ("ADSL-CAP", 12),
    ("ADSL-DMT", 13),
    ("IDSL", 14),
    ("Ethernet", 15),
    ("xDSL", 16),
    ("Cable", 17),
    ("Wireless-Other", 18),
    ("Wireless-802.11", 19),
];
