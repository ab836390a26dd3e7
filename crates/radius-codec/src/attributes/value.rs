use crate::packet::PacketError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Declared value type of a dictionary attribute (RFC 2865 Section 5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// 1-253 octets of UTF-8 text
    String,
    /// 32-bit unsigned value, big-endian
    Integer,
    /// IPv4 address, 4 octets
    IpAddr,
    /// Seconds since 1970-01-01 00:00:00 UTC, 32-bit big-endian
    Date,
    /// Arbitrary binary data
    Octets,
}

/// A typed attribute value, as handed to and returned from name-based accessors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    String(String),
    Integer(u32),
    IpAddr(Ipv4Addr),
    Date(u32),
    Octets(Vec<u8>),
}

impl DataType {
    /// Encode a typed value into its raw wire form
    pub fn encode(self, value: &AttributeValue) -> Result<Vec<u8>, PacketError> {
        match (self, value) {
            (DataType::String, AttributeValue::String(s)) => Ok(s.as_bytes().to_vec()),
            (DataType::String, AttributeValue::Octets(b)) => Ok(b.clone()),
            (DataType::Integer, AttributeValue::Integer(n)) => Ok(n.to_be_bytes().to_vec()),
            (DataType::IpAddr, AttributeValue::IpAddr(ip)) => Ok(ip.octets().to_vec()),
            (DataType::IpAddr, AttributeValue::String(s)) => s
                .parse::<Ipv4Addr>()
                .map(|ip| ip.octets().to_vec())
                .map_err(|_| PacketError::InvalidValue(format!("Invalid IPv4 address: {}", s))),
            (DataType::Date, AttributeValue::Date(t) | AttributeValue::Integer(t)) => {
                Ok(t.to_be_bytes().to_vec())
            }
            (DataType::Octets, AttributeValue::Octets(b)) => Ok(b.clone()),
            (DataType::Octets, AttributeValue::String(s)) => Ok(s.as_bytes().to_vec()),
            (data_type, value) => Err(PacketError::InvalidValue(format!(
                "Cannot encode {} as {}",
                value.kind(),
                data_type
            ))),
        }
    }

    /// Decode a raw wire value according to this type
    ///
    /// String attributes that are not valid UTF-8 are returned as `Octets`.
    pub fn decode(self, raw: &[u8]) -> Result<AttributeValue, PacketError> {
        match self {
            DataType::String => Ok(match String::from_utf8(raw.to_vec()) {
                Ok(s) => AttributeValue::String(s),
                Err(e) => AttributeValue::Octets(e.into_bytes()),
            }),
            DataType::Integer => Ok(AttributeValue::Integer(u32::from_be_bytes(four_bytes(
                self, raw,
            )?))),
            DataType::IpAddr => Ok(AttributeValue::IpAddr(Ipv4Addr::from(four_bytes(self, raw)?))),
            DataType::Date => Ok(AttributeValue::Date(u32::from_be_bytes(four_bytes(self, raw)?))),
            DataType::Octets => Ok(AttributeValue::Octets(raw.to_vec())),
        }
    }
}

fn four_bytes(data_type: DataType, raw: &[u8]) -> Result<[u8; 4], PacketError> {
    raw.try_into().map_err(|_| {
        PacketError::InvalidValue(format!(
            "Expected 4 bytes for {}, got {}",
            data_type,
            raw.len()
        ))
    })
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::String => "string",
            DataType::Integer => "integer",
            DataType::IpAddr => "ipaddr",
            DataType::Date => "date",
            DataType::Octets => "octets",
        };
        f.write_str(name)
    }
}

impl AttributeValue {
    fn kind(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => "string",
            AttributeValue::Integer(_) => "integer",
            AttributeValue::IpAddr(_) => "ipaddr",
            AttributeValue::Date(_) => "date",
            AttributeValue::Octets(_) => "octets",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<u32> {
        match self {
            AttributeValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_ipv4(&self) -> Option<Ipv4Addr> {
        match self {
            AttributeValue::IpAddr(ip) => Some(*ip),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{:?}", s),
            AttributeValue::Integer(n) | AttributeValue::Date(n) => write!(f, "{}", n),
            AttributeValue::IpAddr(ip) => write!(f, "{}", ip),
            AttributeValue::Octets(bytes) => {
                f.write_str("0x")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<u32> for AttributeValue {
    fn from(n: u32) -> Self {
        AttributeValue::Integer(n)
    }
}

impl From<Ipv4Addr> for AttributeValue {
    fn from(ip: Ipv4Addr) -> Self {
        AttributeValue::IpAddr(ip)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(bytes: Vec<u8>) -> Self {
        AttributeValue::Octets(bytes)
    }
}

impl From<&[u8]> for AttributeValue {
    fn from(bytes: &[u8]) -> Self {
        AttributeValue::Octets(bytes.to_vec())
    }
}
