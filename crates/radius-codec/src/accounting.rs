//! Accounting-Request / Accounting-Response framing (RFC 2866)
//!
//! Unlike an Access-Request, the authenticator of an Accounting-Request is
//! a hash: MD5(Code + Identifier + Length + 16 zero octets + Attributes +
//! Secret). A server recomputes it to check the sender knows the secret.
//!
//! # Example
//!
//! ```rust
//! use radius_codec::accounting::{AcctPacket, AcctStatusType};
//! use radius_codec::dictionary::MemoryDictionary;
//! use radius_codec::packet::IdAllocator;
//! use std::sync::Arc;
//!
//! let dict = Arc::new(MemoryDictionary::rfc2865());
//! let ids = IdAllocator::new(0);
//!
//! let mut request = AcctPacket::new(b"secret", dict.clone());
//! request.add_attribute("Acct-Status-Type", AcctStatusType::Start.name()).unwrap();
//! request.add_attribute("Acct-Session-Id", "0001").unwrap();
//! let bytes = request.encode_request(&ids).unwrap();
//!
//! let received = AcctPacket::decode(&bytes, b"secret", dict).unwrap();
//! assert!(received.verify_request());
//! ```

use crate::dictionary::Dictionary;
use crate::packet::{AUTHENTICATOR_LENGTH, Code, IdAllocator, Packet, PacketError, digest};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::debug;

const HEADER_LENGTH: usize = 20;
const ZERO_AUTHENTICATOR: [u8; AUTHENTICATOR_LENGTH] = [0u8; AUTHENTICATOR_LENGTH];

/// Accounting Status-Type values (RFC 2866 Section 5.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AcctStatusType {
    Start = 1,
    Stop = 2,
    InterimUpdate = 3,
    /// NAS is ready
    AccountingOn = 7,
    /// NAS is shutting down
    AccountingOff = 8,
}

impl AcctStatusType {
    pub const ALL: [AcctStatusType; 5] = [
        AcctStatusType::Start,
        AcctStatusType::Stop,
        AcctStatusType::InterimUpdate,
        AcctStatusType::AccountingOn,
        AcctStatusType::AccountingOff,
    ];

    /// Convert from u32 value
    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_u32() == value)
    }

    /// Convert to u32 value
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Symbolic value name as it appears in dictionaries
    pub fn name(self) -> &'static str {
        match self {
            AcctStatusType::Start => "Start",
            AcctStatusType::Stop => "Stop",
            AcctStatusType::InterimUpdate => "Interim-Update",
            AcctStatusType::AccountingOn => "Accounting-On",
            AcctStatusType::AccountingOff => "Accounting-Off",
        }
    }
}

/// Acct-Terminate-Cause values (RFC 2866 Section 5.10)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AcctTerminateCause {
    UserRequest = 1,
    LostCarrier = 2,
    LostService = 3,
    IdleTimeout = 4,
    SessionTimeout = 5,
    AdminReset = 6,
    AdminReboot = 7,
    PortError = 8,
    NasError = 9,
    NasRequest = 10,
    NasReboot = 11,
    PortUnneeded = 12,
    PortPreempted = 13,
    PortSuspended = 14,
    ServiceUnavailable = 15,
    Callback = 16,
    UserError = 17,
    HostRequest = 18,
}

impl AcctTerminateCause {
    pub const ALL: [AcctTerminateCause; 18] = [
        AcctTerminateCause::UserRequest,
        AcctTerminateCause::LostCarrier,
        AcctTerminateCause::LostService,
        AcctTerminateCause::IdleTimeout,
        AcctTerminateCause::SessionTimeout,
        AcctTerminateCause::AdminReset,
        AcctTerminateCause::AdminReboot,
        AcctTerminateCause::PortError,
        AcctTerminateCause::NasError,
        AcctTerminateCause::NasRequest,
        AcctTerminateCause::NasReboot,
        AcctTerminateCause::PortUnneeded,
        AcctTerminateCause::PortPreempted,
        AcctTerminateCause::PortSuspended,
        AcctTerminateCause::ServiceUnavailable,
        AcctTerminateCause::Callback,
        AcctTerminateCause::UserError,
        AcctTerminateCause::HostRequest,
    ];

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|cause| cause.as_u32() == value)
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            AcctTerminateCause::UserRequest => "User-Request",
            AcctTerminateCause::LostCarrier => "Lost-Carrier",
            AcctTerminateCause::LostService => "Lost-Service",
            AcctTerminateCause::IdleTimeout => "Idle-Timeout",
            AcctTerminateCause::SessionTimeout => "Session-Timeout",
            AcctTerminateCause::AdminReset => "Admin-Reset",
            AcctTerminateCause::AdminReboot => "Admin-Reboot",
            AcctTerminateCause::PortError => "Port-Error",
            AcctTerminateCause::NasError => "NAS-Error",
            AcctTerminateCause::NasRequest => "NAS-Request",
            AcctTerminateCause::NasReboot => "NAS-Reboot",
            AcctTerminateCause::PortUnneeded => "Port-Unneeded",
            AcctTerminateCause::PortPreempted => "Port-Preempted",
            AcctTerminateCause::PortSuspended => "Port-Suspended",
            AcctTerminateCause::ServiceUnavailable => "Service-Unavailable",
            AcctTerminateCause::Callback => "Callback",
            AcctTerminateCause::UserError => "User-Error",
            AcctTerminateCause::HostRequest => "Host-Request",
        }
    }
}

/// Acct-Authentic values (RFC 2866 Section 5.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AcctAuthentic {
    Radius = 1,
    Local = 2,
    Remote = 3,
}

impl AcctAuthentic {
    pub const ALL: [AcctAuthentic; 3] = [AcctAuthentic::Radius, AcctAuthentic::Local, AcctAuthentic::Remote];

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|authentic| authentic.as_u32() == value)
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            AcctAuthentic::Radius => "RADIUS",
            AcctAuthentic::Local => "Local",
            AcctAuthentic::Remote => "Remote",
        }
    }
}

/// An accounting packet (Accounting-Request and its reply)
#[derive(Debug, Clone)]
pub struct AcctPacket {
    packet: Packet,
}

impl AcctPacket {
    /// A new Accounting-Request
    pub fn new(secret: impl AsRef<[u8]>, dictionary: Arc<dyn Dictionary>) -> Self {
        AcctPacket {
            packet: Packet::new(Code::AccountingRequest, secret, dictionary),
        }
    }

    /// Decode an accounting packet received from the network
    ///
    /// The raw bytes are kept so [`AcctPacket::verify_request`] can check
    /// the authenticator later.
    pub fn decode(
        data: &[u8],
        secret: impl AsRef<[u8]>,
        dictionary: Arc<dyn Dictionary>,
    ) -> Result<Self, PacketError> {
        Packet::decode(data, secret, dictionary).map(AcctPacket::from)
    }

    pub fn with_id(mut self, id: u8) -> Self {
        self.packet.id = Some(id);
        self
    }

    pub fn into_packet(self) -> Packet {
        self.packet
    }

    /// Create a ready-to-transmit accounting request
    ///
    /// Computes the Request Authenticator over the encoded packet and stores
    /// it on `self`, so replies can be verified against it.
    pub fn encode_request(&mut self, ids: &IdAllocator) -> Result<Vec<u8>, PacketError> {
        let attributes = self.packet.encode_attributes()?;
        let id = self.packet.allocate_id(ids);
        let header = self.packet.header(id, attributes.len())?;

        let authenticator = digest(&[
            &header[..],
            &ZERO_AUTHENTICATOR[..],
            &attributes[..],
            self.packet.secret(),
        ]);
        self.packet.authenticator = Some(authenticator);

        let mut buffer = Vec::with_capacity(HEADER_LENGTH + attributes.len());
        buffer.extend_from_slice(&header);
        buffer.extend_from_slice(&authenticator);
        buffer.extend_from_slice(&attributes);
        Ok(buffer)
    }

    /// Check the Request Authenticator of `raw` against this packet's secret
    ///
    /// The expected value is the authenticator field of `self`, normally
    /// set by decoding `raw`.
    pub fn verify_request_authenticator(&self, raw: &[u8]) -> bool {
        let Some(authenticator) = self.packet.authenticator else {
            return false;
        };
        if raw.len() < HEADER_LENGTH {
            return false;
        }

        let expected = digest(&[
            &raw[..4],
            &ZERO_AUTHENTICATOR[..],
            &raw[HEADER_LENGTH..],
            self.packet.secret(),
        ]);
        let valid: bool = expected.as_slice().ct_eq(authenticator.as_slice()).into();
        if !valid {
            debug!(id = ?self.packet.id, "accounting request authenticator mismatch");
        }
        valid
    }

    /// Verify a decoded request against the bytes it was decoded from
    ///
    /// Returns false for packets that were not decoded.
    pub fn verify_request(&self) -> bool {
        self.packet
            .raw_packet()
            .is_some_and(|raw| self.verify_request_authenticator(raw))
    }

    /// An Accounting-Response skeleton answering this request
    pub fn create_reply(&self) -> AcctPacket {
        AcctPacket {
            packet: self.packet.create_reply(Code::AccountingResponse),
        }
    }
}

impl From<Packet> for AcctPacket {
    fn from(packet: Packet) -> Self {
        AcctPacket { packet }
    }
}

impl Deref for AcctPacket {
    type Target = Packet;

    fn deref(&self) -> &Packet {
        &self.packet
    }
}

impl DerefMut for AcctPacket {
    fn deref_mut(&mut self) -> &mut Packet {
        &mut self.packet
    }
}

impl fmt::Display for AcctPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.packet, f)
    }
}
