//! RADIUS Packet Codec
//!
//! Encoding and decoding of RADIUS packets as defined in RFC 2865 and
//! RFC 2866, driven by an attribute [`Dictionary`](dictionary::Dictionary).
//!
//! # Features
//!
//! - Binary header and attribute TLV codec, including vendor-specific attributes
//! - Typed attribute values resolved through a pluggable dictionary
//! - Request and Response Authenticator calculation and verification
//! - User-Password hiding (RFC 2865 Section 5.2)
//! - Message-Authenticator signing (RFC 2869)
//!
//! Transport, retransmission and server logic are out of scope.
//!
//! # Example
//!
//! ```rust
//! use radius_codec::{AuthPacket, Code, IdAllocator, MemoryDictionary, Packet};
//! use std::sync::Arc;
//!
//! let dict = Arc::new(MemoryDictionary::rfc2865());
//! let ids = IdAllocator::new(0);
//!
//! // Build an Access-Request
//! let mut request = AuthPacket::new(b"secret", dict.clone());
//! request.add_attribute("User-Name", "alice").unwrap();
//! request.set_user_password(b"wonderland");
//! let bytes = request.encode_request(&ids).unwrap();
//!
//! // Server side: decode, recover the password, answer
//! let mut received = AuthPacket::decode(&bytes, b"secret", dict.clone()).unwrap();
//! received.decrypt_attributes().unwrap();
//! let reply = received.create_reply().encode_reply().unwrap();
//!
//! // Client side: check the reply belongs to the request
//! let answer = Packet::decode(&reply, b"secret", dict).unwrap();
//! assert_eq!(answer.packet_code(), Some(Code::AccessAccept));
//! assert!(request.verify_reply(&answer, Some(&reply)));
//! ```

pub mod accounting;
pub mod attributes;
pub mod auth;
pub mod config;
pub mod dictionary;
pub mod message_auth;
pub mod packet;

pub use accounting::{AcctAuthentic, AcctPacket, AcctStatusType, AcctTerminateCause};
pub use attributes::{AttributeKey, AttributeType, AttributeValue, DataType};
pub use auth::{AuthPacket, decrypt_user_password, encrypt_user_password, generate_request_authenticator};
pub use config::{CodecConfig, ConfigError};
pub use dictionary::{AttributeDescriptor, Dictionary, DictionaryError, EncryptionMethod, MemoryDictionary};
pub use message_auth::{calculate_message_authenticator, verify_message_authenticator};
pub use packet::{Code, IdAllocator, Packet, PacketError};
