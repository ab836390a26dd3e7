mod code;
mod id;
#[allow(clippy::module_inception)]
mod packet;

pub use code::Code;
pub use id::IdAllocator;
pub use packet::{
    AUTHENTICATOR_LENGTH, CLIENT_IP_ADDRESS, KeyName, Packet, PacketError, REQUEST_AUTHENTICATOR,
    SkippedAttribute,
};
pub(crate) use packet::digest;
