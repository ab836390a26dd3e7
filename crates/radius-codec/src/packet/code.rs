use std::fmt;

/// RADIUS packet codes as defined in RFC 2865 Section 4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Code {
    /// Access-Request (1)
    AccessRequest = 1,
    /// Access-Accept (2)
    AccessAccept = 2,
    /// Access-Reject (3)
    AccessReject = 3,
    /// Accounting-Request (4) - RFC 2866
    AccountingRequest = 4,
    /// Accounting-Response (5) - RFC 2866
    AccountingResponse = 5,
    /// Access-Challenge (11)
    AccessChallenge = 11,
    /// Status-Server (12) - RFC 5997
    StatusServer = 12,
    /// Status-Client (13) - RFC 5997
    StatusClient = 13,
}

impl Code {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Code::AccessRequest),
            2 => Some(Code::AccessAccept),
            3 => Some(Code::AccessReject),
            4 => Some(Code::AccountingRequest),
            5 => Some(Code::AccountingResponse),
            11 => Some(Code::AccessChallenge),
            12 => Some(Code::StatusServer),
            13 => Some(Code::StatusClient),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Name used on the wire documentation (e.g. "Access-Request")
    pub fn name(self) -> &'static str {
        match self {
            Code::AccessRequest => "Access-Request",
            Code::AccessAccept => "Access-Accept",
            Code::AccessReject => "Access-Reject",
            Code::AccountingRequest => "Accounting-Request",
            Code::AccountingResponse => "Accounting-Response",
            Code::AccessChallenge => "Access-Challenge",
            Code::StatusServer => "Status-Server",
            Code::StatusClient => "Status-Client",
        }
    }

    /// True for codes a NAS sends (the authenticator is a request authenticator)
    pub fn is_request(self) -> bool {
        matches!(
            self,
            Code::AccessRequest | Code::AccountingRequest | Code::StatusServer | Code::StatusClient
        )
    }
}

impl From<Code> for u8 {
    fn from(code: Code) -> u8 {
        code.as_u8()
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
