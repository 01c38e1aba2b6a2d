use std::fmt;

use serde::{Deserialize, Serialize};

/// Status code carried in the `Error` field of every node text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrCode(pub i64);

impl ErrCode {
    pub const SUCCESS: Self = Self(0);
    pub const SESSION_EXPIRED: Self = Self(41001);
    pub const SERVICE_CEILING: Self = Self(41002);
    pub const ILLEGAL_DATAFORMAT: Self = Self(41003);
    pub const INVALID_METHOD: Self = Self(42001);
    pub const INVALID_PARAMS: Self = Self(42002);
    pub const INVALID_TOKEN: Self = Self(42003);
    pub const INVALID_TRANSACTION: Self = Self(43001);
    pub const INVALID_ASSET: Self = Self(43002);
    pub const INVALID_BLOCK: Self = Self(43003);
    pub const INVALID_HASH: Self = Self(43004);
    pub const INVALID_VERSION: Self = Self(43005);
    pub const UNKNOWN_TRANSACTION: Self = Self(44001);
    pub const UNKNOWN_ASSET: Self = Self(44002);
    pub const UNKNOWN_BLOCK: Self = Self(44003);
    pub const UNKNOWN_HASH: Self = Self(44004);
    pub const INTERNAL_ERROR: Self = Self(45001);
    pub const SMARTCODE_ERROR: Self = Self(47001);
    /// The node no longer serves the client's address; the client must
    /// resolve its serving node again.
    pub const WRONG_NODE: Self = Self(48001);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// Human-readable text for the code, as reported by the node.
    pub fn message(self) -> &'static str {
        match self {
            Self::SUCCESS => "SUCCESS",
            Self::SESSION_EXPIRED => "SESSION EXPIRED",
            Self::SERVICE_CEILING => "SERVICE CEILING",
            Self::ILLEGAL_DATAFORMAT => "ILLEGAL DATAFORMAT",
            Self::INVALID_METHOD => "INVALID METHOD",
            Self::INVALID_PARAMS => "INVALID PARAMS",
            Self::INVALID_TOKEN => "VERIFY TOKEN ERROR",
            Self::INVALID_TRANSACTION => "INVALID TRANSACTION",
            Self::INVALID_ASSET => "INVALID ASSET",
            Self::INVALID_BLOCK => "INVALID BLOCK",
            Self::INVALID_HASH => "INVALID HASH",
            Self::INVALID_VERSION => "INVALID VERSION",
            Self::UNKNOWN_TRANSACTION => "UNKNOWN TRANSACTION",
            Self::UNKNOWN_ASSET => "UNKNOWN ASSET",
            Self::UNKNOWN_BLOCK => "UNKNOWN BLOCK",
            Self::UNKNOWN_HASH => "UNKNOWN HASH",
            Self::INTERNAL_ERROR => "INTERNAL ERROR",
            Self::SMARTCODE_ERROR => "SMARTCODE EXEC ERROR",
            Self::WRONG_NODE => "WRONG NODE TO CONNECT",
            _ => "UNKNOWN ERROR",
        }
    }
}

impl fmt::Display for ErrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.0)
    }
}
