//! JSON text frames exchanged with the serving node.

use serde::{Deserialize, Serialize};

use crate::errcode::ErrCode;
use crate::DecodeError;

/// Handshake action; also the action the node echoes to confirm it.
pub const ACTION_SET_CLIENT: &str = "setClient";

/// Action of a node-pushed block notification.
pub const ACTION_SEND_RAW_BLOCK: &str = "sendRawBlock";

/// Client → Node: bind this connection to an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetClient {
    #[serde(rename = "Action")]
    pub action: String,
    #[serde(rename = "Addr")]
    pub addr: String,
}

impl SetClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            action: ACTION_SET_CLIENT.into(),
            addr: addr.into(),
        }
    }
}

/// Node → Client: status envelope of every text frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFrame {
    #[serde(rename = "Error")]
    pub error: ErrCode,
    #[serde(rename = "Action", default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(rename = "Result", default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl ServerFrame {
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn success(action: impl Into<String>) -> Self {
        Self {
            error: ErrCode::SUCCESS,
            action: Some(action.into()),
            result: None,
        }
    }

    pub fn with_result(mut self, result: serde_json::Value) -> Self {
        self.result = Some(result);
        self
    }
}
