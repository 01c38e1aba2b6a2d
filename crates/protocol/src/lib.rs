//! Node wire protocol: WebSocket frame types, error codes, the binary message
//! envelope, and the JSON-RPC shapes spoken by the bootstrap seed.
//!
//! A client holds one WebSocket to the node that serves its address.
//! Control traffic travels as JSON text frames; messages travel as binary
//! frames carrying a protobuf-encoded envelope.

pub mod address;
pub mod block;
pub mod errcode;
pub mod frame;
pub mod message;
pub mod rpc;

mod wire;

pub use address::make_address_string;
pub use block::Block;
pub use errcode::ErrCode;
pub use frame::{ServerFrame, SetClient, ACTION_SEND_RAW_BLOCK, ACTION_SET_CLIENT};
pub use message::{InboundMessage, OutboundMessage};
pub use rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

/// Errors produced while decoding frames received from a node.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("truncated {0}")]
    Truncated(&'static str),

    #[error("varint overflow")]
    VarintOverflow,

    #[error("unsupported wire type {wire_type} for field {field}")]
    WireType { field: u32, wire_type: u8 },

    #[error("field {0} is not valid UTF-8")]
    Utf8(u32),
}
