//! Core types: identity, endpoints, lifecycle states, and errors.

use std::fmt;

use nkn_protocol::{DecodeError, ErrCode};

/// The public half of the caller's key pair. Key management lives outside
/// this crate; only the public key is needed to derive the address.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    public_key: Vec<u8>,
}

impl Identity {
    pub fn from_public_key(public_key: impl Into<Vec<u8>>) -> Self {
        Self {
            public_key: public_key.into(),
        }
    }

    /// Parse a hex-encoded public key.
    pub fn from_hex(public_key: &str) -> Result<Self, ClientError> {
        hex::decode(public_key.trim())
            .map(Self::from_public_key)
            .map_err(|e| ClientError::Config(format!("invalid public key hex: {e}")))
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("public_key", &hex::encode(&self.public_key))
            .finish()
    }
}

/// WebSocket URL of the node currently serving this client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    /// Build a `ws://` endpoint from the `host:port` the seed returns.
    pub fn from_host(host: &str) -> Result<Self, GatewayError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(GatewayError::Malformed("empty websocket host".into()));
        }
        let url = format!("ws://{host}");
        reqwest::Url::parse(&url)
            .map_err(|e| GatewayError::Malformed(format!("invalid websocket host {host:?}: {e}")))?;
        Ok(Self(url))
    }

    /// Use a full `ws://` or `wss://` URL as-is.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the connection manager currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Resolving,
    Connecting,
    Active,
    Terminating,
    ReconnectPending,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resolving => "resolving",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Terminating => "terminating",
            Self::ReconnectPending => "reconnect_pending",
            Self::Closed => "closed",
        })
    }
}

/// Failures talking to the bootstrap seed.
#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("HTTP: {0}")]
    Http(String),
    #[error("seed returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<nkn_protocol::JsonRpcError> for GatewayError {
    fn from(e: nkn_protocol::JsonRpcError) -> Self {
        Self::Rpc {
            code: e.code,
            message: e.message,
        }
    }
}

/// Why a session's read loop ended with an error.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("node error: {0}")]
    Remote(ErrCode),
    #[error("unexpected close ({code}): {reason}")]
    UnexpectedClose { code: u16, reason: String },
}

impl From<DecodeError> for SessionError {
    fn from(e: DecodeError) -> Self {
        Self::Protocol(e.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

/// Top-level client error.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("config: {0}")]
    Config(String),
    #[error("gateway: {0}")]
    Gateway(#[from] GatewayError),
    #[error("session: {0}")]
    Session(#[from] SessionError),
    #[error("no active session")]
    NotConnected,
    #[error("client closed")]
    Closed,
}
