//! `nkn-client`: resilient client session for the NKN messaging overlay.
//!
//! A client holds one WebSocket to the node that serves its address and
//! keeps it alive: when the connection drops it redials, and when the node
//! reports that it no longer serves the address it asks the seed for the
//! right node first.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Caller                                                      │
//! │    client.send / client.publish     client.next_generation   │
//! └──────────────┬──────────────────────────────▲────────────────┘
//!                │ binary frames                │ Event::{Connected,
//!                ▼                              │   Message, Block}
//! ┌──────────────────────────┐     ┌────────────┴───────────────┐
//! │  Session (write half)    │     │  Session read loop         │
//! └──────────────┬───────────┘     └────────────▲───────────────┘
//!                │        ConnectionManager     │
//!                │   resolve → dial → run → wait → …
//!                ▼                              │
//!           serving node ◄──── Gateway (seed JSON-RPC)
//! ```
//!
//! # Connection flow
//!
//! 1. `getwsaddr` on the seed maps the address to a node host
//! 2. Dial `ws://<host>` and send `{"Action":"setClient","Addr":...}`
//! 3. The node acknowledges with `setClient`; an [`Event::Connected`] is
//!    emitted on the new [`Generation`]
//! 4. Binary frames become [`Event::Message`], `sendRawBlock` frames become
//!    [`Event::Block`]
//! 5. On disconnect: wait a fixed interval and redial; on a wrong-node error,
//!    resolve again before redialing

pub mod builder;
pub mod client;
pub mod config;
pub mod events;
pub mod gateway;
mod manager;
mod session;
pub mod types;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use builder::ClientBuilder;
pub use client::Client;
pub use config::ClientConfig;
pub use events::{Event, Generation};
pub use gateway::{Gateway, RpcGateway};
pub use types::{ClientError, ConnectionState, Endpoint, GatewayError, Identity, SessionError};

// Re-export protocol types so callers never need to import nkn-protocol directly.
pub use nkn_protocol::{Block, ErrCode, InboundMessage, OutboundMessage};
