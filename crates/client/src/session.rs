//! One WebSocket to a serving node: dial, handshake, and the read loop that
//! classifies inbound frames.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use nkn_protocol::{
    Block, ErrCode, InboundMessage, ServerFrame, SetClient, ACTION_SEND_RAW_BLOCK,
    ACTION_SET_CLIENT,
};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::events::Event;
use crate::types::{Endpoint, SessionError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on the close handshake. A `send` stuck on a peer that stopped
/// reading holds the write half, and terminating must not wait for it.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// How a session's read loop ended.
#[derive(Debug)]
pub(crate) enum SessionEnd {
    /// The node went away or the stream ended without a close code.
    Closed,
    /// The node no longer serves our address.
    WrongNode,
    /// The client was closed by its owner.
    Shutdown,
    Failed(SessionError),
}

/// Shared write half. Cloned into the client so `send` can write binary
/// frames while the read loop owns the read half.
#[derive(Clone)]
pub(crate) struct SessionWriter {
    sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
}

impl SessionWriter {
    async fn send_text<T: Serialize>(&self, value: &T) -> Result<(), SessionError> {
        let json = serde_json::to_string(value)?;
        self.sink.lock().await.send(Message::Text(json)).await?;
        Ok(())
    }

    pub(crate) async fn send_binary(&self, data: Vec<u8>) -> Result<(), SessionError> {
        self.sink.lock().await.send(Message::Binary(data)).await?;
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.sink.lock().await.close().await {
            tracing::trace!(error = %e, "websocket already gone on close");
        }
    }
}

pub(crate) struct Session {
    endpoint: Endpoint,
    writer: SessionWriter,
    reader: SplitStream<WsStream>,
}

impl Session {
    /// Dial `endpoint`. The handshake is sent later, when the session goes
    /// active.
    pub(crate) async fn establish(endpoint: &Endpoint) -> Result<Self, SessionError> {
        tracing::info!(endpoint = %endpoint, "connecting to node");

        let (ws, _response) = tokio_tungstenite::connect_async(endpoint.as_str()).await?;
        let (sink, reader) = ws.split();

        Ok(Self {
            endpoint: endpoint.clone(),
            writer: SessionWriter {
                sink: Arc::new(Mutex::new(sink)),
            },
            reader,
        })
    }

    pub(crate) fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub(crate) fn writer(&self) -> SessionWriter {
        self.writer.clone()
    }

    /// Send `setClient` and read frames until the session ends.
    ///
    /// Each classified event is delivered on `events`; delivery waits for
    /// the consumer, so a caller that stops reading stalls this loop.
    pub(crate) async fn run(
        &mut self,
        address: &str,
        events: &mpsc::Sender<Event>,
        shutdown: &CancellationToken,
    ) -> SessionEnd {
        match self.read_loop(address, events, shutdown).await {
            Ok(end) => end,
            Err(e) => SessionEnd::Failed(e),
        }
    }

    async fn read_loop(
        &mut self,
        address: &str,
        events: &mpsc::Sender<Event>,
        shutdown: &CancellationToken,
    ) -> Result<SessionEnd, SessionError> {
        self.writer.send_text(&SetClient::new(address)).await?;

        loop {
            let next = tokio::select! {
                next = self.reader.next() => next,
                _ = shutdown.cancelled() => return Ok(SessionEnd::Shutdown),
            };

            let msg = match next {
                Some(Ok(msg)) => msg,
                Some(Err(e)) if is_expected_close(&e) => return Ok(SessionEnd::Closed),
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(SessionEnd::Closed),
            };

            match classify(msg)? {
                Inbound::Event(event) => {
                    tokio::select! {
                        sent = events.send(event) => {
                            if sent.is_err() {
                                tracing::debug!("generation dropped by caller, discarding event");
                            }
                        }
                        _ = shutdown.cancelled() => return Ok(SessionEnd::Shutdown),
                    }
                }
                Inbound::WrongNode => return Ok(SessionEnd::WrongNode),
                Inbound::Closed => return Ok(SessionEnd::Closed),
                Inbound::Ignored => {}
            }
        }
    }

    /// Close the socket, giving up after [`CLOSE_TIMEOUT`]. The session is
    /// spent afterwards; dropping it releases the read half either way.
    pub(crate) async fn close(self) {
        if tokio::time::timeout(CLOSE_TIMEOUT, self.writer.close())
            .await
            .is_err()
        {
            tracing::debug!(endpoint = %self.endpoint, "close handshake timed out");
        }
    }
}

/// Result of classifying one inbound frame.
#[derive(Debug, PartialEq)]
pub(crate) enum Inbound {
    Event(Event),
    WrongNode,
    Closed,
    Ignored,
}

pub(crate) fn classify(msg: Message) -> Result<Inbound, SessionError> {
    match msg {
        Message::Text(text) => classify_text(&text),
        Message::Binary(data) => {
            let msg = InboundMessage::decode(&data)?;
            tracing::trace!(src = %msg.src, bytes = msg.payload.len(), "inbound message");
            Ok(Inbound::Event(Event::Message(msg)))
        }
        Message::Close(frame) => classify_close(frame),
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Ok(Inbound::Ignored),
    }
}

fn classify_text(text: &str) -> Result<Inbound, SessionError> {
    let frame = ServerFrame::parse(text)?;

    if frame.error == ErrCode::WRONG_NODE {
        return Ok(Inbound::WrongNode);
    }
    if !frame.error.is_success() {
        return Err(SessionError::Remote(frame.error));
    }

    let action = frame
        .action
        .ok_or_else(|| SessionError::Protocol("frame without Action".into()))?;

    match action.as_str() {
        ACTION_SET_CLIENT => Ok(Inbound::Event(Event::Connected)),
        ACTION_SEND_RAW_BLOCK => {
            let result = frame.result.ok_or_else(|| {
                SessionError::Protocol(format!("{ACTION_SEND_RAW_BLOCK} without Result"))
            })?;
            Ok(Inbound::Event(Event::Block(Block::from_json(result))))
        }
        other => {
            tracing::debug!(action = other, "ignoring node action");
            Ok(Inbound::Ignored)
        }
    }
}

/// Going-away and abnormal closures are how nodes drop clients on restart;
/// any other close code is a failure. A close frame without a code (1005 on
/// the wire) also counts as clean: the reconnect that follows is the same
/// either way, and it is what a plain socket close from the node looks like.
fn classify_close(frame: Option<CloseFrame<'static>>) -> Result<Inbound, SessionError> {
    match frame {
        None => Ok(Inbound::Closed),
        Some(f) if matches!(f.code, CloseCode::Away | CloseCode::Abnormal) => Ok(Inbound::Closed),
        Some(f) => Err(SessionError::UnexpectedClose {
            code: u16::from(f.code),
            reason: f.reason.into_owned(),
        }),
    }
}

fn is_expected_close(e: &tungstenite::Error) -> bool {
    matches!(
        e,
        tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
            | tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake)
    )
}
