//! Caller-facing client handle: messaging, generations, and close.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nkn_protocol::OutboundMessage;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::builder::ClientBuilder;
use crate::config::ClientConfig;
use crate::events::Generation;
use crate::gateway::Gateway;
use crate::session::SessionWriter;
use crate::types::{ClientError, ConnectionState, Endpoint, Identity};

/// State shared between the [`Client`] and its connection manager task.
pub(crate) struct Shared {
    address: String,
    closed: AtomicBool,
    pub(crate) shutdown: CancellationToken,
    writer: Mutex<Option<SessionWriter>>,
    pending: Mutex<Option<Generation>>,
    generation_ready: Notify,
    state: watch::Sender<ConnectionState>,
    endpoint: RwLock<Option<Endpoint>>,
}

impl Shared {
    pub(crate) fn new(address: String) -> Self {
        let (state, _) = watch::channel(ConnectionState::Resolving);
        Self {
            address,
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            writer: Mutex::new(None),
            pending: Mutex::new(None),
            generation_ready: Notify::new(),
            state,
            endpoint: RwLock::new(None),
        }
    }

    pub(crate) fn address(&self) -> &str {
        &self.address
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    pub(crate) fn set_endpoint(&self, endpoint: Endpoint) {
        *self.endpoint.write() = Some(endpoint);
    }

    /// Expose a new session to callers. Replaces any generation nobody
    /// picked up; that one is already closed.
    pub(crate) fn activate(&self, writer: SessionWriter, generation: Generation) {
        *self.writer.lock() = Some(writer);
        *self.pending.lock() = Some(generation);
        self.set_state(ConnectionState::Active);
        self.generation_ready.notify_waiters();
    }

    pub(crate) fn deactivate(&self) {
        self.writer.lock().take();
    }

    /// Drop generation `id` if nobody picked it up before its session ended.
    pub(crate) fn discard_pending(&self, id: u64) {
        let mut pending = self.pending.lock();
        if pending.as_ref().is_some_and(|g| g.id() == id) {
            pending.take();
        }
    }
}

/// A resilient connection to the overlay.
///
/// Created via [`Client::connect`] or [`ClientBuilder`]. A background task
/// keeps one session alive, reconnecting after failures, until
/// [`close`](Self::close) is called or the handle is dropped.
///
/// # Example
///
/// ```rust,no_run
/// # use nkn_client::{Client, ClientConfig, Event, Identity};
/// # async fn demo() -> Result<(), nkn_client::ClientError> {
/// let identity = Identity::from_hex("02b0c6c5f2f5b4d1b8b7f1e6f9d3a2c1b0a9f8e7d6c5b4a3f2e1d0c9b8a7f6e5d4")?;
/// let client = Client::connect(&identity, "alice", ClientConfig::default()).await?;
///
/// while let Some(mut generation) = client.next_generation().await {
///     while let Some(event) = generation.recv().await {
///         if let Event::Message(msg) = event {
///             client.send([msg.src], msg.payload, 60).await?;
///         }
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct Client {
    shared: Arc<Shared>,
    gateway: Arc<dyn Gateway>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Start a new builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Resolve the serving node for `identity`/`identifier`, connect to it,
    /// and keep the connection alive in the background.
    ///
    /// Fails if the first resolution or the first dial fails.
    pub async fn connect(
        identity: &Identity,
        identifier: &str,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        ClientBuilder::new()
            .config(config)
            .identity(identity.clone())
            .identifier(identifier)
            .connect()
            .await
    }

    pub(crate) fn new(
        shared: Arc<Shared>,
        gateway: Arc<dyn Gateway>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            shared,
            gateway,
            task: Mutex::new(Some(task)),
        }
    }

    /// This client's overlay address.
    pub fn address(&self) -> &str {
        self.shared.address()
    }

    /// Endpoint of the node last resolved for this client.
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.shared.endpoint.read().clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Take the newest session generation, waiting until one exists.
    ///
    /// Returns `None` once the client is closed. A generation's events end
    /// when its session does; call this again to follow the reconnect.
    /// A generation whose session ended before anyone took it is discarded,
    /// so between sessions this waits for the next one.
    pub async fn next_generation(&self) -> Option<Generation> {
        loop {
            let notified = self.shared.generation_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.shared.is_closed() {
                return None;
            }
            let pending = self.shared.pending.lock().take();
            if let Some(generation) = pending {
                return Some(generation);
            }

            notified.await;
        }
    }

    /// Send `payload` to every address in `dests` as one binary frame on the
    /// current session.
    ///
    /// Fails with [`ClientError::NotConnected`] between sessions; nothing is
    /// queued or retried.
    pub async fn send<I, S>(
        &self,
        dests: I,
        payload: impl Into<Vec<u8>>,
        max_holding_seconds: u32,
    ) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.shared.is_closed() {
            return Err(ClientError::Closed);
        }
        let writer = self
            .shared
            .writer
            .lock()
            .clone()
            .ok_or(ClientError::NotConnected)?;

        let msg = OutboundMessage::new(
            dests.into_iter().map(Into::into).collect(),
            payload.into(),
            max_holding_seconds,
        );
        tracing::trace!(
            dests = msg.dests.len(),
            bytes = msg.payload.len(),
            "sending message"
        );
        writer.send_binary(msg.encode_to_vec()).await?;
        Ok(())
    }

    /// Send `payload` to the current subscribers of `topic`.
    ///
    /// Subscribers are looked up first, then sent to; the two steps are not
    /// atomic. No subscribers means nothing is written.
    pub async fn publish(
        &self,
        topic: &str,
        payload: impl Into<Vec<u8>>,
        max_holding_seconds: u32,
    ) -> Result<(), ClientError> {
        if self.shared.is_closed() {
            return Err(ClientError::Closed);
        }
        let subscribers = self.gateway.resolve_subscribers(topic).await?;
        if subscribers.is_empty() {
            tracing::debug!(topic, "no subscribers, nothing to publish");
            return Ok(());
        }
        self.send(subscribers, payload, max_holding_seconds).await
    }

    /// Stop the client for good. Safe to call more than once.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(address = %self.shared.address, "closing client");
        self.shared.shutdown.cancel();
        self.shared.deactivate();
        self.shared.generation_ready.notify_waiters();
    }

    /// Close and wait for the background task to finish.
    pub async fn shutdown(self) {
        self.close();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "connection manager task failed");
            }
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("address", &self.shared.address)
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .finish()
    }
}
