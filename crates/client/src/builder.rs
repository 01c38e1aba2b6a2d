//! Builder pattern for constructing a [`Client`].

use std::sync::Arc;
use std::time::Duration;

use nkn_protocol::make_address_string;

use crate::client::{Client, Shared};
use crate::config::ClientConfig;
use crate::gateway::{Gateway, RpcGateway};
use crate::manager::ConnectionManager;
use crate::session::Session;
use crate::types::{ClientError, ConnectionState, Identity};

/// Fluent builder for [`Client`].
///
/// # Example
///
/// ```rust,no_run
/// # use nkn_client::{ClientBuilder, Identity};
/// # async fn demo() -> Result<(), nkn_client::ClientError> {
/// let client = ClientBuilder::new()
///     .identity(Identity::from_hex("02b0c6c5f2f5b4d1")?)
///     .identifier("alice")
///     .seed_rpc_server_addr("http://127.0.0.1:30003")
///     .reconnect_interval(std::time::Duration::from_secs(2))
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    config: ClientConfig,
    identity: Option<Identity>,
    identifier: String,
    gateway: Option<Arc<dyn Gateway>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            identity: None,
            identifier: String::new(),
            gateway: None,
        }
    }

    // ── Identity ─────────────────────────────────────────────────────

    /// Key pair the address is derived from.
    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Optional label prefixed to the address (`identifier.pubkeyhex`).
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    // ── Behavior ─────────────────────────────────────────────────────

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn seed_rpc_server_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.seed_rpc_server_addr = addr.into();
        self
    }

    /// Fixed delay between reconnect attempts (default 1s).
    pub fn reconnect_interval(mut self, d: Duration) -> Self {
        self.config.reconnect_interval_ms = d.as_millis() as u64;
        self
    }

    pub fn rpc_timeout(mut self, d: Duration) -> Self {
        self.config.rpc_timeout_ms = d.as_millis() as u64;
        self
    }

    /// Events a generation buffers before the read loop waits (default 1).
    pub fn event_buffer(mut self, n: usize) -> Self {
        self.config.event_buffer = n;
        self
    }

    /// Use a custom gateway instead of JSON-RPC against the seed.
    pub fn gateway(mut self, gateway: Arc<dyn Gateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    fn validate(&self) -> Result<(), ClientError> {
        if self.gateway.is_none() && self.config.seed_rpc_server_addr.trim().is_empty() {
            return Err(ClientError::Config("seed_rpc_server_addr is required".into()));
        }
        if self.config.event_buffer == 0 {
            return Err(ClientError::Config("event_buffer must be at least 1".into()));
        }
        Ok(())
    }

    /// Resolve, dial, and hand the session to a background connection
    /// manager.
    ///
    /// The first resolution and dial are not retried: their errors are
    /// returned here.
    pub async fn connect(self) -> Result<Client, ClientError> {
        self.validate()?;
        let identity = self
            .identity
            .ok_or_else(|| ClientError::Config("identity is required".into()))?;

        let gateway: Arc<dyn Gateway> = match self.gateway {
            Some(g) => g,
            None => Arc::new(RpcGateway::new(&self.config)?),
        };

        let address = make_address_string(identity.public_key(), &self.identifier);
        let shared = Arc::new(Shared::new(address));

        tracing::info!(address = %shared.address(), "resolving serving node");
        shared.set_state(ConnectionState::Resolving);
        let endpoint = gateway.resolve_endpoint(shared.address()).await?;
        shared.set_endpoint(endpoint.clone());

        shared.set_state(ConnectionState::Connecting);
        let session = Session::establish(&endpoint).await?;

        let task = ConnectionManager::new(
            shared.clone(),
            gateway.clone(),
            endpoint,
            self.config.reconnect_interval(),
            self.config.event_buffer,
        )
        .spawn(session);

        Ok(Client::new(shared, gateway, task))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
