//! Connection manager: the reconnect loop behind a [`Client`](crate::Client).
//!
//! ```text
//! Resolving → Connecting → Active → Terminating → ReconnectPending ─┐
//!     ▲            ▲                      │                         │
//!     │            └──────── same endpoint ◄────────────────────────┤
//!     └───────────────────── wrong node ◄───────────────────────────┘
//!                                         └─ close() → Closed
//! ```
//!
//! Only a wrong-node signal sends the loop back through the seed; every
//! other termination redials the endpoint it already has.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::client::Shared;
use crate::events::Generation;
use crate::gateway::Gateway;
use crate::session::{Session, SessionEnd};
use crate::types::{ConnectionState, Endpoint};

pub(crate) struct ConnectionManager {
    shared: Arc<Shared>,
    gateway: Arc<dyn Gateway>,
    endpoint: Endpoint,
    reconnect_interval: Duration,
    event_buffer: usize,
    generation: u64,
}

impl ConnectionManager {
    pub(crate) fn new(
        shared: Arc<Shared>,
        gateway: Arc<dyn Gateway>,
        endpoint: Endpoint,
        reconnect_interval: Duration,
        event_buffer: usize,
    ) -> Self {
        Self {
            shared,
            gateway,
            endpoint,
            reconnect_interval,
            event_buffer,
            generation: 0,
        }
    }

    /// Run `first` and every session after it on a background task.
    pub(crate) fn spawn(self, first: Session) -> JoinHandle<()> {
        tokio::spawn(self.run(first))
    }

    async fn run(mut self, first: Session) {
        let address = self.shared.address().to_owned();
        let mut next = Some(first);
        let mut needs_resolve = false;

        loop {
            if let Some(session) = next.take() {
                match self.run_generation(session).await {
                    SessionEnd::WrongNode => {
                        tracing::info!(
                            address = %address,
                            endpoint = %self.endpoint,
                            "node no longer serves this address"
                        );
                        needs_resolve = true;
                    }
                    SessionEnd::Closed => {
                        tracing::info!(endpoint = %self.endpoint, "node closed the connection");
                    }
                    SessionEnd::Shutdown => {}
                    SessionEnd::Failed(e) => {
                        if !self.shared.is_closed() {
                            tracing::warn!(
                                endpoint = %self.endpoint,
                                error = %e,
                                "connection lost"
                            );
                        }
                    }
                }
            }

            if self.shared.is_closed() {
                break;
            }

            self.shared.set_state(ConnectionState::ReconnectPending);
            tracing::info!(
                address = %address,
                delay_ms = self.reconnect_interval.as_millis() as u64,
                resolve = needs_resolve,
                "reconnecting"
            );

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_interval) => {}
                _ = self.shared.shutdown.cancelled() => break,
            }

            if needs_resolve {
                self.shared.set_state(ConnectionState::Resolving);
                let resolved = tokio::select! {
                    r = self.gateway.resolve_endpoint(&address) => r,
                    _ = self.shared.shutdown.cancelled() => break,
                };
                match resolved {
                    Ok(endpoint) => {
                        tracing::info!(address = %address, endpoint = %endpoint, "resolved serving node");
                        self.shared.set_endpoint(endpoint.clone());
                        self.endpoint = endpoint;
                        needs_resolve = false;
                    }
                    Err(e) => {
                        tracing::warn!(address = %address, error = %e, "failed to resolve serving node");
                        continue;
                    }
                }
            }

            self.shared.set_state(ConnectionState::Connecting);
            let dialed = tokio::select! {
                r = Session::establish(&self.endpoint) => r,
                _ = self.shared.shutdown.cancelled() => break,
            };
            match dialed {
                Ok(session) => next = Some(session),
                Err(e) => {
                    tracing::warn!(endpoint = %self.endpoint, error = %e, "failed to connect to node");
                }
            }
        }

        self.shared.set_state(ConnectionState::Closed);
        tracing::info!(address = %address, generations = self.generation, "client closed");
    }

    /// Active + Terminating for one session.
    async fn run_generation(&mut self, mut session: Session) -> SessionEnd {
        if self.shared.is_closed() {
            session.close().await;
            return SessionEnd::Shutdown;
        }

        self.generation += 1;
        let (events, generation) = Generation::channel(self.generation, self.event_buffer);
        self.shared.activate(session.writer(), generation);

        tracing::info!(
            generation = self.generation,
            endpoint = %session.endpoint(),
            "session active"
        );

        let end = session
            .run(self.shared.address(), &events, &self.shared.shutdown)
            .await;

        self.shared.set_state(ConnectionState::Terminating);
        self.shared.deactivate();
        self.shared.discard_pending(self.generation);
        drop(events);
        session.close().await;

        tracing::debug!(generation = self.generation, end = ?end, "session terminated");
        end
    }
}
