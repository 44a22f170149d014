//! `Server` builder and accept loop.
//!
//! The entry point for running Fourstack. One [`Server`] value bundles
//! every manager — registry, room directory, stats store, config — into
//! explicit context passed to handlers, so tests can stand up as many
//! isolated servers as they like.

use std::sync::Arc;

use fourstack_registry::ClientRegistry;
use fourstack_room::RoomDirectory;
use fourstack_stats::StatsStore;
use fourstack_transport::{AdmissionPolicy, Rejection, WsListener};

use crate::handler::handle_client;
use crate::{ServerConfig, ServerError};

/// Shared server state handed to each connection task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks; every
/// field is internally synchronized.
pub(crate) struct Shared<S: StatsStore> {
    pub(crate) registry: ClientRegistry,
    pub(crate) rooms: RoomDirectory,
    pub(crate) stats: S,
    pub(crate) config: ServerConfig,
}

/// The upgrade-time duplicate check.
///
/// A busy username gets through only when its bound room is holding a
/// disconnected seat open for it — the reconnection exception. Lock
/// order is registry → directory → room, matching every other path.
impl<S: StatsStore> AdmissionPolicy for Shared<S> {
    fn admit(&self, username: &str) -> Result<(), Rejection> {
        self.registry
            .check_available(username, |room_id| {
                self.rooms
                    .get(room_id)
                    .is_some_and(|room| room.is_disconnected(username))
            })
            .map_err(|_| Rejection::UsernameInUse)
    }
}

/// Builder for configuring and starting a server.
pub struct ServerBuilder {
    bind_addr: String,
    config: ServerConfig,
}

impl ServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the server configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and assembles the server around the given
    /// stats store.
    pub async fn build<S: StatsStore>(
        self,
        stats: S,
    ) -> Result<Server<S>, ServerError> {
        let listener = WsListener::bind(&self.bind_addr).await?;
        Ok(Server {
            listener,
            shared: Arc::new(Shared {
                registry: ClientRegistry::new(),
                rooms: RoomDirectory::new(),
                stats,
                config: self.config,
            }),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Fourstack server.
pub struct Server<S: StatsStore> {
    listener: WsListener,
    shared: Arc<Shared<S>>,
}

impl<S: StatsStore> Server<S> {
    /// Creates a new builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// Each admitted connection gets its own orchestrator task; a fault
    /// in one tears down only that task and whatever room it owned.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("fourstack server running");

        loop {
            match self.listener.accept(self.shared.as_ref()).await {
                Ok(Some(client)) => {
                    let shared = Arc::clone(&self.shared);
                    tokio::spawn(handle_client(client, shared));
                }
                Ok(None) => {
                    // Refused upgrade — already answered with an HTTP
                    // status and logged by the transport.
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
