//! `CastleServer` builder and server loop.
//!
//! The entry point that ties the layers together: transport → protocol →
//! session → room. Besides the accept loop, the server owns the two
//! background sweeps — idle-room eviction and session reaping — that
//! keep an unattended process from accumulating dead state.

use std::sync::Arc;
use std::time::Instant;

use castle_protocol::{Codec, JsonCodec};
use castle_room::{RoomRegistry, RoomSettings, RulesEngine};
use castle_session::{SessionConfig, SessionManager};
use castle_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::CastleError;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks; the two
/// managers sit behind mutexes that are held only for in-memory
/// bookkeeping, never across network I/O.
pub(crate) struct ServerState<R: RulesEngine, C: Codec> {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) registry: Mutex<RoomRegistry<R>>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Castle server.
///
/// # Example
///
/// ```rust,no_run
/// use castle::{CastleServerBuilder, StandardChess};
///
/// # async fn run() -> Result<(), castle::CastleError> {
/// let server = CastleServerBuilder::new()
///     .bind("0.0.0.0:4000")
///     .build::<StandardChess>()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct CastleServerBuilder {
    bind_addr: String,
    room_settings: RoomSettings,
    session_config: SessionConfig,
}

impl CastleServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:4000".to_string(),
            room_settings: RoomSettings::default(),
            session_config: SessionConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the per-room settings (reconnection window, idle TTL).
    pub fn room_settings(mut self, settings: RoomSettings) -> Self {
        self.room_settings = settings;
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Builds the server with the given rules engine, using `JsonCodec`
    /// and the WebSocket transport.
    pub async fn build<R: RulesEngine>(
        self,
    ) -> Result<CastleServer<R, JsonCodec>, CastleError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionManager::new(self.session_config)),
            registry: Mutex::new(RoomRegistry::new(self.room_settings)),
            codec: JsonCodec,
        });

        Ok(CastleServer { transport, state })
    }
}

impl Default for CastleServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Castle server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct CastleServer<R: RulesEngine, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<R, C>>,
}

impl<R, C> CastleServer<R, C>
where
    R: RulesEngine,
    C: Codec,
{
    /// Creates a new builder.
    pub fn builder() -> CastleServerBuilder {
        CastleServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server: background sweeps plus the accept loop. Runs
    /// until the process is terminated.
    pub async fn run(mut self) -> Result<(), CastleError> {
        tracing::info!("Castle server running");

        self.spawn_room_sweep().await;
        self.spawn_session_reaper();

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection::<R, C>(conn, state).await
                        {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }

    /// Periodically evicts idle rooms and drops their sessions.
    async fn spawn_room_sweep(&self) {
        let state = Arc::clone(&self.state);
        let (interval, ttl) = {
            let registry = self.state.registry.lock().await;
            (registry.settings().sweep_interval, registry.settings().idle_ttl)
        };

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.tick().await; // first tick completes immediately
            loop {
                tick.tick().await;
                let evicted = state
                    .registry
                    .lock()
                    .await
                    .evict_idle(Instant::now(), ttl)
                    .await;
                if !evicted.is_empty() {
                    let mut sessions = state.sessions.lock().await;
                    for code in &evicted {
                        sessions.remove_room(code);
                    }
                    tracing::info!(count = evicted.len(), "idle rooms swept");
                }
            }
        });
    }

    /// Periodically expires and reaps sessions whose players never
    /// returned. The rooms themselves forfeit independently via their
    /// own reconnection timers; this sweep only reclaims memory.
    fn spawn_session_reaper(&self) {
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let mut tick =
                tokio::time::interval(std::time::Duration::from_secs(30));
            tick.tick().await;
            loop {
                tick.tick().await;
                let mut sessions = state.sessions.lock().await;
                sessions.expire_stale();
                sessions.cleanup_expired();
            }
        });
    }
}
