// ABOUTME: Gateway session state machine: connection reuse, kinit, idle disconnect.
// ABOUTME: A cloneable handle; every transition happens under one lock.

use super::error::{Error, Result};
use super::idle::IdleTimer;
use super::kinit::{self, KerberosCredentials, MarkerPrompt, PromptDetector};
use crate::ssh::{Connection, Connector, GatewayCredentials};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;

/// Forced disconnect after this long without an executed command.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected { authenticated: bool },
}

/// Configuration for a gateway session.
#[derive(Clone)]
pub struct SessionConfig {
    pub credentials: GatewayCredentials,
    /// Kerberos is skipped entirely when `None`.
    pub kerberos: Option<KerberosCredentials>,
    pub idle_timeout: Duration,
    pub prompt_detector: Arc<dyn PromptDetector>,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("credentials", &self.credentials)
            .field("kerberos", &self.kerberos)
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}

impl SessionConfig {
    pub fn new(credentials: GatewayCredentials) -> Self {
        Self {
            credentials,
            kerberos: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            prompt_detector: Arc::new(MarkerPrompt::default()),
        }
    }

    pub fn kerberos(mut self, kerberos: Option<KerberosCredentials>) -> Self {
        self.kerberos = kerberos;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn prompt_detector(mut self, detector: impl PromptDetector + 'static) -> Self {
        self.prompt_detector = Arc::new(detector);
        self
    }
}

type SharedDial<C> = Shared<BoxFuture<'static, std::result::Result<Arc<C>, String>>>;

enum Phase<C> {
    Disconnected,
    Connecting(SharedDial<C>),
    Connected { conn: Arc<C>, authenticated: bool },
}

/// Current phase plus the id of the dial that produced it.
struct Slot<C> {
    phase: Phase<C>,
    generation: u64,
}

struct Inner<K: Connector> {
    connector: Arc<K>,
    credentials: Mutex<(GatewayCredentials, Option<KerberosCredentials>)>,
    idle_timeout: Duration,
    detector: Arc<dyn PromptDetector>,
    slot: Mutex<Slot<K::Connection>>,
    /// Serializes kinit runs.
    auth: tokio::sync::Mutex<()>,
    idle: IdleTimer,
}

/// Handle to the single gateway connection.
///
/// Clones share one state machine; construct it once and pass it to callers.
pub struct GatewaySession<K: Connector> {
    inner: Arc<Inner<K>>,
}

impl<K: Connector> Clone for GatewaySession<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Connector> GatewaySession<K> {
    pub fn new(connector: K, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector: Arc::new(connector),
                credentials: Mutex::new((config.credentials, config.kerberos)),
                idle_timeout: config.idle_timeout,
                detector: config.prompt_detector,
                slot: Mutex::new(Slot {
                    phase: Phase::Disconnected,
                    generation: 0,
                }),
                auth: tokio::sync::Mutex::new(()),
                idle: IdleTimer::default(),
            }),
        }
    }

    /// Replace credentials for subsequent dials and kinit runs.
    ///
    /// A live connection is left alone.
    pub fn set_credentials(
        &self,
        credentials: GatewayCredentials,
        kerberos: Option<KerberosCredentials>,
    ) {
        *self.inner.credentials.lock() = (credentials, kerberos);
    }

    pub fn gateway_host(&self) -> String {
        self.inner.credentials.lock().0.host.clone()
    }

    pub fn has_kerberos(&self) -> bool {
        self.inner.credentials.lock().1.is_some()
    }

    pub fn state(&self) -> SessionState {
        match &self.inner.slot.lock().phase {
            Phase::Disconnected => SessionState::Disconnected,
            Phase::Connecting(_) => SessionState::Connecting,
            Phase::Connected { authenticated, .. } => SessionState::Connected {
                authenticated: *authenticated,
            },
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state(), SessionState::Connected { .. })
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Connected { authenticated: true }
    }

    /// When the pending idle disconnect will fire, if one is scheduled.
    pub fn idle_deadline(&self) -> Option<Instant> {
        self.inner.idle.deadline()
    }

    /// Return the live connection, dialing the gateway if there is none.
    ///
    /// Callers arriving while a dial is in flight wait on that same dial.
    pub async fn acquire_connection(&self) -> Result<Arc<K::Connection>> {
        let (dial, generation) = {
            let mut slot = self.inner.slot.lock();
            match &slot.phase {
                Phase::Connected { conn, .. } => return Ok(Arc::clone(conn)),
                Phase::Connecting(dial) => (dial.clone(), slot.generation),
                Phase::Disconnected => {
                    slot.generation += 1;
                    let dial = self.start_dial();
                    slot.phase = Phase::Connecting(dial.clone());
                    (dial, slot.generation)
                }
            }
        };

        let outcome = dial.await;

        let stale = {
            let mut slot = self.inner.slot.lock();
            let current = slot.generation == generation;
            let connecting = matches!(slot.phase, Phase::Connecting(_));
            match outcome {
                Ok(conn) if current && connecting => {
                    slot.phase = Phase::Connected {
                        conn: Arc::clone(&conn),
                        authenticated: false,
                    };
                    drop(slot);
                    tracing::info!("gateway connected");
                    self.watch_close(Arc::clone(&conn), generation);
                    return Ok(conn);
                }
                Ok(conn) => match &slot.phase {
                    // Another waiter on the same dial already finished the transition.
                    Phase::Connected { conn: live, .. } if current => return Ok(Arc::clone(live)),
                    // Disconnected or superseded while the dial was in flight.
                    _ => conn,
                },
                Err(message) => {
                    if current && connecting {
                        slot.phase = Phase::Disconnected;
                        tracing::warn!("gateway connection failed: {}", message);
                    }
                    return Err(Error::Connection(message));
                }
            }
        };

        if let Err(e) = stale.close().await {
            tracing::debug!("closing superseded gateway connection: {}", e);
        }
        Err(Error::Connection(
            "session was disconnected while connecting".to_string(),
        ))
    }

    fn start_dial(&self) -> SharedDial<K::Connection> {
        let connector = Arc::clone(&self.inner.connector);
        let credentials = self.inner.credentials.lock().0.clone();
        tracing::debug!(
            "dialing gateway {}@{}:{}",
            credentials.username,
            credentials.host,
            credentials.port
        );
        async move {
            connector
                .connect(&credentials)
                .await
                .map(Arc::new)
                .map_err(|e| e.to_string())
        }
        .boxed()
        .shared()
    }

    fn watch_close(&self, conn: Arc<K::Connection>, generation: u64) {
        let weak: Weak<Inner<K>> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            conn.closed().await;
            drop(conn);
            if let Some(inner) = weak.upgrade() {
                GatewaySession { inner }.on_close(generation);
            }
        });
    }

    /// Transport reported the connection gone.
    fn on_close(&self, generation: u64) {
        let mut slot = self.inner.slot.lock();
        if slot.generation != generation || !matches!(slot.phase, Phase::Connected { .. }) {
            return;
        }
        slot.phase = Phase::Disconnected;
        drop(slot);
        self.inner.idle.cancel();
        tracing::info!("gateway connection closed");
    }

    /// Run kinit once per connection when Kerberos is configured.
    ///
    /// A failed kinit leaves the connection up and unauthenticated.
    pub async fn ensure_authenticated(&self) -> Result<()> {
        let Some(kerberos) = self.inner.credentials.lock().1.clone() else {
            return Ok(());
        };

        let _guard = self.inner.auth.lock().await;

        let (conn, generation) = {
            let slot = self.inner.slot.lock();
            match &slot.phase {
                Phase::Connected {
                    authenticated: true,
                    ..
                } => return Ok(()),
                Phase::Connected { conn, .. } => (Arc::clone(conn), slot.generation),
                _ => return Err(Error::NotConnected),
            }
        };

        if let Err(e) = kinit::acquire_ticket(&*conn, &kerberos, &*self.inner.detector).await {
            tracing::warn!("kinit failed: {}", e);
            return Err(e);
        }

        let mut slot = self.inner.slot.lock();
        if slot.generation != generation {
            return Err(Error::NotConnected);
        }
        match &mut slot.phase {
            Phase::Connected { authenticated, .. } => {
                *authenticated = true;
                Ok(())
            }
            _ => Err(Error::NotConnected),
        }
    }

    /// Schedule the idle disconnect one timeout from now, replacing any pending one.
    pub fn reset_idle_timer(&self) {
        let weak: Weak<Inner<K>> = Arc::downgrade(&self.inner);
        self.inner.idle.schedule(self.inner.idle_timeout, async move {
            if let Some(inner) = weak.upgrade() {
                tracing::info!("gateway idle timeout reached, disconnecting");
                GatewaySession { inner }.disconnect().await;
            }
        });
    }

    /// Close the gateway connection. Safe to call in any state.
    pub async fn disconnect(&self) {
        let previous = {
            let mut slot = self.inner.slot.lock();
            std::mem::replace(&mut slot.phase, Phase::Disconnected)
        };
        self.inner.idle.cancel();

        if let Phase::Connected { conn, .. } = previous {
            if let Err(e) = conn.close().await {
                tracing::warn!("gateway disconnect failed: {}", e);
            }
            tracing::info!("gateway disconnected");
        }
    }
}
