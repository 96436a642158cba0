//! Connection state machine for one Safera Sense link.
//!
//! A [`Session`] owns the transport behind a mutex so that every GATT
//! operation on the link runs strictly one after the other. Independent
//! sessions share nothing and run in parallel.
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Subscribing -> Active
//!       ^                                                     |
//!       +------------------- link loss / disconnect ----------+
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportEvent, TransportFuture};

/// Default timeout for a single GATT operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for one connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default number of connection attempts.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;

/// Default delay before the first connection retry.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(250);

/// Default ceiling for the retry delay.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(4);

/// Default capacity of the transport event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No link.
    Disconnected,
    /// Scanning and connecting.
    Connecting,
    /// Link up, characteristics discovered.
    Connected,
    /// Restoring notification subscriptions.
    Subscribing,
    /// Ready for reads, writes and subscriptions.
    Active,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Subscribing => "subscribing",
            Self::Active => "active",
        };
        f.write_str(name)
    }
}

/// Session timing and retry configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Timeout applied to reads, writes and subscription changes.
    pub operation_timeout: Duration,
    /// Timeout applied to each connection attempt.
    pub connect_timeout: Duration,
    /// Maximum number of connection attempts.
    pub connect_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub backoff_base: Duration,
    /// Ceiling for the retry delay.
    pub backoff_max: Duration,
    /// Capacity of the transport event channel.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-operation timeout.
    #[must_use]
    pub const fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Sets the per-attempt connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the maximum number of connection attempts (at least one is made).
    #[must_use]
    pub const fn connect_attempts(mut self, attempts: u32) -> Self {
        self.connect_attempts = attempts;
        self
    }

    /// Sets the backoff base and ceiling.
    #[must_use]
    pub const fn backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    /// Sets the transport event channel capacity.
    #[must_use]
    pub const fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Delay after the given failed attempt (1-based).
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }
}

/// Callback invoked with each raw notification payload.
pub type FrameHandler = Arc<dyn Fn(Bytes) + Send + Sync>;

type HandlerMap = Arc<RwLock<HashMap<Uuid, FrameHandler>>>;

/// One GATT link and its lifecycle.
pub struct Session<T> {
    transport: Arc<Mutex<T>>,
    config: SessionConfig,
    state: Arc<watch::Sender<SessionState>>,
    handlers: HandlerMap,
    pump: std::sync::Mutex<Option<JoinHandle<()>>>,
    connect_lock: Mutex<()>,
}

impl<T: Transport + 'static> Session<T> {
    /// Creates a disconnected session over the given transport.
    pub fn new(transport: T, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            transport: Arc::new(Mutex::new(transport)),
            config,
            state: Arc::new(state),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            pump: std::sync::Mutex::new(None),
            connect_lock: Mutex::new(()),
        }
    }

    /// Returns the session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Returns a receiver that observes state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Returns true if the session is ready for operations.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    fn set_state(&self, next: SessionState) {
        set_state(&self.state, next);
    }

    /// Connects and brings the session to `Active`.
    ///
    /// Idempotent while the session is already connected. Transient
    /// transport errors are retried with exponential backoff; a missing
    /// device is not. A [`disconnect`](Self::disconnect) issued while this
    /// runs makes it fail with `NotConnected` and leaves the session
    /// `Disconnected`.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.connect_lock.lock().await;
        if matches!(
            self.state(),
            SessionState::Connected | SessionState::Active
        ) {
            return Ok(());
        }

        self.set_state(SessionState::Connecting);
        let mut state_rx = self.state.subscribe();
        let (event_tx, event_rx) = mpsc::channel(self.config.event_capacity.max(1));
        let connected = tokio::select! {
            biased;
            _ = state_rx.wait_for(|s| *s == SessionState::Disconnected) => Err(Error::NotConnected),
            result = self.connect_with_retry(&event_tx) => result,
        };
        if let Err(e) = connected {
            self.set_state(SessionState::Disconnected);
            return Err(e);
        }
        self.advance(SessionState::Connected)?;
        self.advance(SessionState::Subscribing)?;

        self.start_pump(event_rx);
        tokio::select! {
            biased;
            _ = state_rx.wait_for(|s| *s == SessionState::Disconnected) => {}
            () = self.restore_subscriptions() => {}
        }
        if let Err(e) = self.advance(SessionState::Active) {
            self.stop_pump();
            return Err(e);
        }

        tracing::info!("session active");
        Ok(())
    }

    /// Moves a connecting session forward unless it was torn down meanwhile.
    fn advance(&self, next: SessionState) -> Result<()> {
        let mut previous = None;
        self.state.send_if_modified(|state| {
            if *state == SessionState::Disconnected {
                return false;
            }
            previous = Some(*state);
            *state = next;
            true
        });
        match previous {
            Some(previous) => {
                if previous != next {
                    tracing::debug!("session state: {} -> {}", previous, next);
                }
                Ok(())
            }
            None => {
                tracing::debug!("connect abandoned before {}", next);
                Err(Error::NotConnected)
            }
        }
    }

    async fn connect_with_retry(&self, event_tx: &mpsc::Sender<TransportEvent>) -> Result<()> {
        let attempts = self.config.connect_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = {
                let mut transport = self.transport.lock().await;
                transport.set_event_sender(event_tx.clone());
                tokio::time::timeout(self.config.connect_timeout, transport.connect())
                    .await
                    .unwrap_or_else(|_| Err(Error::timeout(self.config.connect_timeout)))
            };

            match outcome {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = self.config.backoff_delay(attempt);
                    tracing::warn!(
                        "connect attempt {}/{} failed: {}; retrying in {:?}",
                        attempt,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!("connect failed after {} attempt(s): {}", attempt, e);
                    return Err(e);
                }
            }
        }
    }

    /// Spawns the task that routes transport events to frame handlers.
    fn start_pump(&self, mut event_rx: mpsc::Receiver<TransportEvent>) {
        let handlers = Arc::clone(&self.handlers);
        let state = Arc::clone(&self.state);

        let task = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                match event {
                    TransportEvent::Notification { uuid, data } => {
                        let handler = handlers
                            .read()
                            .unwrap_or_else(PoisonError::into_inner)
                            .get(&uuid)
                            .cloned();
                        match handler {
                            Some(handler) => handler(data),
                            None => tracing::trace!("no handler for notification on {}", uuid),
                        }
                    }
                    TransportEvent::LinkLost => {
                        tracing::warn!("radio link lost");
                        set_state(&state, SessionState::Disconnected);
                    }
                }
            }
        });

        let previous = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn stop_pump(&self) {
        if let Some(pump) = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pump.abort();
        }
    }

    /// Re-enables notifications for handlers that survived a link loss.
    async fn restore_subscriptions(&self) {
        let uuids = self.handler_uuids();
        if uuids.is_empty() {
            return;
        }
        let mut transport = self.transport.lock().await;
        for uuid in uuids {
            let result =
                tokio::time::timeout(self.config.operation_timeout, transport.subscribe(uuid))
                    .await
                    .unwrap_or_else(|_| Err(Error::timeout(self.config.operation_timeout)));
            if let Err(e) = result {
                tracing::warn!("failed to restore subscription to {}: {}", uuid, e);
            }
        }
    }

    fn handler_uuids(&self) -> Vec<Uuid> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// Runs one operation on the link.
    ///
    /// Fails with `NotConnected` as soon as the session leaves `Active`, and
    /// with `Timeout` if the operation does not finish in time.
    async fn run<R, F>(&self, timeout: Duration, op: F) -> Result<R>
    where
        F: for<'a> FnOnce(&'a mut T) -> TransportFuture<'a, R> + Send,
    {
        if !self.is_active() {
            return Err(Error::NotConnected);
        }

        let mut state_rx = self.state.subscribe();
        let transport = &self.transport;
        let work = async move {
            let mut transport = transport.lock().await;
            if !transport.is_connected() {
                return Err(Error::NotConnected);
            }
            op(&mut *transport).await
        };

        let result = tokio::select! {
            biased;
            _ = state_rx.wait_for(|s| *s == SessionState::Disconnected) => Err(Error::NotConnected),
            outcome = tokio::time::timeout(timeout, work) => {
                outcome.unwrap_or_else(|_| Err(Error::timeout(timeout)))
            }
        };

        if matches!(result, Err(Error::NotConnected)) {
            self.set_state(SessionState::Disconnected);
        }
        result
    }

    /// Reads a characteristic.
    pub async fn read(&self, uuid: Uuid) -> Result<Bytes> {
        self.read_with_timeout(uuid, self.config.operation_timeout)
            .await
    }

    /// Reads a characteristic with an explicit timeout.
    pub async fn read_with_timeout(&self, uuid: Uuid, timeout: Duration) -> Result<Bytes> {
        self.run(timeout, move |transport| transport.read(uuid))
            .await
    }

    /// Writes a characteristic, waiting for the acknowledgement if `ack`.
    pub async fn write(&self, uuid: Uuid, data: Bytes, ack: bool) -> Result<()> {
        self.write_with_timeout(uuid, data, ack, self.config.operation_timeout)
            .await
    }

    /// Writes a characteristic with an explicit timeout.
    pub async fn write_with_timeout(
        &self,
        uuid: Uuid,
        data: Bytes,
        ack: bool,
        timeout: Duration,
    ) -> Result<()> {
        self.run(timeout, move |transport| transport.write(uuid, data, ack))
            .await
    }

    /// Enables notifications and routes each frame to `handler`.
    ///
    /// Replaces any handler already registered for the characteristic.
    pub async fn subscribe(&self, uuid: Uuid, handler: FrameHandler) -> Result<()> {
        let previous = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(uuid, handler);

        let result = self
            .run(self.config.operation_timeout, move |transport| {
                transport.subscribe(uuid)
            })
            .await;

        if result.is_err() {
            let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
            match previous {
                Some(previous) => handlers.insert(uuid, previous),
                None => handlers.remove(&uuid),
            };
        }
        result
    }

    /// Disables notifications for a characteristic and drops its handler.
    pub async fn unsubscribe(&self, uuid: Uuid) -> Result<()> {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&uuid);
        self.run(self.config.operation_timeout, move |transport| {
            transport.unsubscribe(uuid)
        })
        .await
    }

    /// Returns true if a handler is registered for the characteristic.
    #[must_use]
    pub fn is_subscribed(&self, uuid: Uuid) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&uuid)
    }

    /// Advertised name of the peer, if known.
    pub async fn peer_name(&self) -> Option<String> {
        self.transport.lock().await.local_name()
    }

    /// Address of the peer.
    pub async fn peer_address(&self) -> String {
        self.transport.lock().await.address()
    }

    /// Tears the session down.
    ///
    /// In-flight operations fail with `NotConnected`. Subscriptions are
    /// removed best-effort; failures are logged, never returned. The state
    /// is always `Disconnected` afterwards.
    pub async fn disconnect(&self) {
        let previous = self.state.send_replace(SessionState::Disconnected);
        if previous != SessionState::Disconnected {
            tracing::debug!("session state: {} -> disconnected", previous);
        }

        self.stop_pump();

        let uuids: Vec<Uuid> = {
            let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
            let uuids = handlers.keys().copied().collect();
            handlers.clear();
            uuids
        };

        let timeout = self.config.operation_timeout;
        let teardown = async {
            let mut transport = self.transport.lock().await;
            if transport.is_connected() {
                for uuid in uuids {
                    if let Err(e) = transport.unsubscribe(uuid).await {
                        tracing::warn!("failed to unsubscribe from {}: {}", uuid, e);
                    }
                }
            }
            if let Err(e) = transport.disconnect().await {
                tracing::warn!("transport disconnect failed: {}", e);
            }
        };
        if tokio::time::timeout(timeout, teardown).await.is_err() {
            tracing::warn!("teardown timed out after {:?}", timeout);
        }

        if previous != SessionState::Disconnected {
            tracing::info!("session disconnected");
        }
    }
}

impl<T> Drop for Session<T> {
    fn drop(&mut self) {
        if let Some(pump) = self
            .pump
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pump.abort();
        }
    }
}

fn set_state(state: &watch::Sender<SessionState>, next: SessionState) {
    let previous = state.send_replace(next);
    if previous != next {
        tracing::debug!("session state: {} -> {}", previous, next);
    }
}
