//! Main [`SenseClient`] implementation.
//!
//! This module provides the high-level [`SenseClient`] that combines the
//! session, notification dispatch, command sequencing and polling into a
//! unified interface.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{Mutex, watch};

use crate::commands::{CommandSequencer, DEFAULT_INTER_FRAME_DELAY};
use crate::error::{Error, Result};
use crate::event::{Event, EventFilter, NotificationDispatcher, ObserverId, Subscription};
use crate::fetcher::SnapshotFetcher;
use crate::protocol::{Characteristic, SELECT_DAY_STATISTICS_OPCODE};
use crate::session::{Session, SessionConfig, SessionState};
use crate::transport::{BleConfig, BleTransport, Transport};
use crate::types::{
    DayStatistics, DcvReport, DeviceIdentity, EventLogEntry, FanIntent, LightIntent,
    SensorSnapshot, WifiCloudStatus,
};

/// Default window in which a notified snapshot counts as current.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(60);

/// Default wait between selecting a statistics day and reading it.
pub const DEFAULT_STATS_SELECT_DELAY: Duration = Duration::from_millis(200);

/// Default capacity of the event broadcast channel.
pub const DEFAULT_DISPATCHER_CAPACITY: usize = 64;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Session timing and retry settings.
    pub session: SessionConfig,
    /// Age after which a notified snapshot is replaced by a poll.
    pub freshness_window: Duration,
    /// Minimum delay between dependent command frames.
    pub inter_frame_delay: Duration,
    /// Wait between selecting a statistics day and reading it.
    pub stats_select_delay: Duration,
    /// Opcode of the statistics day selection command.
    pub stats_select_opcode: u32,
    /// Capacity of the event broadcast channel.
    pub dispatcher_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            inter_frame_delay: DEFAULT_INTER_FRAME_DELAY,
            stats_select_delay: DEFAULT_STATS_SELECT_DELAY,
            stats_select_opcode: SELECT_DAY_STATISTICS_OPCODE,
            dispatcher_capacity: DEFAULT_DISPATCHER_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session configuration.
    #[must_use]
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Sets the freshness window.
    #[must_use]
    pub const fn freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    /// Sets the minimum inter-frame delay.
    #[must_use]
    pub const fn inter_frame_delay(mut self, delay: Duration) -> Self {
        self.inter_frame_delay = delay;
        self
    }

    /// Sets the statistics selection delay.
    #[must_use]
    pub const fn stats_select_delay(mut self, delay: Duration) -> Self {
        self.stats_select_delay = delay;
        self
    }

    /// Sets the statistics selection opcode.
    #[must_use]
    pub const fn stats_select_opcode(mut self, opcode: u32) -> Self {
        self.stats_select_opcode = opcode;
        self
    }

    /// Sets the event broadcast capacity.
    #[must_use]
    pub const fn dispatcher_capacity(mut self, capacity: usize) -> Self {
        self.dispatcher_capacity = capacity;
        self
    }
}

/// Client for communicating with a Safera Sense device.
pub struct SenseClient<T = BleTransport> {
    session: Arc<Session<T>>,
    dispatcher: NotificationDispatcher,
    commands: CommandSequencer<T>,
    fetcher: SnapshotFetcher<T>,
    config: ClientConfig,

    // Internal state
    identity: Mutex<Option<DeviceIdentity>>,
    latest: Arc<RwLock<Option<Arc<SensorSnapshot>>>>,
    observers: std::sync::Mutex<HashMap<ObserverId, Characteristic>>,
    stats_lock: Mutex<()>,
}

impl SenseClient<BleTransport> {
    /// Creates a new client for a Bluetooth address.
    ///
    /// # Arguments
    ///
    /// * `address` - Device address (e.g., "D0:CF:5E:12:34:56")
    ///
    /// # Returns
    ///
    /// A new client (not yet connected).
    #[must_use]
    pub fn ble(address: impl Into<String>) -> Self {
        Self::with_config(BleConfig::new(address), ClientConfig::default())
    }

    /// Creates a new client with custom transport and client configuration.
    #[must_use]
    pub fn with_config(ble: BleConfig, config: ClientConfig) -> Self {
        Self::new(BleTransport::new(ble), config)
    }
}

impl<T: Transport + 'static> SenseClient<T> {
    /// Creates a new client over the given transport.
    #[must_use]
    pub fn new(transport: T, config: ClientConfig) -> Self {
        let session = Arc::new(Session::new(transport, config.session.clone()));
        let dispatcher = NotificationDispatcher::new(config.dispatcher_capacity);

        let mut commands = CommandSequencer::new(Arc::clone(&session));
        commands.set_inter_frame_delay(config.inter_frame_delay);
        let fetcher = SnapshotFetcher::new(Arc::clone(&session));

        // Keep the most recent notified snapshot.
        let latest = Arc::new(RwLock::new(None));
        let cache = Arc::clone(&latest);
        dispatcher.observe(Characteristic::SensorData, move |event| {
            if let Event::Snapshot(snapshot) = event {
                *cache.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(snapshot));
            }
        });

        Self {
            session,
            dispatcher,
            commands,
            fetcher,
            config,
            identity: Mutex::new(None),
            latest,
            observers: std::sync::Mutex::new(HashMap::new()),
            stats_lock: Mutex::new(()),
        }
    }

    /// Connects to the device and reads its identity.
    ///
    /// This will:
    /// 1. Connect the session (with retry and backoff)
    /// 2. Restore notification subscriptions from a previous link
    /// 3. Read and cache the device identity
    pub async fn connect(&self) -> Result<DeviceIdentity> {
        self.session.connect().await?;

        let identity = self.fetcher.fetch_identity().await?;
        tracing::info!(
            "connected to {} {} ({})",
            identity.manufacturer,
            identity.model,
            identity.ble_address
        );
        *self.identity.lock().await = Some(identity.clone());
        Ok(identity)
    }

    /// Disconnects from the device.
    ///
    /// Never fails; teardown problems are logged.
    pub async fn disconnect(&self) {
        self.session.disconnect().await;
        self.identity.lock().await.take();
        self.latest
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let ids: Vec<ObserverId> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            self.dispatcher.remove(id);
        }
    }

    /// Returns the current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Returns a receiver that observes session state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.session.watch_state()
    }

    /// Returns true if connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_active()
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the underlying session.
    #[must_use]
    pub const fn session(&self) -> &Arc<Session<T>> {
        &self.session
    }

    /// Returns the command sequencer for direct command access.
    #[must_use]
    pub const fn commands(&self) -> &CommandSequencer<T> {
        &self.commands
    }

    /// Subscribes to decoded notification events.
    #[must_use]
    pub fn events(&self, filter: Option<EventFilter>) -> Subscription {
        self.dispatcher.subscribe(filter)
    }

    // ==================== Identity and Telemetry ====================

    /// Returns the device identity, reading it once per session.
    pub async fn fetch_identity(&self) -> Result<DeviceIdentity> {
        let mut cached = self.identity.lock().await;
        if let Some(identity) = cached.as_ref() {
            return Ok(identity.clone());
        }
        let identity = self.fetcher.fetch_identity().await?;
        *cached = Some(identity.clone());
        Ok(identity)
    }

    /// Reads the current snapshot directly from the device.
    pub async fn fetch_snapshot(&self) -> Result<Arc<SensorSnapshot>> {
        let snapshot = Arc::new(self.fetcher.fetch_snapshot().await?);
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Returns the last snapshot seen, without touching the device.
    #[must_use]
    pub fn latest_snapshot(&self) -> Option<Arc<SensorSnapshot>> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the notified snapshot while it is fresh, otherwise polls.
    pub async fn current_snapshot(&self) -> Result<Arc<SensorSnapshot>> {
        if self
            .dispatcher
            .is_fresh(Characteristic::SensorData, self.config.freshness_window)
        {
            if let Some(snapshot) = self.latest_snapshot() {
                return Ok(snapshot);
            }
        }
        tracing::debug!("no fresh notification, polling snapshot");
        self.fetch_snapshot().await
    }

    /// Calls `on_snapshot` with every notified snapshot.
    ///
    /// Enables sensor notifications on first use.
    pub async fn subscribe<F>(&self, on_snapshot: F) -> Result<ObserverId>
    where
        F: Fn(&SensorSnapshot) + Send + Sync + 'static,
    {
        self.add_observer(Characteristic::SensorData, move |event| {
            if let Event::Snapshot(snapshot) = event {
                on_snapshot(snapshot.as_ref());
            }
        })
        .await
    }

    /// Calls `on_entries` with every notified event log batch.
    pub async fn subscribe_event_log<F>(&self, on_entries: F) -> Result<ObserverId>
    where
        F: Fn(&[EventLogEntry]) + Send + Sync + 'static,
    {
        self.add_observer(Characteristic::EventLog, move |event| {
            if let Event::EventLog(entries) = event {
                on_entries(entries.as_ref());
            }
        })
        .await
    }

    async fn add_observer<F>(&self, characteristic: Characteristic, observer: F) -> Result<ObserverId>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        if !self.session.is_subscribed(characteristic.uuid()) {
            self.dispatcher.attach(&self.session, characteristic).await?;
        }
        let id = self.dispatcher.observe(characteristic, observer);
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, characteristic);
        Ok(id)
    }

    /// Removes an observer added by [`subscribe`](Self::subscribe) or
    /// [`subscribe_event_log`](Self::subscribe_event_log).
    ///
    /// Notifications are disabled once the last observer of a
    /// characteristic is gone.
    pub async fn unsubscribe(&self, id: ObserverId) -> Result<()> {
        let (characteristic, remaining) = {
            let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(characteristic) = observers.remove(&id) else {
                return Ok(());
            };
            let remaining = observers.values().filter(|c| **c == characteristic).count();
            (characteristic, remaining)
        };
        self.dispatcher.remove(id);

        if remaining == 0 {
            match self.dispatcher.detach(&self.session, characteristic).await {
                Ok(()) | Err(Error::NotConnected) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    // ==================== Control ====================

    /// Sets the fan.
    pub async fn set_fan(&self, intent: FanIntent) -> Result<()> {
        self.commands.set_fan(intent).await
    }

    /// Sets the light.
    pub async fn set_light(&self, intent: LightIntent) -> Result<()> {
        self.commands.set_light(intent).await
    }

    /// Sends an arbitrary device command.
    pub async fn send_command(&self, opcode: u32, param: u32) -> Result<()> {
        self.commands.send_device_command(opcode, param).await
    }

    // ==================== Status and History ====================

    /// Reads the Wi-Fi/cloud status block.
    pub async fn fetch_wifi_status(&self) -> Result<WifiCloudStatus> {
        self.fetcher.fetch_wifi_status().await
    }

    /// Reads the event log.
    pub async fn fetch_event_log(&self) -> Result<Vec<EventLogEntry>> {
        self.fetcher.fetch_event_log().await
    }

    /// Selects a day, waits for the device to switch, and reads its statistics.
    pub async fn fetch_day_statistics(&self, day: u16) -> Result<DayStatistics> {
        let _selection = self.stats_lock.lock().await;
        self.commands
            .select_day(self.config.stats_select_opcode, day)
            .await?;
        tokio::time::sleep(self.config.stats_select_delay).await;
        self.fetcher.read_day_statistics().await
    }

    /// Reads the DCV report, or `None` if the device has none.
    pub async fn fetch_dcv_report(&self) -> Result<Option<DcvReport>> {
        self.fetcher.fetch_dcv_report().await
    }
}
