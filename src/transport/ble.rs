//! Bluetooth LE transport implementation.
//!
//! This module drives a Safera Sense over GATT using `btleplug`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use btleplug::api::{
    Central, CentralEvent, Characteristic as GattCharacteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportEvent, TransportFuture};

/// Default time spent scanning for the device.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval between peripheral list polls while scanning.
pub const DEFAULT_SCAN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Configuration for the BLE transport.
#[derive(Debug, Clone)]
pub struct BleConfig {
    /// Device address (e.g., "D0:CF:5E:12:34:56").
    pub address: String,
    /// How long to scan before giving up.
    pub scan_timeout: Duration,
    /// Interval between peripheral list polls.
    pub scan_poll_interval: Duration,
}

impl BleConfig {
    /// Creates a new BLE configuration with default settings.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            scan_poll_interval: DEFAULT_SCAN_POLL_INTERVAL,
        }
    }

    /// Sets the scan timeout.
    #[must_use]
    pub const fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Sets the scan poll interval.
    #[must_use]
    pub const fn scan_poll_interval(mut self, interval: Duration) -> Self {
        self.scan_poll_interval = interval;
        self
    }
}

/// BLE transport for Safera Sense communication.
pub struct BleTransport {
    config: BleConfig,
    peripheral: Option<Peripheral>,
    characteristics: HashMap<Uuid, GattCharacteristic>,
    local_name: Option<String>,
    connected: Arc<AtomicBool>,
    event_tx: Option<mpsc::Sender<TransportEvent>>,
    tasks: Vec<JoinHandle<()>>,
}

impl BleTransport {
    /// Creates a new BLE transport with the given configuration.
    #[must_use]
    pub fn new(config: BleConfig) -> Self {
        Self {
            config,
            peripheral: None,
            characteristics: HashMap::new(),
            local_name: None,
            connected: Arc::new(AtomicBool::new(false)),
            event_tx: None,
            tasks: Vec::new(),
        }
    }

    /// Creates a new BLE transport for the given address with default settings.
    #[must_use]
    pub fn with_address(address: impl Into<String>) -> Self {
        Self::new(BleConfig::new(address))
    }

    async fn adapter() -> Result<Adapter> {
        let manager = Manager::new().await.map_err(|e| Error::TransportUnavailable {
            reason: e.to_string(),
        })?;
        manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::TransportUnavailable {
                reason: "no Bluetooth adapter found".into(),
            })
    }

    /// Scans until a peripheral with the configured address shows up.
    async fn find_peripheral(&self, adapter: &Adapter) -> Result<Peripheral> {
        adapter.start_scan(ScanFilter::default()).await?;

        let deadline = Instant::now() + self.config.scan_timeout;
        let found = loop {
            if let Some(peripheral) = self.match_peripheral(adapter).await? {
                break Some(peripheral);
            }
            if Instant::now() >= deadline {
                break None;
            }
            tokio::time::sleep(self.config.scan_poll_interval).await;
        };

        if let Err(e) = adapter.stop_scan().await {
            tracing::warn!("failed to stop scan: {}", e);
        }

        found.ok_or_else(|| Error::DeviceNotFound {
            address: self.config.address.clone(),
        })
    }

    async fn match_peripheral(&self, adapter: &Adapter) -> Result<Option<Peripheral>> {
        for peripheral in adapter.peripherals().await? {
            if peripheral
                .address()
                .to_string()
                .eq_ignore_ascii_case(&self.config.address)
            {
                return Ok(Some(peripheral));
            }
        }
        Ok(None)
    }

    fn characteristic(&self, uuid: Uuid) -> Result<(&Peripheral, &GattCharacteristic)> {
        let peripheral = self
            .peripheral
            .as_ref()
            .filter(|_| self.connected.load(Ordering::SeqCst))
            .ok_or(Error::NotConnected)?;
        let characteristic = self
            .characteristics
            .get(&uuid)
            .ok_or(Error::UnsupportedCharacteristic { uuid })?;
        Ok((peripheral, characteristic))
    }

    /// Spawns the notification forwarder and the link-loss watcher.
    async fn spawn_event_tasks(&mut self, adapter: Adapter, peripheral: &Peripheral) -> Result<()> {
        let Some(tx) = self.event_tx.clone() else {
            return Ok(());
        };

        let mut notifications = peripheral.notifications().await?;
        let notify_tx = tx.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                tracing::trace!(
                    "notification {}: {}",
                    notification.uuid,
                    hex::encode(&notification.value)
                );
                let event = TransportEvent::Notification {
                    uuid: notification.uuid,
                    data: Bytes::from(notification.value),
                };
                if notify_tx.send(event).await.is_err() {
                    tracing::debug!("notification receiver dropped");
                    return;
                }
            }
        }));

        let mut central_events = adapter.events().await?;
        let id = peripheral.id();
        let connected = Arc::clone(&self.connected);
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = central_events.next().await {
                if let CentralEvent::DeviceDisconnected(lost) = event {
                    if lost == id {
                        tracing::info!("link lost");
                        connected.store(false, Ordering::SeqCst);
                        let _ = tx.send(TransportEvent::LinkLost).await;
                        return;
                    }
                }
            }
        }));

        Ok(())
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Transport for BleTransport {
    fn connect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if self.connected.load(Ordering::SeqCst) {
                return Ok(());
            }

            tracing::info!("connecting to {}", self.config.address);

            let adapter = Self::adapter().await?;
            let peripheral = self.find_peripheral(&adapter).await?;

            peripheral.connect().await?;
            peripheral.discover_services().await?;

            self.characteristics = peripheral
                .characteristics()
                .into_iter()
                .map(|c| (c.uuid, c))
                .collect();
            tracing::debug!("discovered {} characteristics", self.characteristics.len());

            self.local_name = match peripheral.properties().await {
                Ok(props) => props.and_then(|p| p.local_name),
                Err(e) => {
                    tracing::debug!("failed to read peripheral properties: {}", e);
                    None
                }
            };

            self.abort_tasks();
            self.spawn_event_tasks(adapter, &peripheral).await?;
            self.peripheral = Some(peripheral);
            self.connected.store(true, Ordering::SeqCst);

            tracing::info!("connected to {}", self.config.address);
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.abort_tasks();
            self.connected.store(false, Ordering::SeqCst);
            self.characteristics.clear();
            if let Some(peripheral) = self.peripheral.take() {
                tracing::info!("disconnecting from {}", self.config.address);
                peripheral.disconnect().await?;
            }
            Ok(())
        })
    }

    fn read(&mut self, uuid: Uuid) -> TransportFuture<'_, Bytes> {
        Box::pin(async move {
            let (peripheral, characteristic) = self.characteristic(uuid)?;
            let data = peripheral.read(characteristic).await?;
            tracing::trace!("read {}: {}", uuid, hex::encode(&data));
            Ok(Bytes::from(data))
        })
    }

    fn write(&mut self, uuid: Uuid, data: Bytes, with_response: bool) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let (peripheral, characteristic) = self.characteristic(uuid)?;
            let write_type = if with_response {
                WriteType::WithResponse
            } else {
                WriteType::WithoutResponse
            };
            tracing::trace!("write {}: {}", uuid, hex::encode(&data));
            peripheral.write(characteristic, &data, write_type).await?;
            Ok(())
        })
    }

    fn subscribe(&mut self, uuid: Uuid) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let (peripheral, characteristic) = self.characteristic(uuid)?;
            peripheral.subscribe(characteristic).await?;
            Ok(())
        })
    }

    fn unsubscribe(&mut self, uuid: Uuid) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let (peripheral, characteristic) = self.characteristic(uuid)?;
            peripheral.unsubscribe(characteristic).await?;
            Ok(())
        })
    }

    fn set_event_sender(&mut self, tx: mpsc::Sender<TransportEvent>) {
        self.event_tx = Some(tx);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn local_name(&self) -> Option<String> {
        self.local_name.clone()
    }

    fn address(&self) -> String {
        self.config.address.clone()
    }
}

impl Drop for BleTransport {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}
