//! In-memory transport for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::Characteristic;
use crate::transport::{Transport, TransportEvent, TransportFuture};

/// A write seen by the mock.
#[derive(Debug, Clone)]
pub(crate) struct RecordedWrite {
    pub uuid: Uuid,
    pub data: Bytes,
    pub with_response: bool,
    pub at: Instant,
}

#[derive(Default)]
struct MockState {
    reads: HashMap<Uuid, Bytes>,
    connect_errors: VecDeque<Error>,
    connect_times: Vec<Instant>,
    disconnect_calls: usize,
    writes: Vec<RecordedWrite>,
    subscribed: Vec<Uuid>,
    unsubscribed: Vec<Uuid>,
    hang_reads: bool,
    hang_connects: bool,
    fail_unsubscribe: bool,
    connected: bool,
    event_tx: Option<mpsc::Sender<TransportEvent>>,
}

/// Transport double with shared state, so a test can keep a handle after
/// moving a clone into a session.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn with_read(self, uuid: Uuid, data: impl Into<Bytes>) -> Self {
        self.set_read(uuid, data);
        self
    }

    pub fn set_read(&self, uuid: Uuid, data: impl Into<Bytes>) {
        self.lock().reads.insert(uuid, data.into());
    }

    pub fn remove_read(&self, uuid: Uuid) {
        self.lock().reads.remove(&uuid);
    }

    /// Serves placeholder device information for any string not set yet.
    pub fn with_device_info(self) -> Self {
        {
            let mut state = self.lock();
            for characteristic in [
                Characteristic::Manufacturer,
                Characteristic::ModelNumber,
                Characteristic::SerialNumber,
                Characteristic::HardwareRevision,
                Characteristic::FirmwareRevision,
                Characteristic::SoftwareRevision,
            ] {
                state
                    .reads
                    .entry(characteristic.uuid())
                    .or_insert_with(|| Bytes::from_static(b"test"));
            }
            state
                .reads
                .entry(Characteristic::WifiStatus.uuid())
                .or_insert_with(|| Bytes::from(vec![0u8; 75]));
        }
        self
    }

    pub fn fail_next_connect(&self, err: Error) {
        self.lock().connect_errors.push_back(err);
    }

    pub fn hang_reads(&self, hang: bool) {
        self.lock().hang_reads = hang;
    }

    pub fn hang_connects(&self, hang: bool) {
        self.lock().hang_connects = hang;
    }

    pub fn fail_unsubscribe(&self, fail: bool) {
        self.lock().fail_unsubscribe = fail;
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.lock().writes.clone()
    }

    pub fn connect_times(&self) -> Vec<Instant> {
        self.lock().connect_times.clone()
    }

    pub fn disconnect_calls(&self) -> usize {
        self.lock().disconnect_calls
    }

    pub fn subscribed(&self) -> Vec<Uuid> {
        self.lock().subscribed.clone()
    }

    pub fn unsubscribed(&self) -> Vec<Uuid> {
        self.lock().unsubscribed.clone()
    }

    /// Pushes a notification as the radio would.
    pub async fn notify(&self, uuid: Uuid, data: impl Into<Bytes>) {
        let tx = self.lock().event_tx.clone();
        if let Some(tx) = tx {
            let _ = tx
                .send(TransportEvent::Notification {
                    uuid,
                    data: data.into(),
                })
                .await;
        }
    }

    /// Drops the link without a local disconnect.
    pub async fn drop_link(&self) {
        let tx = {
            let mut state = self.lock();
            state.connected = false;
            state.event_tx.clone()
        };
        if let Some(tx) = tx {
            let _ = tx.send(TransportEvent::LinkLost).await;
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.lock().connected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let hang = {
                let mut state = self.lock();
                state.connect_times.push(Instant::now());
                if let Some(err) = state.connect_errors.pop_front() {
                    return Err(err);
                }
                state.hang_connects
            };
            if hang {
                futures::future::pending::<()>().await;
            }
            self.lock().connected = true;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.lock();
            state.disconnect_calls += 1;
            state.connected = false;
            Ok(())
        })
    }

    fn read(&mut self, uuid: Uuid) -> TransportFuture<'_, Bytes> {
        Box::pin(async move {
            self.ensure_connected()?;
            let (hang, data) = {
                let state = self.lock();
                (state.hang_reads, state.reads.get(&uuid).cloned())
            };
            if hang {
                futures::future::pending::<()>().await;
            }
            data.ok_or(Error::UnsupportedCharacteristic { uuid })
        })
    }

    fn write(&mut self, uuid: Uuid, data: Bytes, with_response: bool) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.ensure_connected()?;
            self.lock().writes.push(RecordedWrite {
                uuid,
                data,
                with_response,
                at: Instant::now(),
            });
            Ok(())
        })
    }

    fn subscribe(&mut self, uuid: Uuid) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.ensure_connected()?;
            self.lock().subscribed.push(uuid);
            Ok(())
        })
    }

    fn unsubscribe(&mut self, uuid: Uuid) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.lock();
            if state.fail_unsubscribe {
                return Err(Error::Transport {
                    message: "unsubscribe rejected".into(),
                });
            }
            state.unsubscribed.push(uuid);
            Ok(())
        })
    }

    fn set_event_sender(&mut self, tx: mpsc::Sender<TransportEvent>) {
        self.lock().event_tx = Some(tx);
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn local_name(&self) -> Option<String> {
        Some("Safera Sense".into())
    }

    fn address(&self) -> String {
        "D0:CF:5E:00:00:01".into()
    }
}
