//! Event system for notification handling.
//!
//! Notification frames pushed by the device are decoded here and fanned out
//! two ways: synchronously to observers registered for a characteristic,
//! and asynchronously to [`Subscription`]s over a broadcast channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::error::{DecodeError, Error, Result};
use crate::protocol::{Characteristic, decode_event_log, decode_sensor_snapshot};
use crate::session::{FrameHandler, Session};
use crate::transport::Transport;
use crate::types::{EventLogEntry, SensorSnapshot};

/// Decoded notification events.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A new telemetry snapshot.
    Snapshot(Arc<SensorSnapshot>),
    /// A batch of event log entries, in transmission order.
    EventLog(Arc<[EventLogEntry]>),
    /// A frame could not be decoded. The stream continues with the next one.
    DecodeFailed {
        characteristic: Characteristic,
        error: DecodeError,
    },
}

impl Event {
    /// Returns the characteristic the event came from.
    #[must_use]
    pub const fn characteristic(&self) -> Characteristic {
        match self {
            Self::Snapshot(_) => Characteristic::SensorData,
            Self::EventLog(_) => Characteristic::EventLog,
            Self::DecodeFailed { characteristic, .. } => *characteristic,
        }
    }
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
    filter: Option<EventFilter>,
}

impl Subscription {
    /// Receives the next event matching the subscription filter.
    ///
    /// Returns `None` once the dispatcher is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.as_ref().is_none_or(|f| f.matches(&event)) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("subscription lagged, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Subscription filter by source characteristic.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Accepted characteristics; `None` accepts all.
    pub characteristics: Option<Vec<Characteristic>>,
    /// Drop decode failures.
    pub skip_failures: bool,
}

impl EventFilter {
    /// Creates a filter for specific characteristics.
    #[must_use]
    pub const fn characteristics(characteristics: Vec<Characteristic>) -> Self {
        Self {
            characteristics: Some(characteristics),
            skip_failures: false,
        }
    }

    /// Creates a filter that only passes decoded snapshots.
    #[must_use]
    pub fn snapshots() -> Self {
        Self {
            characteristics: Some(vec![Characteristic::SensorData]),
            skip_failures: true,
        }
    }

    /// Checks if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if self.skip_failures && matches!(event, Event::DecodeFailed { .. }) {
            return false;
        }
        self.characteristics
            .as_ref()
            .is_none_or(|list| list.contains(&event.characteristic()))
    }
}

/// Callback invoked with each event for an observed characteristic.
pub type Observer = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle returned by [`NotificationDispatcher::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct Registration {
    id: ObserverId,
    characteristic: Characteristic,
    observer: Observer,
}

struct DispatcherInner {
    sender: broadcast::Sender<Event>,
    observers: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
    last_frame: Mutex<HashMap<Characteristic, Instant>>,
}

/// Decodes notification frames and dispatches the results.
#[derive(Clone)]
pub struct NotificationDispatcher {
    inner: Arc<DispatcherInner>,
}

impl NotificationDispatcher {
    /// Creates a new dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(DispatcherInner {
                sender,
                observers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                last_frame: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Registers an observer for one characteristic.
    ///
    /// Safe to call from inside an observer callback.
    pub fn observe<F>(&self, characteristic: Characteristic, observer: F) -> ObserverId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = ObserverId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers().push(Registration {
            id,
            characteristic,
            observer: Arc::new(observer),
        });
        id
    }

    /// Removes an observer. Returns false if it was not registered.
    ///
    /// Safe to call from inside an observer callback.
    pub fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.observers();
        let before = observers.len();
        observers.retain(|r| r.id != id);
        observers.len() != before
    }

    /// Number of observers registered for a characteristic.
    #[must_use]
    pub fn observer_count(&self, characteristic: Characteristic) -> usize {
        self.observers()
            .iter()
            .filter(|r| r.characteristic == characteristic)
            .count()
    }

    fn observers(&self) -> std::sync::MutexGuard<'_, Vec<Registration>> {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribes to events with an optional filter.
    #[must_use]
    pub fn subscribe(&self, filter: Option<EventFilter>) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
            filter,
        }
    }

    /// Dispatches an event to observers of its characteristic and to all
    /// subscriptions.
    pub fn dispatch(&self, event: Event) {
        let characteristic = event.characteristic();
        // Invoke a copy so callbacks may register or remove observers.
        let targets: Vec<Observer> = self
            .observers()
            .iter()
            .filter(|r| r.characteristic == characteristic)
            .map(|r| Arc::clone(&r.observer))
            .collect();
        for observer in targets {
            observer(&event);
        }

        // No receivers is fine.
        let _ = self.inner.sender.send(event);
    }

    /// Decodes one notification frame and dispatches the result.
    pub fn dispatch_frame(&self, characteristic: Characteristic, data: &[u8]) {
        tracing::trace!("{:?} frame: {}", characteristic, hex::encode(data));
        let event = match characteristic {
            Characteristic::SensorData => match decode_sensor_snapshot(data) {
                Ok(snapshot) => Event::Snapshot(Arc::new(snapshot)),
                Err(error) => {
                    tracing::warn!("skipping sensor frame: {}", error);
                    Event::DecodeFailed {
                        characteristic,
                        error,
                    }
                }
            },
            Characteristic::EventLog => Event::EventLog(decode_event_log(data).into()),
            other => {
                tracing::warn!("ignoring notification from {:?}", other);
                return;
            }
        };
        if !matches!(event, Event::DecodeFailed { .. }) {
            self.inner
                .last_frame
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(characteristic, Instant::now());
        }
        self.dispatch(event);
    }

    /// Time the last frame for a characteristic arrived.
    #[must_use]
    pub fn last_frame_at(&self, characteristic: Characteristic) -> Option<Instant> {
        self.inner
            .last_frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&characteristic)
            .copied()
    }

    /// Returns true if a decodable frame for the characteristic arrived
    /// within `window`.
    #[must_use]
    pub fn is_fresh(&self, characteristic: Characteristic, window: Duration) -> bool {
        self.last_frame_at(characteristic)
            .is_some_and(|at| at.elapsed() <= window)
    }

    /// Frame handler that feeds this dispatcher.
    #[must_use]
    pub fn frame_handler(&self, characteristic: Characteristic) -> FrameHandler {
        let dispatcher = self.clone();
        Arc::new(move |data: Bytes| dispatcher.dispatch_frame(characteristic, &data))
    }

    /// Enables notifications for a characteristic on the session and routes
    /// its frames here.
    pub async fn attach<T: Transport + 'static>(
        &self,
        session: &Session<T>,
        characteristic: Characteristic,
    ) -> Result<()> {
        if !characteristic.notifies() {
            return Err(Error::UnsupportedCharacteristic {
                uuid: characteristic.uuid(),
            });
        }
        session
            .subscribe(characteristic.uuid(), self.frame_handler(characteristic))
            .await?;
        tracing::debug!("attached to {:?} notifications", characteristic);
        Ok(())
    }

    /// Disables notifications for a characteristic.
    pub async fn detach<T: Transport + 'static>(
        &self,
        session: &Session<T>,
        characteristic: Characteristic,
    ) -> Result<()> {
        session.unsubscribe(characteristic.uuid()).await
    }

    /// Waits for an event matching the filter with timeout.
    ///
    /// Returns `None` if the timeout expires or the channel is closed.
    pub async fn wait_for(&self, filter: EventFilter, timeout: Duration) -> Option<Event> {
        let mut subscription = self.subscribe(Some(filter));
        tokio::time::timeout(timeout, subscription.recv())
            .await
            .ok()
            .flatten()
    }
}
