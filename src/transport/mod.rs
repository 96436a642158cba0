//! Transport layer for Safera Sense communication.
//!
//! This module provides the abstraction over a GATT link. The production
//! implementation talks Bluetooth LE through `btleplug`.

pub mod ble;
#[cfg(test)]
pub(crate) mod mock;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;

/// Boxed future returned by transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Unsolicited events pushed by a transport's background task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A characteristic notification.
    Notification {
        /// Characteristic that notified.
        uuid: Uuid,
        /// Raw payload.
        data: Bytes,
    },
    /// The radio link dropped without a local disconnect.
    LinkLost,
}

/// Trait for transport implementations.
///
/// Implementations are not required to serialize operations; the session
/// holds the transport behind a mutex.
pub trait Transport: Send + Sync {
    /// Connects to the device and discovers its characteristics.
    fn connect(&mut self) -> TransportFuture<'_, ()>;

    /// Disconnects from the device.
    fn disconnect(&mut self) -> TransportFuture<'_, ()>;

    /// Reads a characteristic.
    fn read(&mut self, uuid: Uuid) -> TransportFuture<'_, Bytes>;

    /// Writes a characteristic, waiting for the acknowledgement if `with_response`.
    fn write(&mut self, uuid: Uuid, data: Bytes, with_response: bool) -> TransportFuture<'_, ()>;

    /// Enables notifications for a characteristic.
    fn subscribe(&mut self, uuid: Uuid) -> TransportFuture<'_, ()>;

    /// Disables notifications for a characteristic.
    fn unsubscribe(&mut self, uuid: Uuid) -> TransportFuture<'_, ()>;

    /// Sets the channel notifications and link loss are pushed into.
    fn set_event_sender(&mut self, tx: mpsc::Sender<TransportEvent>);

    /// Returns true if the link is up.
    fn is_connected(&self) -> bool;

    /// Advertised name of the peer, if known.
    fn local_name(&self) -> Option<String>;

    /// Address of the peer.
    fn address(&self) -> String;
}

pub use ble::{BleConfig, BleTransport};
