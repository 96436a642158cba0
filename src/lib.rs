//! # safera-sense
//!
//! A Rust client library for Safera Sense (Røroshetta Sense) kitchen hood
//! sensors.
//!
//! This library provides async communication with the device over Bluetooth LE.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Connection state machine with retry, backoff and per-operation timeouts
//! - Notification-driven snapshots with a polling fallback
//! - Ordered, delay-aware fan and light commands
//! - Type-safe payload decoding
//!
//! ## Quick Start
//!
//! ```no_run
//! use safera_sense::{FanIntent, FanLevel, SenseClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), safera_sense::Error> {
//!     // Connect to a Safera Sense
//!     let client = SenseClient::ble("D0:CF:5E:12:34:56");
//!     let identity = client.connect().await?;
//!
//!     println!("Connected to: {} {}", identity.manufacturer, identity.model);
//!
//!     // Read the current telemetry
//!     let snapshot = client.current_snapshot().await?;
//!     println!("Ambient: {:.1} °C", snapshot.ambient_temperature);
//!
//!     // Boost the fan
//!     client.set_fan(FanIntent::level(FanLevel::Boost)).await?;
//!
//!     // Disconnect
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - GATT table, command frames and payload decoders
//! - [`types`] - Data structures (snapshots, statistics, intents)
//! - [`transport`] - Transport implementations (Bluetooth LE)
//! - [`session`] - Connection state machine
//! - [`event`] - Notification decoding and dispatch
//! - [`commands`] - Command sequencer for device writes
//! - [`fetcher`] - Read-and-decode polling
//! - [`client`] - High-level [`SenseClient`] client

pub mod client;
pub mod commands;
pub mod error;
pub mod event;
pub mod fetcher;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{ClientConfig, SenseClient};
pub use commands::CommandSequencer;
pub use error::{DecodeError, Error, Result};
pub use event::{Event, EventFilter, NotificationDispatcher, ObserverId, Subscription};
pub use fetcher::SnapshotFetcher;
pub use protocol::{Characteristic, CommandFrame, CommandSequence};
pub use session::{Session, SessionConfig, SessionState};
pub use transport::{BleConfig, BleTransport, Transport, TransportEvent};
pub use types::{
    Bitfield, CommandIntent, DayStatistics, DcvNode, DcvReport, DeviceIdentity, EventKind,
    EventLogEntry, FanIntent, FanLevel, FanReading, LightIntent, LightLevel, LightReading,
    SensorErrors, SensorFault, SensorSnapshot, SnapshotLayout, WifiCloudStatus,
};
