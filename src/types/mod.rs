//! Data types for Safera Sense entities.
//!
//! This module contains the core data structures used throughout the library:
//! - Sensor snapshots and fault tables
//! - Device identity and Wi-Fi/cloud status
//! - Event log, day statistics and DCV reports
//! - Fan/light levels and command intents

pub mod bits;
pub mod control;
pub mod device;
pub mod sensor;
pub mod stats;

pub use bits::Bitfield;
pub use control::{CommandIntent, FanIntent, FanLevel, LightIntent, LightLevel};
pub use device::{DeviceIdentity, WifiCloudStatus};
pub use sensor::{
    FanReading, LightReading, SensorErrors, SensorFault, SensorSnapshot, SnapshotLayout,
};
pub use stats::{DayStatistics, DcvNode, DcvReport, EventKind, EventLogEntry};
