//! GATT service and characteristic identifiers.
//!
//! The vendor characteristics share the base UUID
//! `xxxxxxxx-1212-efde-1523-785fef13d123`; device information uses the
//! standard Bluetooth SIG 16-bit identifiers.

use uuid::Uuid;

/// Standard Bluetooth device information service.
pub const DEVICE_INFO_SERVICE: Uuid = Uuid::from_u128(0x0000_180a_0000_1000_8000_0080_5f9b_34fb);

/// Vendor main service.
pub const MAIN_SERVICE: Uuid = Uuid::from_u128(0x0000_f00d_1212_efde_1523_785f_ef13_d123);

/// Minimum length of a sensor snapshot in the current layout.
pub const SENSOR_SNAPSHOT_MIN_LEN: usize = 54;

/// Minimum length of the Wi-Fi/cloud status block.
pub const WIFI_STATUS_MIN_LEN: usize = 75;

/// Length of the event log count prefix.
pub const EVENT_LOG_HEADER_LEN: usize = 2;

/// Length of one event log record.
pub const EVENT_LOG_RECORD_LEN: usize = 5;

/// Minimum length of a day statistics record.
pub const DAY_STATISTICS_MIN_LEN: usize = 16;

/// Length of the DCV report header.
pub const DCV_HEADER_LEN: usize = 4;

/// Length of one DCV node record.
pub const DCV_RECORD_LEN: usize = 15;

/// Length of every command pipe frame.
pub const COMMAND_FRAME_LEN: usize = 8;

/// Characteristics known to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    /// Telemetry snapshot (notify + read).
    SensorData,
    /// Wi-Fi and cloud status block (read).
    WifiStatus,
    /// Length-prefixed event log (read + notify).
    EventLog,
    /// Statistics for the currently selected day (read).
    DayStatistics,
    /// Distributed control/vent report (read, optional).
    DcvReport,
    /// Command pipe (write without response).
    Command,
    /// Model number string.
    ModelNumber,
    /// Manufacturer name string.
    Manufacturer,
    /// Serial number string.
    SerialNumber,
    /// Hardware revision string.
    HardwareRevision,
    /// Firmware revision string.
    FirmwareRevision,
    /// Software revision string.
    SoftwareRevision,
}

impl Characteristic {
    /// All known characteristics.
    pub const ALL: [Self; 12] = [
        Self::SensorData,
        Self::WifiStatus,
        Self::EventLog,
        Self::DayStatistics,
        Self::DcvReport,
        Self::Command,
        Self::ModelNumber,
        Self::Manufacturer,
        Self::SerialNumber,
        Self::HardwareRevision,
        Self::FirmwareRevision,
        Self::SoftwareRevision,
    ];

    /// Returns the 128-bit UUID of this characteristic.
    #[must_use]
    pub const fn uuid(self) -> Uuid {
        match self {
            Self::SensorData => vendor_uuid(0xbeef),
            Self::WifiStatus => vendor_uuid(0xabd1),
            Self::EventLog => vendor_uuid(0xabd2),
            Self::DayStatistics => vendor_uuid(0xabd3),
            Self::DcvReport => vendor_uuid(0xabba),
            Self::Command => vendor_uuid(0xbabe),
            Self::ModelNumber => sig_uuid(0x2a24),
            Self::Manufacturer => sig_uuid(0x2a29),
            Self::SerialNumber => sig_uuid(0x2a25),
            Self::HardwareRevision => sig_uuid(0x2a27),
            Self::FirmwareRevision => sig_uuid(0x2a26),
            Self::SoftwareRevision => sig_uuid(0x2a28),
        }
    }

    /// Looks up a characteristic by UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.uuid() == uuid)
    }

    /// Returns true if the device pushes notifications for this characteristic.
    #[must_use]
    pub const fn notifies(self) -> bool {
        matches!(self, Self::SensorData | Self::EventLog)
    }

    /// Returns true if the characteristic is readable.
    #[must_use]
    pub const fn readable(self) -> bool {
        !matches!(self, Self::Command)
    }

    /// Returns true if a device may legitimately lack this characteristic.
    #[must_use]
    pub const fn optional(self) -> bool {
        matches!(self, Self::DcvReport)
    }

    /// Minimum decodable payload length.
    #[must_use]
    pub const fn min_len(self) -> usize {
        match self {
            Self::SensorData => SENSOR_SNAPSHOT_MIN_LEN,
            Self::WifiStatus => WIFI_STATUS_MIN_LEN,
            Self::EventLog => EVENT_LOG_HEADER_LEN,
            Self::DayStatistics => DAY_STATISTICS_MIN_LEN,
            Self::DcvReport => DCV_HEADER_LEN,
            Self::Command => COMMAND_FRAME_LEN,
            Self::ModelNumber
            | Self::Manufacturer
            | Self::SerialNumber
            | Self::HardwareRevision
            | Self::FirmwareRevision
            | Self::SoftwareRevision => 0,
        }
    }
}

impl From<Characteristic> for Uuid {
    fn from(characteristic: Characteristic) -> Self {
        characteristic.uuid()
    }
}

/// Builds a vendor UUID on the `-1212-efde-1523-785fef13d123` base.
const fn vendor_uuid(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_1212_efde_1523_785f_ef13_d123)
}

/// Builds a Bluetooth SIG UUID from its 16-bit alias.
const fn sig_uuid(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_0080_5f9b_34fb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_uuids() {
        assert_eq!(
            Characteristic::SensorData.uuid().to_string(),
            "0000beef-1212-efde-1523-785fef13d123"
        );
        assert_eq!(
            Characteristic::Command.uuid().to_string(),
            "0000babe-1212-efde-1523-785fef13d123"
        );
        assert_eq!(
            MAIN_SERVICE.to_string(),
            "0000f00d-1212-efde-1523-785fef13d123"
        );
    }

    #[test]
    fn test_sig_uuids() {
        assert_eq!(
            Characteristic::ModelNumber.uuid().to_string(),
            "00002a24-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            Characteristic::SoftwareRevision.uuid().to_string(),
            "00002a28-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            DEVICE_INFO_SERVICE.to_string(),
            "0000180a-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_from_uuid_round_trip() {
        for characteristic in Characteristic::ALL {
            assert_eq!(
                Characteristic::from_uuid(characteristic.uuid()),
                Some(characteristic)
            );
        }
        assert_eq!(Characteristic::from_uuid(Uuid::nil()), None);
    }

    #[test]
    fn test_properties() {
        assert!(Characteristic::SensorData.notifies());
        assert!(Characteristic::EventLog.notifies());
        assert!(!Characteristic::WifiStatus.notifies());
        assert!(!Characteristic::Command.readable());
        assert!(Characteristic::DcvReport.optional());
        assert_eq!(Characteristic::SensorData.min_len(), 54);
    }
}
