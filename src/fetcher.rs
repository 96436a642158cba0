//! On-demand reads for polling when notifications are silent.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::protocol::{
    Characteristic, decode_day_statistics, decode_dcv_report, decode_event_log,
    decode_identity_string, decode_sensor_snapshot, decode_ssid, decode_wifi_status,
};
use crate::session::Session;
use crate::transport::Transport;
use crate::types::{
    DayStatistics, DcvReport, DeviceIdentity, EventLogEntry, SensorSnapshot, WifiCloudStatus,
};

/// Reads a characteristic and decodes it.
pub struct SnapshotFetcher<T> {
    session: Arc<Session<T>>,
}

impl<T: Transport + 'static> SnapshotFetcher<T> {
    /// Creates a new fetcher for the session.
    #[must_use]
    pub const fn new(session: Arc<Session<T>>) -> Self {
        Self { session }
    }

    async fn read(&self, characteristic: Characteristic) -> Result<Bytes> {
        self.session.read(characteristic.uuid()).await
    }

    /// Reads a characteristic the device may lack; absence yields `None`.
    ///
    /// Only characteristics marked [`Characteristic::optional`] may be absent.
    async fn read_optional(&self, characteristic: Characteristic) -> Result<Option<Bytes>> {
        match self.read(characteristic).await {
            Ok(data) => Ok(Some(data)),
            Err(Error::UnsupportedCharacteristic { .. }) if characteristic.optional() => {
                tracing::debug!("{:?} not present on this device", characteristic);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Reads the current telemetry snapshot.
    pub async fn fetch_snapshot(&self) -> Result<SensorSnapshot> {
        let data = self.read(Characteristic::SensorData).await?;
        Ok(decode_sensor_snapshot(&data)?)
    }

    /// Reads the Wi-Fi/cloud status block.
    pub async fn fetch_wifi_status(&self) -> Result<WifiCloudStatus> {
        let data = self.read(Characteristic::WifiStatus).await?;
        Ok(decode_wifi_status(&data)?)
    }

    /// Reads the event log.
    pub async fn fetch_event_log(&self) -> Result<Vec<EventLogEntry>> {
        let data = self.read(Characteristic::EventLog).await?;
        Ok(decode_event_log(&data))
    }

    /// Reads the statistics of the currently selected day.
    pub async fn read_day_statistics(&self) -> Result<DayStatistics> {
        let data = self.read(Characteristic::DayStatistics).await?;
        Ok(decode_day_statistics(&data)?)
    }

    /// Reads the DCV report, or `None` if the device has none.
    pub async fn fetch_dcv_report(&self) -> Result<Option<DcvReport>> {
        match self.read_optional(Characteristic::DcvReport).await? {
            Some(data) => Ok(Some(decode_dcv_report(&data)?)),
            None => Ok(None),
        }
    }

    async fn read_string(&self, characteristic: Characteristic) -> Result<String> {
        let data = self.read(characteristic).await?;
        Ok(decode_identity_string(&data))
    }

    /// Reads the static identity strings.
    ///
    /// Every device information characteristic is required; the SSID comes
    /// from the Wi-Fi status block.
    pub async fn fetch_identity(&self) -> Result<DeviceIdentity> {
        let wifi = self.read(Characteristic::WifiStatus).await?;

        Ok(DeviceIdentity {
            manufacturer: self.read_string(Characteristic::Manufacturer).await?,
            model: self.read_string(Characteristic::ModelNumber).await?,
            ble_name: self.session.peer_name().await.unwrap_or_default(),
            ble_address: self.session.peer_address().await,
            serial_number: self.read_string(Characteristic::SerialNumber).await?,
            hardware_revision: self.read_string(Characteristic::HardwareRevision).await?,
            firmware_revision: self.read_string(Characteristic::FirmwareRevision).await?,
            software_revision: self.read_string(Characteristic::SoftwareRevision).await?,
            wifi_ssid: decode_ssid(&wifi),
        })
    }
}
