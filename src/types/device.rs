//! Device identity and Wi-Fi/cloud status types.

use std::net::Ipv4Addr;

/// Static device information, read once per session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Manufacturer name, e.g. "Safera Oy".
    pub manufacturer: String,
    /// Model string.
    pub model: String,
    /// Advertised Bluetooth name.
    pub ble_name: String,
    /// Bluetooth address.
    pub ble_address: String,
    /// Serial number.
    pub serial_number: String,
    /// Hardware revision.
    pub hardware_revision: String,
    /// Firmware revision.
    pub firmware_revision: String,
    /// Software revision.
    pub software_revision: String,
    /// SSID of the Wi-Fi network the device is joined to.
    pub wifi_ssid: String,
}

/// Wi-Fi and cloud connection status block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCloudStatus {
    /// SSID of the joined network.
    pub ssid: String,
    /// Signal strength in dBm.
    pub rssi: i8,
    /// Connection manager status code.
    pub manager_status: u8,
    /// Wi-Fi status code.
    pub wifi_status: u8,
    /// Cloud status code.
    pub cloud_status: u8,
    /// Status of the last cloud command.
    pub last_command_status: u8,
    /// Timestamp of the last cloud contact.
    pub last_cloud_timestamp: u32,
    /// Device name registered with the cloud.
    pub device_name: String,
    /// Wi-Fi module firmware version.
    pub firmware_version: String,
    /// Local IP address.
    pub local_ip: Ipv4Addr,
}
