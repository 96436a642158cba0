//! Binary payload decoding for Safera Sense characteristics.
//!
//! All multi-byte integers are little-endian. Decoders are pure: they never
//! touch the transport and never return partially populated values.

use std::net::Ipv4Addr;

use bytes::Buf;

use crate::error::DecodeError;
use crate::protocol::characteristic::{
    DAY_STATISTICS_MIN_LEN, DCV_HEADER_LEN, DCV_RECORD_LEN, EVENT_LOG_HEADER_LEN,
    EVENT_LOG_RECORD_LEN, WIFI_STATUS_MIN_LEN,
};
use crate::protocol::command::CommandFrame;
use crate::types::{
    Bitfield, DayStatistics, DcvNode, DcvReport, EventKind, EventLogEntry, FanLevel, FanReading,
    LightLevel, LightReading, SensorErrors, SensorSnapshot, SnapshotLayout, WifiCloudStatus,
};

/// Offset applied to fixed-point temperatures.
const TEMPERATURE_OFFSET: f32 = 50.0;

/// Raw brightness byte the device reports while the light is automatic.
const LIGHT_AUTO_RAW: u8 = 100;

/// Raw byte at the fan-auto offset while the fan is automatic.
const FAN_AUTO_RAW: u8 = 30;

/// Converts a fixed-point temperature (`raw * 0.01 - 50`).
fn temperature(raw: u16) -> f32 {
    f32::from(raw).mul_add(0.01, -TEMPERATURE_OFFSET)
}

fn u16_at(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn i16_at(data: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([data[offset], data[offset + 1]])
}

fn u32_at(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Maps a zero mean to "no data".
fn non_zero(raw: u16) -> Option<u16> {
    (raw != 0).then_some(raw)
}

const fn ensure_len(shape: &'static str, data: &[u8], need: usize) -> Result<(), DecodeError> {
    if data.len() < need {
        Err(DecodeError::TooShort {
            shape,
            need,
            got: data.len(),
        })
    } else {
        Ok(())
    }
}

/// Parses a NUL-terminated string inside a fixed-width window.
///
/// Invalid UTF-8 sequences are dropped rather than rejected.
fn parse_string(data: &[u8], max_len: usize) -> String {
    let window = &data[..max_len.min(data.len())];
    let len = window.iter().position(|&b| b == 0).unwrap_or(window.len());
    String::from_utf8_lossy(&window[..len])
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .collect::<String>()
        .trim()
        .to_owned()
}

/// Decodes a NUL-padded vendor string (model, serial number, revisions).
#[must_use]
pub fn decode_identity_string(data: &[u8]) -> String {
    parse_string(data, data.len())
}

/// Extracts the SSID from the Wi-Fi characteristic: the first non-empty
/// NUL-separated segment.
#[must_use]
pub fn decode_ssid(data: &[u8]) -> String {
    data.split(|&b| b == 0)
        .map(|segment| parse_string(segment, segment.len()))
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
}

/// Decodes a telemetry snapshot.
///
/// The layout is selected by payload length: 54 bytes carry the base
/// layout, 61 bytes add the fan speed at offset 60 and 64 bytes add the
/// fan auto byte at offset 63.
///
/// ```text
/// [ambient:2] [surface:2] [humidity:2] [light:2] [height:1] [emf:1] [aqi:2]
/// [particles:2] [voc:1] [eco2:2] [tvoc:2] [miu:4] [voc_status:1] [heat:1]
/// [accessories:1] [battery:1] [ok_press:1] [alarm:1] [tilt:2s] [pitch:2s]
/// [state:1] [errors:2] [clock:4] [pcu_errors:2] [-:1] [activity_type:1]
/// [alarm_level:1] [activity_level:1] [power:2] [-:2] [blec:1] [pcu_lqi:1s]
/// [pcu_ed:1] [light:1] ... [fan:1 @60] ... [fan_auto:1 @63]
/// ```
pub fn decode_sensor_snapshot(data: &[u8]) -> Result<SensorSnapshot, DecodeError> {
    let Some(layout) = SnapshotLayout::for_len(data.len()) else {
        return Err(DecodeError::TooShort {
            shape: "sensor snapshot",
            need: SnapshotLayout::Base.min_len(),
            got: data.len(),
        });
    };

    let light_raw = data[53];
    let light = LightReading {
        raw: light_raw,
        level: LightLevel::from_raw(light_raw),
        auto: light_raw == LIGHT_AUTO_RAW,
    };

    let fan = (layout >= SnapshotLayout::FanSpeed).then(|| FanReading {
        raw: data[60],
        level: FanLevel::from_raw(data[60]),
        auto: (layout >= SnapshotLayout::Extended).then(|| data[63] == FAN_AUTO_RAW),
    });

    Ok(SensorSnapshot {
        layout,
        ambient_temperature: temperature(u16_at(data, 0)),
        surface_temperature: temperature(u16_at(data, 2)),
        humidity: f32::from(u16_at(data, 4)) / 100.0,
        ambient_light: f32::from(u16_at(data, 6)) / 32.0,
        mounting_height: data[8],
        emf: data[9],
        air_quality_index: u16_at(data, 10),
        particle_index: f32::from(u16_at(data, 12)) / 5.0,
        voc_uba: f32::from(data[14]) / 20.0,
        co2_ppm: u16_at(data, 15),
        tvoc_ppb: u16_at(data, 17),
        miu_status: Bitfield(u32_at(data, 19)),
        voc_status: data[23],
        heat_index: u16::from(data[24]) * 2,
        connected_accessories: data[25],
        battery_level: data[26],
        seconds_since_ok_press: data[27],
        alarm_status: data[28],
        tilt_angle: i16_at(data, 29),
        pitch_angle: i16_at(data, 31),
        device_state: data[33],
        sensor_errors: SensorErrors(u16_at(data, 34)),
        device_clock: u32_at(data, 36),
        pcu_errors: Bitfield::from(u16_at(data, 40)),
        activity_type: data[43],
        alarm_level: data[44],
        activity_level: data[45],
        power_consumption: u16_at(data, 46),
        blec_command: data[50],
        pcu_lqi: i8::from_le_bytes([data[51]]),
        pcu_ed: data[52],
        light,
        fan,
    })
}

/// Decodes the Wi-Fi/cloud status block.
///
/// ```text
/// [ssid:32] [rssi:1s] [manager:1] [wifi:1] [cloud:1] [last_cmd:1]
/// [cloud_ts:4] [device_name:16] [fw_version:14] [ip:4]
/// ```
pub fn decode_wifi_status(data: &[u8]) -> Result<WifiCloudStatus, DecodeError> {
    ensure_len("wifi status", data, WIFI_STATUS_MIN_LEN)?;

    // IP is stored little-endian; reading it as u32 LE yields network order.
    let local_ip = Ipv4Addr::from(u32_at(data, 71));

    Ok(WifiCloudStatus {
        ssid: parse_string(&data[0..32], 32),
        rssi: i8::from_le_bytes([data[32]]),
        manager_status: data[33],
        wifi_status: data[34],
        cloud_status: data[35],
        last_command_status: data[36],
        last_cloud_timestamp: u32_at(data, 37),
        device_name: parse_string(&data[41..57], 16),
        firmware_version: parse_string(&data[57..71], 14),
        local_ip,
    })
}

/// Decodes an event log batch.
///
/// ```text
/// [count:2] ([event_type:1s] [timestamp:4]) * count
/// ```
///
/// Never fails: a record running past the end of the buffer ends the batch.
#[must_use]
pub fn decode_event_log(data: &[u8]) -> Vec<EventLogEntry> {
    if data.len() < EVENT_LOG_HEADER_LEN {
        return Vec::new();
    }

    let mut cursor = std::io::Cursor::new(data);
    let count = usize::from(cursor.get_u16_le());
    let available = cursor.remaining() / EVENT_LOG_RECORD_LEN;
    if available < count {
        tracing::debug!("event log declares {count} records, {available} present");
    }

    (0..count.min(available))
        .map(|_| {
            let kind = EventKind::from_code(cursor.get_i8());
            let timestamp = cursor.get_u32_le();
            EventLogEntry { kind, timestamp }
        })
        .collect()
}

/// Decodes the statistics record of the selected day.
///
/// ```text
/// [day:2] [temp:2] [humidity:2] [aqi:2] [eco2:2] [tvoc:2] [particles:2]
/// [alarms:1] [cooking:1]
/// ```
pub fn decode_day_statistics(data: &[u8]) -> Result<DayStatistics, DecodeError> {
    ensure_len("day statistics", data, DAY_STATISTICS_MIN_LEN)?;

    Ok(DayStatistics {
        day: u16_at(data, 0),
        ambient_temperature: non_zero(u16_at(data, 2)).map(temperature),
        humidity: non_zero(u16_at(data, 4)).map(|raw| f32::from(raw) / 100.0),
        air_quality_index: non_zero(u16_at(data, 6)),
        eco2_ppm: non_zero(u16_at(data, 8)),
        tvoc_ppb: non_zero(u16_at(data, 10)),
        particle_index: non_zero(u16_at(data, 12)).map(|raw| f32::from(raw) / 5.0),
        alarm_count: data[14],
        cooking_count: data[15],
    })
}

/// Decodes a DCV report.
///
/// ```text
/// [version:1] [count:1] [flags:2]
/// ([lqi:1s] [ed:1] [peer_lqi:1s] [peer_ed:1] [vent:1] [vent_target:1]
///  [motor:1] [alarm:1] [aqi:2] [activity:1] [comfort:1] [status:1]
///  [errors:2]) * count
/// ```
///
/// Records missing from the end of the buffer are dropped.
pub fn decode_dcv_report(data: &[u8]) -> Result<DcvReport, DecodeError> {
    ensure_len("dcv report", data, DCV_HEADER_LEN)?;

    let mut cursor = std::io::Cursor::new(data);
    let data_version = cursor.get_u8();
    let entry_count = cursor.get_u8();
    let flags = Bitfield::from(cursor.get_u16_le());

    let available = cursor.remaining() / DCV_RECORD_LEN;
    let present = usize::from(entry_count).min(available);
    if present < usize::from(entry_count) {
        tracing::debug!("dcv report declares {entry_count} nodes, {available} present");
    }

    let nodes = (0..present)
        .map(|_| DcvNode {
            lqi: cursor.get_i8(),
            ed: cursor.get_u8(),
            peer_lqi: cursor.get_i8(),
            peer_ed: cursor.get_u8(),
            vent_value: cursor.get_u8(),
            vent_target: cursor.get_u8(),
            motor_speed: cursor.get_u8(),
            alarm: cursor.get_u8(),
            air_quality_index: cursor.get_u16_le(),
            activity: cursor.get_u8(),
            comfort_level: cursor.get_u8(),
            status: Bitfield::from(cursor.get_u8()),
            errors: Bitfield::from(cursor.get_u16_le()),
        })
        .collect();

    Ok(DcvReport {
        data_version,
        entry_count,
        flags,
        nodes,
    })
}

/// Recovers the fan level carried by a fan intensity frame.
#[must_use]
pub const fn decode_fan_level(frame: &CommandFrame) -> Option<FanLevel> {
    FanLevel::from_raw(frame.value())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a snapshot payload with a handful of known values.
    fn snapshot_payload(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        data[0..2].copy_from_slice(&7150u16.to_le_bytes()); // 21.5 °C
        data[2..4].copy_from_slice(&13000u16.to_le_bytes()); // 80.0 °C
        data[4..6].copy_from_slice(&4550u16.to_le_bytes()); // 45.5 %
        data[6..8].copy_from_slice(&320u16.to_le_bytes()); // 10.0
        data[10..12].copy_from_slice(&42u16.to_le_bytes());
        data[12..14].copy_from_slice(&25u16.to_le_bytes()); // 5.0
        data[14] = 40; // 2.0 UBA
        data[15..17].copy_from_slice(&612u16.to_le_bytes());
        data[17..19].copy_from_slice(&220u16.to_le_bytes());
        data[19..23].copy_from_slice(&0x0001_0002u32.to_le_bytes());
        data[24] = 21; // heat index 42
        data[26] = 87;
        data[28] = 1;
        data[29..31].copy_from_slice(&(-12i16).to_le_bytes());
        data[31..33].copy_from_slice(&5i16.to_le_bytes());
        data[34..36].copy_from_slice(&0x1001u16.to_le_bytes());
        data[36..40].copy_from_slice(&1_700_000_000u32.to_le_bytes());
        data[44] = 3;
        data[51] = 0xF6; // -10
        data[53] = 60;
        data
    }

    #[test]
    fn test_decode_snapshot_base_layout() {
        let snapshot = decode_sensor_snapshot(&snapshot_payload(54)).unwrap();
        assert_eq!(snapshot.layout, SnapshotLayout::Base);
        assert!((snapshot.ambient_temperature - 21.5).abs() < 0.001);
        assert!((snapshot.surface_temperature - 80.0).abs() < 0.001);
        assert!((snapshot.humidity - 45.5).abs() < 0.001);
        assert!((snapshot.ambient_light - 10.0).abs() < 0.001);
        assert!((snapshot.particle_index - 5.0).abs() < 0.001);
        assert!((snapshot.voc_uba - 2.0).abs() < 0.001);
        assert_eq!(snapshot.air_quality_index, 42);
        assert_eq!(snapshot.co2_ppm, 612);
        assert_eq!(snapshot.tvoc_ppb, 220);
        assert_eq!(snapshot.miu_status.bits(), 0x0001_0002);
        assert_eq!(snapshot.heat_index, 42);
        assert_eq!(snapshot.battery_level, 87);
        assert!(snapshot.alarm_active());
        assert_eq!(snapshot.tilt_angle, -12);
        assert_eq!(snapshot.pitch_angle, 5);
        assert_eq!(snapshot.sensor_errors.messages(), vec!["Temp Sensor", "Sensor Lens Dirty"]);
        assert_eq!(snapshot.device_clock, 1_700_000_000);
        assert_eq!(snapshot.alarm_level, 3);
        assert_eq!(snapshot.pcu_lqi, -10);
        assert_eq!(snapshot.light.level, Some(LightLevel::Level2));
        assert!(!snapshot.light.auto);
        assert_eq!(snapshot.fan, None);
    }

    #[test]
    fn test_decode_snapshot_extended_layout() {
        let mut data = snapshot_payload(69);
        data[60] = 90;
        data[63] = 30;
        let snapshot = decode_sensor_snapshot(&data).unwrap();
        assert_eq!(snapshot.layout, SnapshotLayout::Extended);
        let fan = snapshot.fan.unwrap();
        assert_eq!(fan.raw, 90);
        assert_eq!(fan.level, Some(FanLevel::Level3));
        assert_eq!(fan.auto, Some(true));
    }

    #[test]
    fn test_decode_snapshot_fan_speed_without_auto_byte() {
        let mut data = snapshot_payload(62);
        data[60] = 30;
        let snapshot = decode_sensor_snapshot(&data).unwrap();
        assert_eq!(snapshot.layout, SnapshotLayout::FanSpeed);
        let fan = snapshot.fan.unwrap();
        assert_eq!(fan.raw, 30);
        assert_eq!(fan.level, Some(FanLevel::Level1));
        assert_eq!(fan.auto, None);

        let snapshot = decode_sensor_snapshot(&snapshot_payload(60)).unwrap();
        assert_eq!(snapshot.layout, SnapshotLayout::Base);
        assert_eq!(snapshot.fan, None);
    }

    #[test]
    fn test_decode_snapshot_unmapped_fan_speed() {
        let mut data = snapshot_payload(64);
        data[60] = 75;
        let fan = decode_sensor_snapshot(&data).unwrap().fan.unwrap();
        assert_eq!(fan.raw, 75);
        assert_eq!(fan.level, None);
        assert_eq!(fan.auto, Some(false));
    }

    #[test]
    fn test_decode_snapshot_light_auto() {
        let mut data = snapshot_payload(54);
        data[53] = 100;
        let light = decode_sensor_snapshot(&data).unwrap().light;
        assert!(light.auto);
        assert_eq!(light.level, None);
    }

    #[test]
    fn test_decode_snapshot_too_short() {
        for len in [0, 1, 32, 53] {
            let err = decode_sensor_snapshot(&vec![0u8; len]).unwrap_err();
            assert_eq!(
                err,
                DecodeError::TooShort {
                    shape: "sensor snapshot",
                    need: 54,
                    got: len
                }
            );
        }
    }

    #[test]
    fn test_decode_wifi_status() {
        let mut data = vec![0u8; 75];
        data[..6].copy_from_slice(b"kitkat");
        data[32] = (-61i8).to_le_bytes()[0];
        data[33] = 2;
        data[34] = 3;
        data[35] = 1;
        data[36] = 0;
        data[37..41].copy_from_slice(&1_699_999_999u32.to_le_bytes());
        data[41..47].copy_from_slice(b"Sense1");
        data[57..62].copy_from_slice(b"2.1.4");
        data[71..75].copy_from_slice(&[0x2A, 0x01, 0xA8, 0xC0]);

        let status = decode_wifi_status(&data).unwrap();
        assert_eq!(status.ssid, "kitkat");
        assert_eq!(status.rssi, -61);
        assert_eq!(status.manager_status, 2);
        assert_eq!(status.wifi_status, 3);
        assert_eq!(status.cloud_status, 1);
        assert_eq!(status.last_cloud_timestamp, 1_699_999_999);
        assert_eq!(status.device_name, "Sense1");
        assert_eq!(status.firmware_version, "2.1.4");
        assert_eq!(status.local_ip, Ipv4Addr::new(192, 168, 1, 42));
        assert_eq!(status.local_ip.to_string(), "192.168.1.42");
    }

    #[test]
    fn test_decode_wifi_status_drops_invalid_bytes() {
        let mut data = vec![0u8; 75];
        data[..5].copy_from_slice(&[b'h', 0xFF, b'o', b'm', b'e']);
        assert_eq!(decode_wifi_status(&data).unwrap().ssid, "home");
    }

    #[test]
    fn test_decode_wifi_status_too_short() {
        assert!(matches!(
            decode_wifi_status(&[0u8; 74]),
            Err(DecodeError::TooShort { need: 75, got: 74, .. })
        ));
    }

    #[test]
    fn test_decode_event_log() {
        let mut data = 2u16.to_le_bytes().to_vec();
        data.push(1);
        data.extend_from_slice(&1000u32.to_le_bytes());
        data.push(0xFF); // -1
        data.extend_from_slice(&2000u32.to_le_bytes());

        let entries = decode_event_log(&data);
        assert_eq!(
            entries,
            vec![
                EventLogEntry {
                    kind: EventKind::CookingStarted,
                    timestamp: 1000
                },
                EventLogEntry {
                    kind: EventKind::SensorFault,
                    timestamp: 2000
                },
            ]
        );
    }

    #[test]
    fn test_decode_event_log_truncated() {
        // Declares 5 records, carries 3 full ones and part of a fourth.
        let mut data = 5u16.to_le_bytes().to_vec();
        for i in 0..3u32 {
            data.push(7);
            data.extend_from_slice(&(100 + i).to_le_bytes());
        }
        data.extend_from_slice(&[4, 0x01, 0x02]);

        let entries = decode_event_log(&data);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].timestamp, 102);
        assert!(entries.iter().all(|e| e.kind == EventKind::ButtonPressed));
    }

    #[test]
    fn test_decode_event_log_empty_buffers() {
        assert!(decode_event_log(&[]).is_empty());
        assert!(decode_event_log(&[0x01]).is_empty());
        assert!(decode_event_log(&[0x00, 0x00, 0x01]).is_empty());
    }

    #[test]
    fn test_decode_day_statistics() {
        let mut data = vec![0u8; 16];
        data[0..2].copy_from_slice(&3u16.to_le_bytes());
        data[2..4].copy_from_slice(&7000u16.to_le_bytes()); // 20.0 °C
        data[4..6].copy_from_slice(&4000u16.to_le_bytes()); // 40 %
        data[8..10].copy_from_slice(&550u16.to_le_bytes());
        data[14] = 1;
        data[15] = 4;

        let stats = decode_day_statistics(&data).unwrap();
        assert_eq!(stats.day, 3);
        assert!((stats.ambient_temperature.unwrap() - 20.0).abs() < 0.001);
        assert!((stats.humidity.unwrap() - 40.0).abs() < 0.001);
        assert_eq!(stats.air_quality_index, None);
        assert_eq!(stats.eco2_ppm, Some(550));
        assert_eq!(stats.tvoc_ppb, None);
        assert_eq!(stats.particle_index, None);
        assert_eq!(stats.alarm_count, 1);
        assert_eq!(stats.cooking_count, 4);
    }

    #[test]
    fn test_decode_day_statistics_zero_means_no_data() {
        let stats = decode_day_statistics(&[0u8; 16]).unwrap();
        assert_eq!(stats.ambient_temperature, None);
        assert_eq!(stats.humidity, None);
        assert_eq!(stats.eco2_ppm, None);
        assert!(decode_day_statistics(&[0u8; 15]).is_err());
    }

    fn dcv_record(motor_speed: u8) -> Vec<u8> {
        let mut record = vec![0xF0, 12, 0xEC, 8, 40, 60, motor_speed, 0];
        record.extend_from_slice(&35u16.to_le_bytes());
        record.extend_from_slice(&[2, 5, 0x81]);
        record.extend_from_slice(&0x0100u16.to_le_bytes());
        record
    }

    #[test]
    fn test_decode_dcv_report() {
        let mut data = vec![1, 2];
        data.extend_from_slice(&0x0003u16.to_le_bytes());
        data.extend(dcv_record(50));
        data.extend(dcv_record(70));

        let report = decode_dcv_report(&data).unwrap();
        assert_eq!(report.data_version, 1);
        assert_eq!(report.entry_count, 2);
        assert_eq!(report.flags.set_bits().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(report.nodes.len(), 2);
        assert!(!report.is_truncated());

        let node = report.nodes[1];
        assert_eq!(node.lqi, -16);
        assert_eq!(node.peer_lqi, -20);
        assert_eq!(node.vent_target, 60);
        assert_eq!(node.motor_speed, 70);
        assert_eq!(node.air_quality_index, 35);
        assert_eq!(node.comfort_level, 5);
        assert!(node.status.is_set(7));
        assert!(node.errors.is_set(8));
    }

    #[test]
    fn test_decode_dcv_report_truncated() {
        let mut data = vec![1, 4, 0, 0];
        data.extend(dcv_record(10));
        data.extend(dcv_record(20));
        data.extend_from_slice(&dcv_record(30)[..9]);

        let report = decode_dcv_report(&data).unwrap();
        assert_eq!(report.entry_count, 4);
        assert_eq!(report.nodes.len(), 2);
        assert!(report.is_truncated());
        assert_eq!(report.nodes[1].motor_speed, 20);
    }

    #[test]
    fn test_decode_dcv_report_too_short() {
        assert!(decode_dcv_report(&[1, 0, 0]).is_err());
        assert!(decode_dcv_report(&[1, 0, 0, 0]).unwrap().nodes.is_empty());
    }

    #[test]
    fn test_identity_strings() {
        assert_eq!(decode_identity_string(b"Safera Oy\0\0\0"), "Safera Oy");
        assert_eq!(decode_identity_string(b" SENSE-2 "), "SENSE-2");
        assert_eq!(decode_ssid(b"\0\0home-net\0sense-host\0v1"), "home-net");
        assert_eq!(decode_ssid(b""), "");
    }
}
