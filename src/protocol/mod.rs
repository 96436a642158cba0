//! Protocol definitions for Safera Sense communication.
//!
//! This module contains the low-level protocol types including:
//! - The GATT characteristic table
//! - Command pipe frames and sequences
//! - Binary payload decoding

pub mod characteristic;
pub mod command;
pub mod parser;

pub use characteristic::Characteristic;
pub use command::{
    BOOST_FRAME_DELAY, CommandFrame, CommandSequence, CommandService,
    SELECT_DAY_STATISTICS_OPCODE, encode_device_command, encode_fan_command,
    encode_light_command, encode_select_day,
};
pub use parser::{
    decode_day_statistics, decode_dcv_report, decode_event_log, decode_fan_level,
    decode_identity_string, decode_sensor_snapshot, decode_ssid, decode_wifi_status,
};
