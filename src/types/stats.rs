//! Event log, day statistics and DCV report types.

use crate::types::bits::Bitfield;

/// Known event log codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Cooking started.
    CookingStarted,
    /// Cooking ended.
    CookingEnded,
    /// Pre-alarm raised.
    PreAlarm,
    /// Alarm raised.
    Alarm,
    /// Alarm cleared.
    AlarmCleared,
    /// Alarm silenced by the user.
    AlarmSilenced,
    /// OK button pressed.
    ButtonPressed,
    /// OK button held down.
    ButtonLongPressed,
    /// Device powered on.
    PowerOn,
    /// A sensor reported a fault.
    SensorFault,
    /// Battery low.
    BatteryLow,
    /// Code not in the name table.
    Unknown(i8),
}

impl EventKind {
    /// Resolves a signed event code.
    ///
    /// The name table has not been confirmed against device firmware; use
    /// [`code`](Self::code) when the raw value matters.
    #[must_use]
    pub const fn from_code(code: i8) -> Self {
        match code {
            1 => Self::CookingStarted,
            2 => Self::CookingEnded,
            3 => Self::PreAlarm,
            4 => Self::Alarm,
            5 => Self::AlarmCleared,
            6 => Self::AlarmSilenced,
            7 => Self::ButtonPressed,
            8 => Self::ButtonLongPressed,
            9 => Self::PowerOn,
            -1 => Self::SensorFault,
            -2 => Self::BatteryLow,
            other => Self::Unknown(other),
        }
    }

    /// Signed event code.
    #[must_use]
    pub const fn code(self) -> i8 {
        match self {
            Self::CookingStarted => 1,
            Self::CookingEnded => 2,
            Self::PreAlarm => 3,
            Self::Alarm => 4,
            Self::AlarmCleared => 5,
            Self::AlarmSilenced => 6,
            Self::ButtonPressed => 7,
            Self::ButtonLongPressed => 8,
            Self::PowerOn => 9,
            Self::SensorFault => -1,
            Self::BatteryLow => -2,
            Self::Unknown(code) => code,
        }
    }

    /// Event name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CookingStarted => "Cooking started",
            Self::CookingEnded => "Cooking ended",
            Self::PreAlarm => "Pre-alarm",
            Self::Alarm => "Alarm",
            Self::AlarmCleared => "Alarm cleared",
            Self::AlarmSilenced => "Alarm silenced",
            Self::ButtonPressed => "Button pressed",
            Self::ButtonLongPressed => "Button long press",
            Self::PowerOn => "Power on",
            Self::SensorFault => "Sensor fault",
            Self::BatteryLow => "Battery low",
            Self::Unknown(_) => "Unknown",
        }
    }
}

/// One entry of the device event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventLogEntry {
    /// Resolved event type.
    pub kind: EventKind,
    /// Device timestamp.
    pub timestamp: u32,
}

/// Aggregated statistics for one day.
///
/// Mean fields are `None` when the device had no samples for the day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayStatistics {
    /// Day counter.
    pub day: u16,
    /// Mean ambient temperature in °C.
    pub ambient_temperature: Option<f32>,
    /// Mean relative humidity in %.
    pub humidity: Option<f32>,
    /// Mean air-quality index.
    pub air_quality_index: Option<u16>,
    /// Mean equivalent CO₂ in ppm.
    pub eco2_ppm: Option<u16>,
    /// Mean total VOC in ppb.
    pub tvoc_ppb: Option<u16>,
    /// Mean particle index.
    pub particle_index: Option<f32>,
    /// Number of alarms.
    pub alarm_count: u8,
    /// Number of cooking sessions.
    pub cooking_count: u8,
}

/// One node of a distributed control/vent report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DcvNode {
    /// Link quality seen by this node.
    pub lqi: i8,
    /// Energy detect seen by this node.
    pub ed: u8,
    /// Link quality seen by the peer.
    pub peer_lqi: i8,
    /// Energy detect seen by the peer.
    pub peer_ed: u8,
    /// Current vent control value.
    pub vent_value: u8,
    /// Target vent control value.
    pub vent_target: u8,
    /// Motor speed.
    pub motor_speed: u8,
    /// Alarm state.
    pub alarm: u8,
    /// Air-quality index.
    pub air_quality_index: u16,
    /// Activity level.
    pub activity: u8,
    /// Comfort level.
    pub comfort_level: u8,
    /// Status bits (opaque).
    pub status: Bitfield,
    /// Error bits (opaque).
    pub errors: Bitfield,
}

/// Distributed control/vent report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DcvReport {
    /// Report format version.
    pub data_version: u8,
    /// Number of node records the header declares.
    pub entry_count: u8,
    /// Header flags (opaque).
    pub flags: Bitfield,
    /// Node records actually present.
    pub nodes: Vec<DcvNode>,
}

impl DcvReport {
    /// Returns true if fewer records arrived than the header declared.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.nodes.len() < usize::from(self.entry_count)
    }
}
