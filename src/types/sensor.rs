//! Sensor snapshot types.

use crate::types::bits::Bitfield;
use crate::types::control::{FanLevel, LightLevel};

/// A known fault bit in the 16-bit sensor error mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SensorFault {
    /// Temperature sensor failure.
    TemperatureSensor = 0x0001,
    /// Time-of-flight (mounting height) sensor failure.
    TofSensor = 0x0002,
    /// ADC failure.
    AdcSensor = 0x0004,
    /// Gas sensor A failure.
    GasSensorA = 0x0008,
    /// Gas sensor B failure.
    GasSensorB = 0x0010,
    /// Particle sensor failure.
    ParticleSensor = 0x0020,
    /// Orientation sensor failure.
    OrientationSensor = 0x0040,
    /// Humidity sensor failure.
    HumiditySensor = 0x0080,
    /// Device mounted at an unexpected orientation.
    Orientation = 0x0100,
    /// Battery low.
    BatteryLow = 0x0200,
    /// Paired power control unit missing.
    PairedPcuMissing = 0x0400,
    /// Processor error.
    ProcessorError = 0x0800,
    /// Sensor lens dirty.
    SensorLensDirty = 0x1000,
    /// Battery critically low.
    BatteryCriticallyLow = 0x2000,
    /// External memory failure.
    ExternalMemory = 0x4000,
    /// IO expander failure.
    IoExpander = 0x8000,
}

impl SensorFault {
    /// The complete fault table, in bit order.
    pub const ALL: [Self; 16] = [
        Self::TemperatureSensor,
        Self::TofSensor,
        Self::AdcSensor,
        Self::GasSensorA,
        Self::GasSensorB,
        Self::ParticleSensor,
        Self::OrientationSensor,
        Self::HumiditySensor,
        Self::Orientation,
        Self::BatteryLow,
        Self::PairedPcuMissing,
        Self::ProcessorError,
        Self::SensorLensDirty,
        Self::BatteryCriticallyLow,
        Self::ExternalMemory,
        Self::IoExpander,
    ];

    /// Bit mask of this fault.
    #[must_use]
    pub const fn mask(self) -> u16 {
        self as u16
    }

    /// Human readable fault description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::TemperatureSensor => "Temp Sensor",
            Self::TofSensor => "TOF Sensor",
            Self::AdcSensor => "ADC Sensor",
            Self::GasSensorA => "Gas Sensor A",
            Self::GasSensorB => "Gas Sensor B",
            Self::ParticleSensor => "Particle Sensor",
            Self::OrientationSensor => "Orientation Sensor",
            Self::HumiditySensor => "Humidity Sensor",
            Self::Orientation => "Orientation",
            Self::BatteryLow => "Battery Low",
            Self::PairedPcuMissing => "Paired PCU missing",
            Self::ProcessorError => "Processor Error",
            Self::SensorLensDirty => "Sensor Lens Dirty",
            Self::BatteryCriticallyLow => "Battery Critically Low",
            Self::ExternalMemory => "External Memory",
            Self::IoExpander => "IO Expander",
        }
    }
}

/// Sensor error bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SensorErrors(pub u16);

impl SensorErrors {
    /// Returns true if no fault bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if the given fault is reported.
    #[must_use]
    pub const fn contains(self, fault: SensorFault) -> bool {
        self.0 & fault.mask() != 0
    }

    /// Resolves the mask against the fault table.
    #[must_use]
    pub fn faults(self) -> Vec<SensorFault> {
        SensorFault::ALL
            .into_iter()
            .filter(|fault| self.contains(*fault))
            .collect()
    }

    /// Fault descriptions for every set bit.
    #[must_use]
    pub fn messages(self) -> Vec<&'static str> {
        self.faults()
            .into_iter()
            .map(SensorFault::description)
            .collect()
    }
}

/// Current fan state as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanReading {
    /// Raw speed byte.
    pub raw: u8,
    /// Discrete level, only when `raw` sits on a snap point.
    pub level: Option<FanLevel>,
    /// Fan is under automatic control; `None` when the payload stops
    /// before the auto byte.
    pub auto: Option<bool>,
}

/// Current light state as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightReading {
    /// Raw brightness byte.
    pub raw: u8,
    /// Discrete level, only when `raw` sits on a snap point.
    pub level: Option<LightLevel>,
    /// Light is under automatic control.
    pub auto: bool,
}

/// Payload layout revision of the telemetry characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SnapshotLayout {
    /// 54-byte layout: environment, alarms, errors and light.
    Base,
    /// 61..63 bytes: adds the fan speed byte.
    FanSpeed,
    /// 64-byte and longer layout: adds the fan auto byte.
    Extended,
}

impl SnapshotLayout {
    /// Minimum payload length of this layout.
    #[must_use]
    pub const fn min_len(self) -> usize {
        match self {
            Self::Base => 54,
            Self::FanSpeed => 61,
            Self::Extended => 64,
        }
    }

    /// Selects the richest layout a payload of `len` bytes satisfies.
    #[must_use]
    pub const fn for_len(len: usize) -> Option<Self> {
        if len >= Self::Extended.min_len() {
            Some(Self::Extended)
        } else if len >= Self::FanSpeed.min_len() {
            Some(Self::FanSpeed)
        } else if len >= Self::Base.min_len() {
            Some(Self::Base)
        } else {
            None
        }
    }
}

/// Decoded reading of the telemetry characteristic.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSnapshot {
    /// Layout the payload was decoded with.
    pub layout: SnapshotLayout,
    /// Ambient temperature in °C.
    pub ambient_temperature: f32,
    /// Cooktop surface temperature in °C.
    pub surface_temperature: f32,
    /// Relative humidity in %.
    pub humidity: f32,
    /// Ambient light.
    pub ambient_light: f32,
    /// Mounting height above the cooktop.
    pub mounting_height: u8,
    /// Electromagnetic field level.
    pub emf: u8,
    /// Air-quality index.
    pub air_quality_index: u16,
    /// Particle index.
    pub particle_index: f32,
    /// VOC on the UBA scale.
    pub voc_uba: f32,
    /// Equivalent CO₂ in ppm.
    pub co2_ppm: u16,
    /// Total VOC in ppb.
    pub tvoc_ppb: u16,
    /// Measurement/interface unit status (opaque).
    pub miu_status: Bitfield,
    /// VOC sensor status.
    pub voc_status: u8,
    /// Heat index.
    pub heat_index: u16,
    /// Number of connected accessories.
    pub connected_accessories: u8,
    /// Battery level.
    pub battery_level: u8,
    /// Seconds since the OK button was last pressed.
    pub seconds_since_ok_press: u8,
    /// Alarm status.
    pub alarm_status: u8,
    /// Tilt angle.
    pub tilt_angle: i16,
    /// Pitch angle.
    pub pitch_angle: i16,
    /// Device state.
    pub device_state: u8,
    /// Sensor fault mask.
    pub sensor_errors: SensorErrors,
    /// Device clock.
    pub device_clock: u32,
    /// Power control unit errors (opaque).
    pub pcu_errors: Bitfield,
    /// Activity type.
    pub activity_type: u8,
    /// Alarm level.
    pub alarm_level: u8,
    /// Activity level.
    pub activity_level: u8,
    /// Power consumption.
    pub power_consumption: u16,
    /// Last BLE-C command echoed by the device.
    pub blec_command: u8,
    /// Power control unit link quality.
    pub pcu_lqi: i8,
    /// Power control unit energy detect.
    pub pcu_ed: u8,
    /// Light state.
    pub light: LightReading,
    /// Fan state, only present in the extended layout.
    pub fan: Option<FanReading>,
}

impl SensorSnapshot {
    /// Returns true if any alarm is active.
    #[must_use]
    pub const fn alarm_active(&self) -> bool {
        self.alarm_status != 0
    }
}
