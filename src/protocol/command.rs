//! Command pipe frames for the Safera Sense protocol.
//!
//! Every write to the command characteristic is an 8-byte frame:
//!
//! ```text
//! [opcode:4 LE] [param:4 LE]
//! ```
//!
//! Fan and light intensity commands are device commands whose opcode packs a
//! service id and a parameter id, so on the wire they read
//! `[service_id, param_id, 0x00, 0x00, value, 0x00, 0x00, 0x00]`.

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::characteristic::COMMAND_FRAME_LEN;
use crate::types::{FanIntent, FanLevel, LightIntent, LightLevel};

/// Minimum delay the device needs between the two BOOST frames.
pub const BOOST_FRAME_DELAY: Duration = Duration::from_millis(100);

/// Opcode that selects which day the statistics characteristic reports.
///
/// The day index travels in the parameter word.
pub const SELECT_DAY_STATISTICS_OPCODE: u32 = service_opcode(CommandService::Statistics, 0x10);

/// Service ids observed on the command pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandService {
    /// Fan speed.
    Fan = 0x01,
    /// Fan boost mode.
    Boost = 0x02,
    /// Fan automatic mode.
    FanAuto = 0x04,
    /// Light brightness.
    Light = 0x05,
    /// Day statistics selection.
    Statistics = 0x06,
}

impl From<CommandService> for u8 {
    fn from(service: CommandService) -> Self {
        service as Self
    }
}

/// Parameter id carrying an intensity value.
const PARAM_INTENSITY: u8 = 0x20;

/// Parameter id that switches boost mode on.
const PARAM_BOOST: u8 = 0x10;

/// Value written to the fan-auto service.
const FAN_AUTO_VALUE: u32 = 0x02;

/// Fan speed byte for BOOST.
const BOOST_INTENSITY: u8 = 0x78;

/// Packs a service id and a parameter id into an opcode word.
#[must_use]
pub const fn service_opcode(service: CommandService, param_id: u8) -> u32 {
    service as u32 | (param_id as u32) << 8
}

/// Intensity byte for a manual fan level below BOOST.
const fn fan_intensity(level: FanLevel) -> Option<u8> {
    match level {
        FanLevel::Off => Some(0x00),
        FanLevel::Level1 => Some(0x1E),
        FanLevel::Level2 => Some(0x3C),
        FanLevel::Level3 => Some(0x5A),
        FanLevel::Boost => None,
    }
}

/// Intensity byte for a light level.
const fn light_intensity(level: LightLevel) -> u8 {
    match level {
        LightLevel::Off => 0x00,
        LightLevel::Level1 => 0x1E,
        LightLevel::Level2 => 0x3C,
        LightLevel::Level3 => 0x5A,
    }
}

/// One 8-byte command pipe frame.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandFrame([u8; COMMAND_FRAME_LEN]);

impl CommandFrame {
    /// Builds a frame from an opcode and a 32-bit parameter.
    #[must_use]
    pub const fn new(opcode: u32, param: u32) -> Self {
        let op = opcode.to_le_bytes();
        let pa = param.to_le_bytes();
        Self([op[0], op[1], op[2], op[3], pa[0], pa[1], pa[2], pa[3]])
    }

    /// Builds an intensity-style frame for a service and parameter id.
    #[must_use]
    pub const fn service(service: CommandService, param_id: u8, value: u8) -> Self {
        Self::new(service_opcode(service, param_id), value as u32)
    }

    /// Opcode word.
    #[must_use]
    pub const fn opcode(&self) -> u32 {
        u32::from_le_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Parameter word.
    #[must_use]
    pub const fn param(&self) -> u32 {
        u32::from_le_bytes([self.0[4], self.0[5], self.0[6], self.0[7]])
    }

    /// Service id byte.
    #[must_use]
    pub const fn service_id(&self) -> u8 {
        self.0[0]
    }

    /// Parameter id byte.
    #[must_use]
    pub const fn param_id(&self) -> u8 {
        self.0[1]
    }

    /// Value byte of an intensity frame.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0[4]
    }

    /// Raw frame bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; COMMAND_FRAME_LEN] {
        &self.0
    }
}

impl fmt::Debug for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandFrame({})", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Ordered frames that must be written with a delay between each pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSequence {
    /// Frames in write order.
    pub frames: Vec<CommandFrame>,
    /// Minimum delay between consecutive frames.
    pub inter_frame_delay: Duration,
}

impl CommandSequence {
    /// A sequence of one frame.
    #[must_use]
    pub fn single(frame: CommandFrame) -> Self {
        Self {
            frames: vec![frame],
            inter_frame_delay: Duration::ZERO,
        }
    }

    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if the sequence has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl From<CommandFrame> for CommandSequence {
    fn from(frame: CommandFrame) -> Self {
        Self::single(frame)
    }
}

/// Encodes a fan intent.
///
/// - AUTO: one `04 20 .. 02` frame, the level is ignored.
/// - OFF..L3: one `01 20 .. <intensity>` frame.
/// - BOOST: `01 20 .. 78` then `02 10 .. 78`, [`BOOST_FRAME_DELAY`] apart.
pub fn encode_fan_command(intent: FanIntent) -> Result<CommandSequence> {
    if intent.auto {
        let frame = CommandFrame::new(
            service_opcode(CommandService::FanAuto, PARAM_INTENSITY),
            FAN_AUTO_VALUE,
        );
        return Ok(frame.into());
    }

    match fan_intensity(intent.level) {
        Some(intensity) => {
            Ok(CommandFrame::service(CommandService::Fan, PARAM_INTENSITY, intensity).into())
        }
        None if intent.level == FanLevel::Boost => Ok(CommandSequence {
            frames: vec![
                CommandFrame::service(CommandService::Fan, PARAM_INTENSITY, BOOST_INTENSITY),
                CommandFrame::service(CommandService::Boost, PARAM_BOOST, BOOST_INTENSITY),
            ],
            inter_frame_delay: BOOST_FRAME_DELAY,
        }),
        None => Err(Error::InvalidCommandIntent {
            reason: format!("no fan intensity for {:?}", intent.level),
        }),
    }
}

/// Encodes a light intent. The command pipe has no light AUTO command.
pub fn encode_light_command(intent: LightIntent) -> Result<CommandFrame> {
    if intent.auto {
        return Err(Error::InvalidCommandIntent {
            reason: "light AUTO cannot be commanded".into(),
        });
    }
    Ok(CommandFrame::service(
        CommandService::Light,
        PARAM_INTENSITY,
        light_intensity(intent.level),
    ))
}

/// Encodes an arbitrary device command.
#[must_use]
pub const fn encode_device_command(opcode: u32, param: u32) -> CommandFrame {
    CommandFrame::new(opcode, param)
}

/// Encodes the statistics day selection.
#[must_use]
pub const fn encode_select_day(opcode: u32, day: u16) -> CommandFrame {
    CommandFrame::new(opcode, day as u32)
}
