//! Fan and light levels and write-side command intents.

use crate::error::{Error, Result};

/// Raw value of the vendor AUTO flag on fan settings.
pub const FAN_AUTO_FLAG: u8 = 0x80;

/// Raw value the vendor uses for automatic light control.
pub const LIGHT_AUTO_VALUE: u8 = 98;

/// Discrete fan level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FanLevel {
    /// Fan off.
    Off = 0,
    /// Level 1.
    Level1 = 1,
    /// Level 2.
    Level2 = 2,
    /// Level 3.
    Level3 = 3,
    /// Boost (level 4).
    Boost = 4,
}

impl FanLevel {
    /// All fan levels in ascending order.
    pub const ALL: [Self; 5] = [
        Self::Off,
        Self::Level1,
        Self::Level2,
        Self::Level3,
        Self::Boost,
    ];

    /// Parses an ordinal level (0-4).
    #[must_use]
    pub const fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Off),
            1 => Some(Self::Level1),
            2 => Some(Self::Level2),
            3 => Some(Self::Level3),
            4 => Some(Self::Boost),
            _ => None,
        }
    }

    /// Maps a raw speed byte to a level.
    ///
    /// Only the snap points 0, 30, 60, 90 and 120 map to a level; any other
    /// value is reported as unknown rather than rounded.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Off),
            30 => Some(Self::Level1),
            60 => Some(Self::Level2),
            90 => Some(Self::Level3),
            120 => Some(Self::Boost),
            _ => None,
        }
    }

    /// Raw speed byte of this level.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self as u8 * 30
    }
}

impl TryFrom<u8> for FanLevel {
    type Error = Error;

    fn try_from(ordinal: u8) -> Result<Self> {
        Self::from_ordinal(ordinal).ok_or_else(|| Error::InvalidCommandIntent {
            reason: format!("fan level {ordinal} outside 0..=4"),
        })
    }
}

/// Discrete light level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum LightLevel {
    /// Light off.
    Off = 0,
    /// Level 1.
    Level1 = 1,
    /// Level 2.
    Level2 = 2,
    /// Level 3.
    Level3 = 3,
}

impl LightLevel {
    /// All light levels in ascending order.
    pub const ALL: [Self; 4] = [Self::Off, Self::Level1, Self::Level2, Self::Level3];

    /// Parses an ordinal level (0-3).
    #[must_use]
    pub const fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Off),
            1 => Some(Self::Level1),
            2 => Some(Self::Level2),
            3 => Some(Self::Level3),
            _ => None,
        }
    }

    /// Maps a raw brightness byte to a level (snap points 0, 30, 60, 90).
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Off),
            30 => Some(Self::Level1),
            60 => Some(Self::Level2),
            90 => Some(Self::Level3),
            _ => None,
        }
    }

    /// Raw brightness byte of this level.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self as u8 * 30
    }
}

impl TryFrom<u8> for LightLevel {
    type Error = Error;

    fn try_from(ordinal: u8) -> Result<Self> {
        Self::from_ordinal(ordinal).ok_or_else(|| Error::InvalidCommandIntent {
            reason: format!("light level {ordinal} outside 0..=3"),
        })
    }
}

/// Requested fan setting.
///
/// `auto` is orthogonal to `level`: when set, the device is put in automatic
/// mode and the level is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FanIntent {
    /// Target level.
    pub level: FanLevel,
    /// Automatic control.
    pub auto: bool,
}

impl FanIntent {
    /// Manual fan level.
    #[must_use]
    pub const fn level(level: FanLevel) -> Self {
        Self { level, auto: false }
    }

    /// Automatic fan control.
    #[must_use]
    pub const fn auto() -> Self {
        Self {
            level: FanLevel::Off,
            auto: true,
        }
    }

    /// Parses the vendor encoding: `0x80` flags AUTO, the low bits carry the level.
    pub fn from_raw(raw: u8) -> Result<Self> {
        let auto = raw & FAN_AUTO_FLAG != 0;
        let level = FanLevel::try_from(raw & !FAN_AUTO_FLAG)?;
        Ok(Self { level, auto })
    }

    /// Vendor encoding of this intent.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        if self.auto {
            self.level as u8 | FAN_AUTO_FLAG
        } else {
            self.level as u8
        }
    }
}

impl From<FanLevel> for FanIntent {
    fn from(level: FanLevel) -> Self {
        Self::level(level)
    }
}

/// Requested light setting.
///
/// The command pipe has no light AUTO command; an intent with `auto` set is
/// rejected at encoding time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightIntent {
    /// Target level.
    pub level: LightLevel,
    /// Automatic control.
    pub auto: bool,
}

impl LightIntent {
    /// Manual light level.
    #[must_use]
    pub const fn level(level: LightLevel) -> Self {
        Self { level, auto: false }
    }

    /// Automatic light control.
    #[must_use]
    pub const fn auto() -> Self {
        Self {
            level: LightLevel::Off,
            auto: true,
        }
    }

    /// Parses the vendor encoding: 0-3 are levels, 98 is AUTO.
    pub fn from_raw(raw: u8) -> Result<Self> {
        if raw == LIGHT_AUTO_VALUE {
            return Ok(Self::auto());
        }
        LightLevel::try_from(raw).map(Self::level)
    }
}

impl From<LightLevel> for LightIntent {
    fn from(level: LightLevel) -> Self {
        Self::level(level)
    }
}

/// A write-side request, consumed by the command sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandIntent {
    /// Set the fan.
    Fan(FanIntent),
    /// Set the light.
    Light(LightIntent),
    /// Arbitrary device command.
    Device {
        /// Command opcode.
        opcode: u32,
        /// 32-bit parameter.
        param: u32,
    },
}

impl From<FanIntent> for CommandIntent {
    fn from(intent: FanIntent) -> Self {
        Self::Fan(intent)
    }
}

impl From<LightIntent> for CommandIntent {
    fn from(intent: LightIntent) -> Self {
        Self::Light(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_level_snap_points() {
        for level in FanLevel::ALL {
            assert_eq!(FanLevel::from_raw(level.raw()), Some(level));
        }
        assert_eq!(FanLevel::from_raw(45), None);
        assert_eq!(FanLevel::from_raw(121), None);
    }

    #[test]
    fn test_fan_level_invalid_ordinal() {
        assert!(matches!(
            FanLevel::try_from(5),
            Err(Error::InvalidCommandIntent { .. })
        ));
    }

    #[test]
    fn test_fan_intent_raw() {
        let intent = FanIntent::from_raw(0x80).unwrap();
        assert!(intent.auto);
        assert_eq!(intent.level, FanLevel::Off);

        let intent = FanIntent::from_raw(4).unwrap();
        assert_eq!(intent, FanIntent::level(FanLevel::Boost));
        assert_eq!(intent.to_raw(), 4);

        assert!(FanIntent::from_raw(0x07).is_err());
        assert!(FanIntent::from_raw(0x40).is_err());
    }

    #[test]
    fn test_light_intent_raw() {
        assert_eq!(
            LightIntent::from_raw(2).unwrap(),
            LightIntent::level(LightLevel::Level2)
        );
        assert!(LightIntent::from_raw(98).unwrap().auto);
        assert!(LightIntent::from_raw(4).is_err());
    }

    #[test]
    fn test_light_level_snap_points() {
        assert_eq!(LightLevel::from_raw(60), Some(LightLevel::Level2));
        assert_eq!(LightLevel::from_raw(100), None);
        assert_eq!(LightLevel::from_raw(120), None);
    }
}
