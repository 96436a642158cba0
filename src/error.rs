//! Error types for the safera-sense library.

use thiserror::Error;
use uuid::Uuid;

/// The main error type for safera-sense operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The Bluetooth adapter or stack cannot be used right now.
    #[error("bluetooth transport unavailable: {reason}")]
    TransportUnavailable { reason: String },

    /// No device with the requested address answered the scan.
    #[error("device not found: {address}")]
    DeviceNotFound { address: String },

    /// Operation attempted while the session is not active.
    #[error("not connected")]
    NotConnected,

    /// Payload decoding error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The device does not expose the requested characteristic.
    #[error("characteristic {uuid} not supported by this device")]
    UnsupportedCharacteristic { uuid: Uuid },

    /// Command intent outside the known level or opcode tables.
    #[error("invalid command intent: {reason}")]
    InvalidCommandIntent { reason: String },

    /// Operation timed out.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Transient GATT failure reported by the Bluetooth stack.
    #[error("transport error: {message}")]
    Transport { message: String },
}

impl Error {
    /// Returns true if retrying the same operation later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransportUnavailable { .. } | Self::Timeout { .. } | Self::Transport { .. }
        )
    }

    pub(crate) fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl From<btleplug::Error> for Error {
    fn from(err: btleplug::Error) -> Self {
        match err {
            btleplug::Error::NotConnected => Self::NotConnected,
            btleplug::Error::DeviceNotFound => Self::DeviceNotFound {
                address: String::new(),
            },
            btleplug::Error::PermissionDenied => Self::TransportUnavailable {
                reason: "permission denied".into(),
            },
            btleplug::Error::NotSupported(reason) => Self::TransportUnavailable { reason },
            btleplug::Error::TimedOut(duration) => Self::timeout(duration),
            other => Self::Transport {
                message: other.to_string(),
            },
        }
    }
}

/// Payload decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Payload shorter than the minimum layout for its message shape.
    #[error("{shape} payload too short: need at least {need} bytes, got {got}")]
    TooShort {
        shape: &'static str,
        need: usize,
        got: usize,
    },
}

/// Result type alias for safera-sense operations.
pub type Result<T> = std::result::Result<T, Error>;
