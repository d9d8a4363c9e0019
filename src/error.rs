//! # MiHome Error Handling
//!
//! This module defines the MiHomeError enum, which represents the different error
//! types that can occur in the mihome-rs crate.

use crate::radio::hal::HalError;
use thiserror::Error;

/// Represents the different error types that can occur in the MiHome crate.
#[derive(Debug, Error)]
pub enum MiHomeError {
    /// No transceiver answered on the bus.
    #[error("Device not found")]
    DeviceNotFound,

    /// The transceiver answered with an unexpected chip identity.
    #[error("Unexpected chip identity: 0x{0:02X}")]
    InvalidDeviceIdentity(u8),

    /// A transient read was skipped; retrying is safe.
    #[error("Sample skipped: {0}")]
    SampleSkipped(String),

    /// A register write was not accepted by the device.
    #[error("Device write error: register 0x{register:02X}")]
    HardwareWriteError { register: u8 },

    /// Bus failure reported by the hardware boundary.
    #[error("Hardware error: {0}")]
    Hardware(#[from] HalError),

    /// A parameter record could not be decoded.
    #[error("Record decode error: {0}")]
    RecordDecodeError(String),

    /// A record value was requested with the wrong type.
    #[error("Type mismatch: {requested} requested from {actual} record")]
    TypeMismatchError {
        requested: &'static str,
        actual: &'static str,
    },

    /// A control frame addressed a socket code that is not defined.
    #[error("Unknown socket code: 0x{0:X}")]
    UnknownSocketError(u8),

    /// No registered protocol accepted the payload.
    #[error("No matching protocol for payload")]
    NoMatchingProtocolError,

    /// A protocol with this name is already registered.
    #[error("Duplicate protocol: {0}")]
    DuplicateProtocolError(String),

    /// The operation was interrupted by a radio reset.
    #[error("Radio was reset")]
    ResetError,

    /// Not every requested repeat was transmitted.
    #[error("Transmit incomplete: {completed} of {requested} repeats sent")]
    TransmitIncomplete { completed: u32, requested: u32 },

    /// An argument was outside the accepted range.
    #[error("Bad parameter: {0}")]
    BadParameter(String),

    /// A payload failed frame-level validation (length, terminator, CRC).
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// A bounded operation did not complete in time.
    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    /// A receive operation is already running on this session.
    #[error("Receive already active")]
    ReceiveActive,

    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),
}
