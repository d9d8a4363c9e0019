//! # mihome-rs - A Rust Crate for the Energenie MiHome Radio Protocols
//!
//! The mihome-rs crate talks to Energenie MiHome devices through an RFM69
//! transceiver (the ENER314-RT board on a Raspberry Pi). Two device families
//! share the 433 MHz band:
//!
//! - **Monitor** devices (energy monitors, radiator valves, motion and door
//!   sensors) speak OpenThings over FSK: CRC protected frames carrying typed
//!   parameter records.
//! - **Control** devices (on/off sockets) understand a fixed 16-byte OOK
//!   frame with a 20-bit house address and a socket number.
//!
//! ## Features
//!
//! - Encode and decode OpenThings records with every fixed-point data type
//! - Decode received payloads through an ordered protocol registry
//! - Share one half-duplex radio between a long running receive loop and
//!   on-demand sends, resets and temperature reads
//! - Build switch, join and monitor request payloads
//! - Project decoded messages onto transport-neutral wire records
//!
//! ## Usage
//!
//! ```rust
//! use mihome_rs::decode_payload;
//!
//! let frame = [
//!     0x0E, 0x04, 0x03, 0x00, 0x00, 0x00, 0x12, 0x34, 0x74, 0x92, 0x15, 0x80, 0x00, 0x00, 0x00,
//! ];
//! // the trailing CRC above is not valid, so the payload is rejected
//! assert!(decode_payload(&frame).is_err());
//! ```
//!
//! Against a radio, open a [`MiHome`] gateway and run it:
//!
//! ```rust,no_run
//! use mihome_rs::{GatewayConfig, MiHome, MockHal, Mode};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), mihome_rs::MiHomeError> {
//! let gateway = MiHome::open(MockHal::new(), GatewayConfig::default()).await?;
//! let mut messages = gateway.subscribe();
//! let cancel = CancellationToken::new();
//! let runner = gateway.clone();
//! tokio::spawn(async move { runner.run(Mode::Monitor, cancel, None).await });
//! while let Some(message) = messages.recv().await {
//!     println!("{message}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod message;
pub mod payload;
pub mod protocol;
pub mod radio;
pub mod rpc;
pub mod util;

pub use crate::error::MiHomeError;
pub use crate::logging::{init_logger, init_logger_with_level};

// Core model
pub use command::{CommandBuilder, Transmission};
pub use config::GatewayConfig;
pub use device::{DeviceKey, Manufacturer, Mode, Product, ValveState};
pub use gateway::{GatewayStats, MiHome};
pub use message::{ControlMessage, Message, TelemetryMessage};
pub use payload::{DataType, FieldType, ParameterName, ParameterRecord, RecordValue};
pub use protocol::{OokProtocol, OpenThingsProtocol, Protocol, ProtocolRegistry};

// Radio
pub use radio::{Hal, HalError, MockHal, RadioPins, RadioSession, Rfm69, SessionConfig};

/// Decodes one raw radio payload with the default protocols.
///
/// # Arguments
/// * `payload` - Bytes as read from the radio FIFO
///
/// # Returns
/// * `Ok(Message)` - Decoded telemetry or control message
/// * `Err(MiHomeError::NoMatchingProtocolError)` - No protocol accepted it
pub fn decode_payload(payload: &[u8]) -> Result<Message, MiHomeError> {
    ProtocolRegistry::with_defaults().decode(&bytes::Bytes::copy_from_slice(payload))
}
