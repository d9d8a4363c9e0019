//! MiHome Protocol Constants
//!
//! This module defines constants used by the OpenThings (monitor) and OOK
//! (control) radio protocols, and the default wiring of the ENER314-RT board.

use std::time::Duration;

/// OpenThings manufacturer code for Energenie devices
pub const OT_MANUFACTURER_ENERGENIE: u8 = 0x04;

/// Bit set on a parameter identifier for requests (clear for reports)
pub const OT_PARAM_REQUEST_BIT: u8 = 0x80;

/// Mask for the parameter identifier without the request bit
pub const OT_PARAM_MASK: u8 = 0x7F;

/// Record stream terminator
pub const OT_RECORD_TERMINATOR: u8 = 0x00;

/// Bytes preceding the records: manufacturer, product, pip (2), sensor id (3)
pub const OT_HEADER_LENGTH: usize = 7;

/// Bytes covered by the CRC start after length, manufacturer, product and pip
pub const OT_CRC_OFFSET: usize = 5;

/// Largest sensor id that fits the three-byte field
pub const OT_SENSOR_ID_MAX: u32 = 0x00FF_FFFF;

/// Largest value of the record length nibble
pub const OT_RECORD_MAX_LENGTH: usize = 0x0F;

/// Largest OpenThings frame including the length byte
pub const OT_FRAME_MAX_LENGTH: usize = 66;

/// OOK preamble prepended to every control frame
pub const OOK_PREAMBLE: [u8; 4] = [0x80, 0x00, 0x00, 0x00];

/// Encoded nibble for a zero bit in an OOK frame
pub const OOK_BIT_ZERO: u8 = 0x8;

/// Encoded nibble for a one bit in an OOK frame
pub const OOK_BIT_ONE: u8 = 0xE;

/// Number of address bits in an OOK frame
pub const OOK_ADDRESS_BITS: u32 = 20;

/// Largest address that fits the OOK address field
pub const OOK_ADDRESS_MAX: u32 = (1 << OOK_ADDRESS_BITS) - 1;

/// Total OOK frame length: preamble, 10 address bytes, 2 command bytes
pub const OOK_FRAME_LENGTH: usize = 16;

/// Default house address used by Energenie hand-held remotes
pub const OOK_DEFAULT_ADDRESS: u32 = 0x6C6C6;

/// Control frames are repeated with no acknowledgment channel
pub const CONTROL_REPEAT: u32 = 8;

/// Monitor requests are sent once; devices report back
pub const MONITOR_REPEAT: u32 = 1;

/// Gap between repeats so a device can re-arm its receiver
pub const DEFAULT_TX_GAP: Duration = Duration::from_millis(15);

/// Internal timeout for bounded radio operations
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll interval of the receive loop
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Default de-duplication window for repeated transmissions
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_millis(1500);

/// Default per-subscriber queue capacity
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 32;

/// ENER314-RT default wiring (BCM numbering)
pub const DEFAULT_RESET_PIN: u8 = 25;
pub const DEFAULT_LED1_PIN: u8 = 27;
pub const DEFAULT_LED2_PIN: u8 = 22;
pub const DEFAULT_SPI_SLAVE: u8 = 1;
pub const DEFAULT_SPI_SPEED_HZ: u32 = 1_000_000;

/// Largest report interval accepted by monitor devices (seconds)
pub const REPORT_INTERVAL_MAX_SECS: u64 = 0xFFFF;
