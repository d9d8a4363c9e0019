//! # RFM69 Register Definitions and Constants
//!
//! Register addresses, operating modes and IRQ flags for the HopeRF RFM69
//! transceiver on the ENER314-RT board, plus the two modem profiles used by
//! MiHome devices:
//! - FSK at 434.3 MHz for OpenThings monitor devices
//! - OOK at 433.92 MHz for control sockets

use bitflags::bitflags;

// =============================================================================
// RFM69 Register Addresses
// =============================================================================

/// FIFO read/write access register
pub const REG_FIFO: u8 = 0x00;

/// Operating mode
pub const REG_OPMODE: u8 = 0x01;

/// Data processing mode and modulation scheme
pub const REG_DATAMODUL: u8 = 0x02;

pub const REG_BITRATEMSB: u8 = 0x03;
pub const REG_BITRATELSB: u8 = 0x04;
pub const REG_FDEVMSB: u8 = 0x05;
pub const REG_FDEVLSB: u8 = 0x06;
pub const REG_FRFMSB: u8 = 0x07;
pub const REG_FRFMID: u8 = 0x08;
pub const REG_FRFLSB: u8 = 0x09;

/// AFC control in low modulation index situations
pub const REG_AFCCTRL: u8 = 0x0B;

/// Chip version (read-only)
pub const REG_VERSION: u8 = 0x10;

/// PA selection and output power control
pub const REG_PALEVEL: u8 = 0x11;

/// LNA settings
pub const REG_LNA: u8 = 0x18;

/// Channel filter bandwidth control
pub const REG_RXBW: u8 = 0x19;

/// Status register: mode ready, PLL lock, RSSI
pub const REG_IRQFLAGS1: u8 = 0x27;

/// Status register: FIFO handling flags
pub const REG_IRQFLAGS2: u8 = 0x28;

pub const REG_PREAMBLEMSB: u8 = 0x2C;
pub const REG_PREAMBLELSB: u8 = 0x2D;

/// Sync word recognition control
pub const REG_SYNCCONFIG: u8 = 0x2E;
pub const REG_SYNCVALUE1: u8 = 0x2F;
pub const REG_SYNCVALUE2: u8 = 0x30;

/// Packet format and length mode
pub const REG_PACKETCONFIG1: u8 = 0x37;

/// Maximum (variable) or exact (fixed) payload length
pub const REG_PAYLOADLENGTH: u8 = 0x38;

/// Node address
pub const REG_NODEADRS: u8 = 0x39;

/// FIFO threshold, TX start condition
pub const REG_FIFOTHRESH: u8 = 0x3C;

/// Temperature sensor control
pub const REG_TEMP1: u8 = 0x4E;

/// Temperature sensor value
pub const REG_TEMP2: u8 = 0x4F;

// =============================================================================
// Operating Modes
// =============================================================================

/// Operating mode bit patterns for REG_OPMODE
pub const RF_OPMODE_SLEEP: u8 = 0x00;
pub const RF_OPMODE_STANDBY: u8 = 0x04;
pub const RF_OPMODE_TRANSMITTER: u8 = 0x0C;
pub const RF_OPMODE_RECEIVER: u8 = 0x10;

/// Bits of REG_OPMODE holding the mode
pub const RF_OPMODE_MASK: u8 = 0x1C;

// =============================================================================
// IRQ Flags
// =============================================================================

bitflags! {
    /// Flags in REG_IRQFLAGS1
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqFlags1: u8 {
        const SYNC_ADDRESS_MATCH = 0x01;
        const AUTO_MODE = 0x02;
        const TIMEOUT = 0x04;
        const RSSI = 0x08;
        const PLL_LOCK = 0x10;
        const TX_READY = 0x20;
        const RX_READY = 0x40;
        const MODE_READY = 0x80;
    }
}

bitflags! {
    /// Flags in REG_IRQFLAGS2
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqFlags2: u8 {
        const LOW_BAT = 0x01;
        const CRC_OK = 0x02;
        const PAYLOAD_READY = 0x04;
        const PACKET_SENT = 0x08;
        /// Writing this bit clears the FIFO
        const FIFO_OVERRUN = 0x10;
        const FIFO_LEVEL = 0x20;
        const FIFO_NOT_EMPTY = 0x40;
        const FIFO_FULL = 0x80;
    }
}

/// Start a temperature measurement (REG_TEMP1)
pub const RF_TEMP1_MEAS_START: u8 = 0x08;

/// A temperature measurement is in progress (REG_TEMP1)
pub const RF_TEMP1_MEAS_RUNNING: u8 = 0x04;

// =============================================================================
// Chip Identity
// =============================================================================

/// Expected contents of REG_VERSION
pub const RF_VERSION: u8 = 0x24;

// =============================================================================
// Modem Profiles
// =============================================================================

/// RF frequency step (32 MHz / 2^19)
pub const FSTEP: f64 = 61.03515625;

/// OpenThings carrier
pub const FSK_FREQUENCY: f64 = 434.3e6;

/// Control socket carrier
pub const OOK_FREQUENCY: f64 = 433.92e6;

/// Packet mode, FSK, no shaping
pub const RF_DATAMODUL_FSK: u8 = 0x00;

/// Packet mode, OOK, no shaping
pub const RF_DATAMODUL_OOK: u8 = 0x08;

/// 4800 bps
pub const RF_BITRATEMSB_4800: u8 = 0x1A;
pub const RF_BITRATELSB_4800: u8 = 0x0B;

/// 30 kHz deviation
pub const RF_FDEVMSB_30000: u8 = 0x01;
pub const RF_FDEVLSB_30000: u8 = 0xEC;

/// OpenThings sync word
pub const FSK_SYNC_WORD: [u8; 2] = [0x2D, 0xD4];

/// Sync on, two byte sync word
pub const RF_SYNCCONFIG_ON_2: u8 = 0x88;
pub const RF_SYNCCONFIG_OFF: u8 = 0x00;

/// Variable length, Manchester, no chip CRC
pub const RF_PACKETCONFIG1_FSK: u8 = 0xA0;

/// Fixed length, no encoding, no chip CRC
pub const RF_PACKETCONFIG1_OOK: u8 = 0x00;

/// TX starts as soon as the FIFO is not empty
pub const RF_FIFOTHRESH_TXSTART_NOT_EMPTY: u8 = 0x81;

/// FIFO size in bytes
pub const FIFO_SIZE: usize = 66;

/// Carrier frequency as the three FRF register bytes
pub fn frequency_registers(frequency_hz: f64) -> [u8; 3] {
    let frf = (frequency_hz / FSTEP).round() as u32;
    [(frf >> 16) as u8, (frf >> 8) as u8, frf as u8]
}
