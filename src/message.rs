//! # Messages
//!
//! The two message variants produced by decoding a radio payload:
//! telemetry from OpenThings (monitor) devices and on/off frames from OOK
//! (control) sockets. Messages are immutable once built and are handed to
//! subscribers by value.
//!
//! Timestamps are never part of duplicate detection; callers that want to
//! collapse retransmission bursts compare timestamps against their own window.

use crate::device::{DeviceKey, Mode, Product};
use crate::payload::record::ParameterRecord;
use bytes::Bytes;
use std::fmt;
use std::time::{Duration, SystemTime};

/// Telemetry or request payload from a monitor device
#[derive(Debug, Clone)]
pub struct TelemetryMessage {
    sender: DeviceKey,
    timestamp: SystemTime,
    records: Vec<ParameterRecord>,
    raw_payload: Bytes,
}

impl TelemetryMessage {
    pub fn new(
        sender: DeviceKey,
        timestamp: SystemTime,
        records: Vec<ParameterRecord>,
        raw_payload: Bytes,
    ) -> Self {
        Self {
            sender,
            timestamp,
            records,
            raw_payload,
        }
    }

    pub fn sender(&self) -> DeviceKey {
        self.sender
    }

    pub fn records(&self) -> &[ParameterRecord] {
        &self.records
    }

    /// First record with the given name, if any
    pub fn record(&self, name: crate::payload::ParameterName) -> Option<&ParameterRecord> {
        self.records.iter().find(|r| r.name() == name)
    }

    pub fn is_duplicate(&self, other: &TelemetryMessage) -> bool {
        self.sender == other.sender
            && self.records.len() == other.records.len()
            && self
                .records
                .iter()
                .zip(other.records.iter())
                .all(|(a, b)| a.is_duplicate(b))
    }
}

/// On/off frame for a control socket
#[derive(Debug, Clone)]
pub struct ControlMessage {
    addr: u32,
    socket: u8,
    state: bool,
    timestamp: SystemTime,
    raw_payload: Bytes,
}

impl ControlMessage {
    pub fn new(addr: u32, socket: u8, state: bool, timestamp: SystemTime, raw_payload: Bytes) -> Self {
        Self {
            addr,
            socket,
            state,
            timestamp,
            raw_payload,
        }
    }

    /// House address
    pub fn addr(&self) -> u32 {
        self.addr
    }

    pub fn socket(&self) -> u8 {
        self.socket
    }

    pub fn state(&self) -> bool {
        self.state
    }

    /// Control product addressed by the socket number
    pub fn product(&self) -> Product {
        Product::from_socket(self.socket)
    }

    /// Key of the addressed socket, using the house address as sensor id
    pub fn sender(&self) -> DeviceKey {
        DeviceKey::energenie(self.product(), self.addr)
    }

    pub fn is_duplicate(&self, other: &ControlMessage) -> bool {
        self.addr == other.addr && self.socket == other.socket && self.state == other.state
    }
}

/// A decoded radio payload
#[derive(Debug, Clone)]
pub enum Message {
    Telemetry(TelemetryMessage),
    Control(ControlMessage),
}

impl Message {
    pub fn timestamp(&self) -> SystemTime {
        match self {
            Message::Telemetry(m) => m.timestamp,
            Message::Control(m) => m.timestamp,
        }
    }

    pub fn raw_payload(&self) -> &Bytes {
        match self {
            Message::Telemetry(m) => &m.raw_payload,
            Message::Control(m) => &m.raw_payload,
        }
    }

    pub fn sender(&self) -> DeviceKey {
        match self {
            Message::Telemetry(m) => m.sender(),
            Message::Control(m) => m.sender(),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Message::Telemetry(_) => Mode::Monitor,
            Message::Control(_) => Mode::Control,
        }
    }

    /// Same variant, same sender and byte-identical content.
    pub fn is_duplicate(&self, other: &Message) -> bool {
        match (self, other) {
            (Message::Telemetry(a), Message::Telemetry(b)) => a.is_duplicate(b),
            (Message::Control(a), Message::Control(b)) => a.is_duplicate(b),
            _ => false,
        }
    }

    /// Duplicate of `other` and observed within `window` of it.
    pub fn is_repeat_of(&self, other: &Message, window: Duration) -> bool {
        if !self.is_duplicate(other) {
            return false;
        }
        let elapsed = self
            .timestamp()
            .duration_since(other.timestamp())
            .or_else(|_| other.timestamp().duration_since(self.timestamp()))
            .unwrap_or_default();
        elapsed <= window
    }
}

impl From<TelemetryMessage> for Message {
    fn from(m: TelemetryMessage) -> Self {
        Message::Telemetry(m)
    }
}

impl From<ControlMessage> for Message {
    fn from(m: ControlMessage) -> Self {
        Message::Control(m)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Telemetry(m) => {
                write!(f, "telemetry from {}:", m.sender)?;
                for record in &m.records {
                    write!(f, " {record}")?;
                }
                Ok(())
            }
            Message::Control(m) => write!(
                f,
                "control addr=0x{:05X} socket={} state={}",
                m.addr,
                m.socket,
                if m.state { "on" } else { "off" }
            ),
        }
    }
}
