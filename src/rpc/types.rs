//! # Wire Records
//!
//! Transport-neutral records exchanged with remote callers. They carry plain
//! integers and strings only, so they serialize the same way to JSON and
//! CBOR.

use crate::error::MiHomeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device address on the wire
///
/// The address is the manufacturer, product and sensor integers alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorKey {
    /// Protocol the device speaks, `openthings` or `ook`.
    ///
    /// Derived from the product when a key is produced. It is informational
    /// only: keys received from callers may omit it, and a value that is
    /// present is never used to resolve the device.
    #[serde(default)]
    pub protocol: String,
    pub manufacturer: u32,
    pub product: u32,
    pub sensor: u32,
}

/// Typed parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterValue {
    Uint(u64),
    Int(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name, e.g. `temperature`
    pub name: String,
    /// False when the parameter was requested rather than reported
    pub report: bool,
    /// Raw record bytes
    pub data: Vec<u8>,
    pub value: ParameterValue,
}

/// A received message as seen by remote callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub sender: SensorKey,
    pub timestamp: DateTime<Utc>,
    /// Raw radio payload
    pub data: Vec<u8>,
    pub params: Vec<Parameter>,
}

impl WireMessage {
    pub fn to_json(&self) -> Result<String, MiHomeError> {
        serde_json::to_string(self).map_err(|e| MiHomeError::BadParameter(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, MiHomeError> {
        serde_json::from_str(json).map_err(|e| MiHomeError::BadParameter(e.to_string()))
    }

    #[cfg(feature = "cbor")]
    pub fn to_cbor(&self) -> Result<Vec<u8>, MiHomeError> {
        let mut buffer = Vec::new();
        ciborium::ser::into_writer(self, &mut buffer)
            .map_err(|e| MiHomeError::BadParameter(e.to_string()))?;
        Ok(buffer)
    }

    #[cfg(feature = "cbor")]
    pub fn from_cbor(data: &[u8]) -> Result<Self, MiHomeError> {
        ciborium::de::from_reader(data).map_err(|e| MiHomeError::BadParameter(e.to_string()))
    }
}

/// Valve state as sent by remote callers. Unrecognised names read as
/// `Unspecified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WireValveState {
    Open,
    Closed,
    Normal,
    Unspecified,
}

impl From<String> for WireValveState {
    fn from(name: String) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "OPEN" => WireValveState::Open,
            "CLOSED" => WireValveState::Closed,
            "NORMAL" => WireValveState::Normal,
            _ => WireValveState::Unspecified,
        }
    }
}

impl From<WireValveState> for String {
    fn from(state: WireValveState) -> Self {
        match state {
            WireValveState::Open => "OPEN",
            WireValveState::Closed => "CLOSED",
            WireValveState::Normal => "NORMAL",
            WireValveState::Unspecified => "UNSPECIFIED",
        }
        .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WirePowerMode {
    Low,
    Normal,
    Unspecified,
}

impl From<String> for WirePowerMode {
    fn from(name: String) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "LOW" => WirePowerMode::Low,
            "NORMAL" => WirePowerMode::Normal,
            _ => WirePowerMode::Unspecified,
        }
    }
}

impl From<WirePowerMode> for String {
    fn from(mode: WirePowerMode) -> Self {
        match mode {
            WirePowerMode::Low => "LOW",
            WirePowerMode::Normal => "NORMAL",
            WirePowerMode::Unspecified => "UNSPECIFIED",
        }
        .to_string()
    }
}

/// Commands accepted by `send_command`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandKind {
    SwitchOn,
    SwitchOff,
    Join,
    Identify,
    Diagnostics,
    Exercise,
    BatteryLevel,
    TargetTemperature { celsius: f64 },
    ReportInterval { seconds: u64 },
    ValveState { state: WireValveState },
    PowerMode { mode: WirePowerMode },
}

impl CommandKind {
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::SwitchOn => "switch_on",
            CommandKind::SwitchOff => "switch_off",
            CommandKind::Join => "join",
            CommandKind::Identify => "identify",
            CommandKind::Diagnostics => "diagnostics",
            CommandKind::Exercise => "exercise",
            CommandKind::BatteryLevel => "battery_level",
            CommandKind::TargetTemperature { .. } => "target_temperature",
            CommandKind::ReportInterval { .. } => "report_interval",
            CommandKind::ValveState { .. } => "valve_state",
            CommandKind::PowerMode { .. } => "power_mode",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub sender: SensorKey,
    pub command: CommandKind,
}

/// Reply to a command that went out on the radio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandAck {
    pub sender: SensorKey,
    pub command: String,
    pub timestamp: DateTime<Utc>,
}

/// Selects which messages a stream delivers; empty fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageFilter {
    pub manufacturer: Option<u32>,
    pub product: Option<u32>,
    pub sensor: Option<u32>,
}

impl MessageFilter {
    pub fn matches(&self, message: &WireMessage) -> bool {
        let key = &message.sender;
        self.manufacturer.map_or(true, |m| m == key.manufacturer)
            && self.product.map_or(true, |p| p == key.product)
            && self.sensor.map_or(true, |s| s == key.sensor)
    }
}
