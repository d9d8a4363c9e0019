//! # Transport Projection
//!
//! Conversions between the decoded message model and the wire records in
//! [`super::types`]. Record values map onto the wire union by data type:
//!
//! | data type            | wire value |
//! |----------------------|------------|
//! | UDEC_0               | `uint`     |
//! | UDEC_4 ... UDEC_24   | `float`    |
//! | DEC_0                | `int`      |
//! | DEC_8 ... DEC_24     | `float`    |
//! | STRING               | `string`   |
//!
//! Any other type has no wire form and fails the projection.

use super::types::{
    Parameter, ParameterValue, SensorKey, WireMessage, WirePowerMode, WireValveState,
};
use crate::device::{DeviceKey, Manufacturer, Mode, Product, ValveState};
use crate::error::MiHomeError;
use crate::message::{ControlMessage, Message, TelemetryMessage};
use crate::payload::{DataType, ParameterName, ParameterRecord};
use crate::protocol::{OokProtocol, OpenThingsProtocol};
use chrono::{DateTime, Utc};

impl From<DeviceKey> for SensorKey {
    fn from(key: DeviceKey) -> Self {
        let protocol = match key.mode() {
            Mode::Monitor => OpenThingsProtocol::NAME,
            Mode::Control => OokProtocol::NAME,
            Mode::None => "",
        };
        SensorKey {
            protocol: protocol.to_string(),
            manufacturer: key.manufacturer() as u32,
            product: key.product().code() as u32,
            sensor: key.sensor_id(),
        }
    }
}

impl TryFrom<&SensorKey> for DeviceKey {
    type Error = MiHomeError;

    fn try_from(key: &SensorKey) -> Result<Self, Self::Error> {
        let manufacturer = u8::try_from(key.manufacturer)
            .ok()
            .and_then(|code| Manufacturer::try_from(code).ok())
            .ok_or_else(|| {
                MiHomeError::BadParameter(format!("unknown manufacturer {}", key.manufacturer))
            })?;
        let product = u8::try_from(key.product)
            .ok()
            .and_then(|code| Product::try_from(code).ok())
            .ok_or_else(|| MiHomeError::BadParameter(format!("unknown product {}", key.product)))?;
        Ok(DeviceKey::new(manufacturer, product, key.sensor))
    }
}

/// Key of a remote request; a missing key is a bad parameter.
pub fn device_key(key: Option<&SensorKey>) -> Result<DeviceKey, MiHomeError> {
    key.ok_or_else(|| MiHomeError::BadParameter("missing sensor key".to_string()))
        .and_then(DeviceKey::try_from)
}

pub fn to_parameter(record: &ParameterRecord) -> Result<Parameter, MiHomeError> {
    let value = match record.data_type() {
        DataType::UDec0 => ParameterValue::Uint(record.uint_value()?),
        DataType::UDec4
        | DataType::UDec8
        | DataType::UDec12
        | DataType::UDec16
        | DataType::UDec20
        | DataType::UDec24
        | DataType::Dec8
        | DataType::Dec16
        | DataType::Dec24 => ParameterValue::Float(record.float_value()?),
        DataType::Dec0 => ParameterValue::Int(record.int_value()?),
        DataType::String => ParameterValue::String(record.string_value()?),
        other => {
            return Err(MiHomeError::BadParameter(format!(
                "{} record {} has no wire form",
                other,
                record.name()
            )))
        }
    };
    Ok(Parameter {
        name: record.name().as_str().to_string(),
        report: record.is_report(),
        data: record.data().to_vec(),
        value,
    })
}

pub fn to_wire_message(message: &Message) -> Result<WireMessage, MiHomeError> {
    match message {
        Message::Telemetry(m) => telemetry_to_wire(m, message),
        Message::Control(m) => control_to_wire(m, message),
    }
}

fn telemetry_to_wire(m: &TelemetryMessage, message: &Message) -> Result<WireMessage, MiHomeError> {
    let params = m
        .records()
        .iter()
        .map(to_parameter)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(WireMessage {
        sender: m.sender().into(),
        timestamp: DateTime::<Utc>::from(message.timestamp()),
        data: message.raw_payload().to_vec(),
        params,
    })
}

fn control_to_wire(m: &ControlMessage, message: &Message) -> Result<WireMessage, MiHomeError> {
    if m.socket() > 4 {
        return Err(MiHomeError::UnknownSocketError(m.socket()));
    }
    let state = Parameter {
        name: ParameterName::SwitchState.as_str().to_string(),
        report: true,
        data: vec![m.state() as u8],
        value: ParameterValue::Uint(m.state() as u64),
    };
    Ok(WireMessage {
        sender: m.sender().into(),
        timestamp: DateTime::<Utc>::from(message.timestamp()),
        data: message.raw_payload().to_vec(),
        params: vec![state],
    })
}

/// Unspecified states fall back to normal operation.
pub fn valve_state_from_wire(state: WireValveState) -> ValveState {
    match state {
        WireValveState::Open => ValveState::Open,
        WireValveState::Closed => ValveState::Closed,
        WireValveState::Normal | WireValveState::Unspecified => ValveState::Normal,
    }
}

/// True for low power mode.
pub fn low_power_from_wire(mode: WirePowerMode) -> bool {
    mode == WirePowerMode::Low
}
