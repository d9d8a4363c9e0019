//! # Command Builder
//!
//! Turns device commands into a raw payload plus how to send it.
//!
//! Control sockets have no acknowledgment channel, so on/off frames are
//! repeated [`CONTROL_REPEAT`] times. Monitor devices get a single OpenThings
//! request carrying one record with the request bit set. Battery powered
//! monitors (the eTRV in particular) only listen briefly after they report,
//! so requests should be sent as soon as a report arrives; the builder adds
//! no delay of its own.

use crate::constants::{
    CONTROL_REPEAT, MONITOR_REPEAT, OOK_DEFAULT_ADDRESS, REPORT_INTERVAL_MAX_SECS,
};
use crate::device::{DeviceKey, Mode, Product, ValveState};
use crate::error::MiHomeError;
use crate::payload::record::{DataType, FieldType, ParameterName, ParameterRecord, RecordValue};
use crate::protocol::{ook, openthings};
use std::fmt;
use std::time::Duration;

/// A payload ready for [`crate::radio::RadioSession::send`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    pub payload: Vec<u8>,
    pub repeat: u32,
    pub mode: Mode,
}

impl fmt::Display for Transmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} x{} {}",
            hex::encode_upper(&self.payload),
            self.repeat,
            self.mode
        )
    }
}

/// Builds transmissions for MiHome devices
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandBuilder;

impl CommandBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Switch a socket or a monitor plug on or off.
    ///
    /// For control products `sensor_id` is the 20-bit house address; zero
    /// selects the default address of Energenie remotes.
    pub fn switch(&self, product: Product, sensor_id: u32, on: bool) -> Result<Transmission, MiHomeError> {
        match product.mode() {
            Mode::Control => {
                let addr = if sensor_id == 0 {
                    OOK_DEFAULT_ADDRESS
                } else {
                    sensor_id
                };
                Ok(Transmission {
                    payload: ook::encode_frame(addr, product.socket(), on)?,
                    repeat: CONTROL_REPEAT,
                    mode: Mode::Control,
                })
            }
            Mode::Monitor => self.request(
                product,
                sensor_id,
                ParameterName::SwitchState,
                FieldType::new(DataType::UDec0, 1)?,
                Some(RecordValue::Uint(on as u64)),
            ),
            Mode::None => Err(unsupported(product)),
        }
    }

    pub fn switch_on(&self, product: Product, sensor_id: u32) -> Result<Transmission, MiHomeError> {
        self.switch(product, sensor_id, true)
    }

    pub fn switch_off(&self, product: Product, sensor_id: u32) -> Result<Transmission, MiHomeError> {
        self.switch(product, sensor_id, false)
    }

    /// Acknowledge a join request.
    pub fn join(&self, product: Product, sensor_id: u32) -> Result<Transmission, MiHomeError> {
        self.empty_request(product, sensor_id, ParameterName::Join)
    }

    pub fn identify(&self, product: Product, sensor_id: u32) -> Result<Transmission, MiHomeError> {
        self.empty_request(product, sensor_id, ParameterName::Identify)
    }

    pub fn diagnostics(&self, product: Product, sensor_id: u32) -> Result<Transmission, MiHomeError> {
        self.empty_request(product, sensor_id, ParameterName::Diagnostics)
    }

    /// Run the valve through its full travel
    pub fn exercise(&self, product: Product, sensor_id: u32) -> Result<Transmission, MiHomeError> {
        self.empty_request(product, sensor_id, ParameterName::ExerciseValve)
    }

    pub fn battery_level(&self, product: Product, sensor_id: u32) -> Result<Transmission, MiHomeError> {
        self.empty_request(product, sensor_id, ParameterName::BatteryLevel)
    }

    /// Target temperature in degrees Celsius, sent as DEC_8.
    pub fn target_temperature(
        &self,
        product: Product,
        sensor_id: u32,
        celsius: f64,
    ) -> Result<Transmission, MiHomeError> {
        if !celsius.is_finite() {
            return Err(MiHomeError::BadParameter(format!(
                "invalid temperature {celsius}"
            )));
        }
        self.request(
            product,
            sensor_id,
            ParameterName::Temperature,
            FieldType::new(DataType::Dec8, 2)?,
            Some(RecordValue::Float(celsius)),
        )
    }

    /// Reporting interval, sent in whole seconds.
    pub fn report_interval(
        &self,
        product: Product,
        sensor_id: u32,
        interval: Duration,
    ) -> Result<Transmission, MiHomeError> {
        let secs = interval.as_secs();
        if secs == 0 || secs > REPORT_INTERVAL_MAX_SECS {
            return Err(MiHomeError::BadParameter(format!(
                "report interval {interval:?} outside 1s..={REPORT_INTERVAL_MAX_SECS}s"
            )));
        }
        self.request(
            product,
            sensor_id,
            ParameterName::ReportPeriod,
            FieldType::new(DataType::UDec0, 2)?,
            Some(RecordValue::Uint(secs)),
        )
    }

    pub fn valve_state(
        &self,
        product: Product,
        sensor_id: u32,
        state: ValveState,
    ) -> Result<Transmission, MiHomeError> {
        self.request(
            product,
            sensor_id,
            ParameterName::ValveState,
            FieldType::new(DataType::UDec0, 1)?,
            Some(RecordValue::Uint(state as u64)),
        )
    }

    pub fn low_power_mode(
        &self,
        product: Product,
        sensor_id: u32,
        enabled: bool,
    ) -> Result<Transmission, MiHomeError> {
        self.request(
            product,
            sensor_id,
            ParameterName::LowPowerMode,
            FieldType::new(DataType::UDec0, 1)?,
            Some(RecordValue::Uint(enabled as u64)),
        )
    }

    fn empty_request(
        &self,
        product: Product,
        sensor_id: u32,
        name: ParameterName,
    ) -> Result<Transmission, MiHomeError> {
        self.request(product, sensor_id, name, FieldType::new(DataType::UDec0, 0)?, None)
    }

    fn request(
        &self,
        product: Product,
        sensor_id: u32,
        name: ParameterName,
        field: FieldType,
        value: Option<RecordValue>,
    ) -> Result<Transmission, MiHomeError> {
        if product.mode() != Mode::Monitor {
            return Err(unsupported(product));
        }
        let record = match value {
            Some(value) => ParameterRecord::from_value(name, false, field, &value)?,
            None => ParameterRecord::empty(name, false),
        };
        let key = DeviceKey::energenie(product, sensor_id);
        Ok(Transmission {
            payload: openthings::encode_frame(key, &[record])?,
            repeat: MONITOR_REPEAT,
            mode: Mode::Monitor,
        })
    }
}

fn unsupported(product: Product) -> MiHomeError {
    MiHomeError::BadParameter(format!("command not supported by {product}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_switch() {
        let tx = CommandBuilder::new().switch_on(Product::ControlTwo, 0).unwrap();
        assert_eq!(tx.mode, Mode::Control);
        assert_eq!(tx.repeat, CONTROL_REPEAT);
        assert_eq!(
            ook::decode_frame(&tx.payload).unwrap(),
            (OOK_DEFAULT_ADDRESS, 2, true)
        );
    }

    #[test]
    fn test_monitor_switch() {
        let tx = CommandBuilder::new().switch_off(Product::Miho005, 0x42).unwrap();
        assert_eq!(tx.mode, Mode::Monitor);
        assert_eq!(tx.repeat, MONITOR_REPEAT);
        let (header, records) = openthings::decode_frame(&tx.payload).unwrap();
        assert_eq!(header.sensor_id, 0x42);
        assert_eq!(records[0].name(), ParameterName::SwitchState);
        assert!(!records[0].bool_value().unwrap());
    }

    #[test]
    fn test_report_interval_range() {
        let builder = CommandBuilder::new();
        assert!(builder
            .report_interval(Product::Miho013, 1, Duration::from_millis(500))
            .is_err());
        assert!(builder
            .report_interval(Product::Miho013, 1, Duration::from_secs(0x1_0000))
            .is_err());
        let tx = builder
            .report_interval(Product::Miho013, 1, Duration::from_secs(300))
            .unwrap();
        let (_, records) = openthings::decode_frame(&tx.payload).unwrap();
        assert_eq!(records[0].uint_value().unwrap(), 300);
    }

    #[test]
    fn test_monitor_request_on_control_product() {
        let err = CommandBuilder::new()
            .identify(Product::ControlOne, 1)
            .unwrap_err();
        assert!(matches!(err, MiHomeError::BadParameter(_)));
    }
}
