//! Tests for device keys, the product/socket mapping and message de-duplication.

use bytes::Bytes;
use mihome_rs::payload::{DataType, FieldType, ParameterName, ParameterRecord, RecordValue};
use mihome_rs::{ControlMessage, DeviceKey, Manufacturer, Message, Mode, Product, TelemetryMessage};
use std::time::{Duration, SystemTime};

fn temperature(value: f64) -> ParameterRecord {
    ParameterRecord::from_value(
        ParameterName::Temperature,
        true,
        FieldType::new(DataType::Dec8, 2).unwrap(),
        &RecordValue::Float(value),
    )
    .unwrap()
}

fn telemetry(sensor_id: u32, value: f64, at: SystemTime) -> Message {
    TelemetryMessage::new(
        DeviceKey::energenie(Product::Miho013, sensor_id),
        at,
        vec![temperature(value)],
        Bytes::new(),
    )
    .into()
}

#[test]
fn test_mode_parsing() {
    assert_eq!("monitor".parse::<Mode>().unwrap(), Mode::Monitor);
    assert_eq!("MIHOME_MODE_CONTROL".parse::<Mode>().unwrap(), Mode::Control);
    let err = "fsk".parse::<Mode>().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Bad parameter: Invalid mode 'fsk'. Possible values are none, monitor, control"
    );
}

#[test]
fn test_unknown_product_is_socket_zero() {
    assert_eq!(Product::Miho005.socket(), 0);
    assert_eq!(Product::None.socket(), 0);
    assert_eq!(Product::ControlFour.socket(), 4);
}

#[test]
fn test_device_key_accessors() {
    let key = DeviceKey::new(Manufacturer::Energenie, Product::ControlTwo, 0x6C6C6);
    assert_eq!(key.mode(), Mode::Control);
    assert_eq!(key.socket(), 2);
    assert_eq!(key.sensor_id(), 0x6C6C6);
}

#[test]
fn test_duplicate_is_reflexive_and_symmetric() {
    let now = SystemTime::now();
    let a = telemetry(0x1234, 21.5, now);
    let b = telemetry(0x1234, 21.5, now + Duration::from_millis(200));
    assert!(a.is_duplicate(&a));
    assert!(a.is_duplicate(&b));
    assert!(b.is_duplicate(&a));
}

#[test]
fn test_duplicate_ignores_timestamp_but_window_does_not() {
    let now = SystemTime::now();
    let a = telemetry(0x1234, 21.5, now);
    let late = telemetry(0x1234, 21.5, now + Duration::from_secs(60));
    assert!(a.is_duplicate(&late));
    assert!(!late.is_repeat_of(&a, Duration::from_secs(2)));
    assert!(late.is_repeat_of(&a, Duration::from_secs(120)));
}

#[test]
fn test_different_content_is_not_duplicate() {
    let now = SystemTime::now();
    let a = telemetry(0x1234, 21.5, now);
    assert!(!a.is_duplicate(&telemetry(0x1234, 22.0, now)));
    assert!(!a.is_duplicate(&telemetry(0x1235, 21.5, now)));

    let on: Message = ControlMessage::new(0x6C6C6, 1, true, now, Bytes::new()).into();
    let off: Message = ControlMessage::new(0x6C6C6, 1, false, now, Bytes::new()).into();
    assert!(!on.is_duplicate(&off));
    assert!(!on.is_duplicate(&a));
}

#[test]
fn test_control_sender() {
    let m = ControlMessage::new(0x6C6C6, 3, true, SystemTime::now(), Bytes::new());
    assert_eq!(m.product(), Product::ControlThree);
    assert_eq!(m.sender(), DeviceKey::energenie(Product::ControlThree, 0x6C6C6));
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_socket_bijection(socket in 0u8..=4) {
            let product = Product::from_socket(socket);
            prop_assert_eq!(product.mode(), Mode::Control);
            prop_assert_eq!(product.socket(), socket);
        }

        #[test]
        fn prop_product_codes_round_trip(code in any::<u8>()) {
            if let Ok(product) = Product::try_from(code) {
                prop_assert_eq!(product.code(), code);
            }
        }
    }
}
