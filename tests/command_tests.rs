//! Tests for building device commands.

use mihome_rs::constants::{CONTROL_REPEAT, MONITOR_REPEAT, OOK_DEFAULT_ADDRESS};
use mihome_rs::error::MiHomeError;
use mihome_rs::protocol::{ook, openthings};
use mihome_rs::{CommandBuilder, Mode, ParameterName, Product, ValveState};
use std::time::Duration;

#[test]
fn test_valve_state_closed_request() {
    let t = CommandBuilder::new()
        .valve_state(Product::Miho013, 0x1234, ValveState::Closed)
        .unwrap();
    assert_eq!(t.mode, Mode::Monitor);
    assert_eq!(t.repeat, MONITOR_REPEAT);

    let (header, records) = openthings::decode_frame(&t.payload).unwrap();
    assert_eq!(header.product, Product::Miho013.code());
    assert_eq!(header.sensor_id, 0x1234);
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.name(), ParameterName::ValveState);
    assert_eq!(record.name().as_str(), "valve-state");
    assert!(!record.is_report());
    assert_eq!(
        ValveState::try_from(record.uint_value().unwrap()).unwrap(),
        ValveState::Closed
    );
}

#[test]
fn test_switch_socket() {
    let t = CommandBuilder::new().switch_on(Product::ControlThree, 0).unwrap();
    assert_eq!(t.mode, Mode::Control);
    assert_eq!(t.repeat, CONTROL_REPEAT);
    assert_eq!(
        ook::decode_frame(&t.payload).unwrap(),
        (OOK_DEFAULT_ADDRESS, 3, true)
    );

    let t = CommandBuilder::new()
        .switch_off(Product::ControlAll, 0x12345)
        .unwrap();
    assert_eq!(ook::decode_frame(&t.payload).unwrap(), (0x12345, 0, false));
}

#[test]
fn test_switch_monitor_plug() {
    let t = CommandBuilder::new().switch_on(Product::Miho005, 0x42).unwrap();
    assert_eq!(t.mode, Mode::Monitor);
    let (_, records) = openthings::decode_frame(&t.payload).unwrap();
    assert_eq!(records[0].name(), ParameterName::SwitchState);
    assert!(records[0].bool_value().unwrap());
}

#[test]
fn test_report_interval_in_seconds() {
    let t = CommandBuilder::new()
        .report_interval(Product::Miho013, 7, Duration::from_secs(300))
        .unwrap();
    let (_, records) = openthings::decode_frame(&t.payload).unwrap();
    assert_eq!(records[0].name(), ParameterName::ReportPeriod);
    assert_eq!(records[0].uint_value().unwrap(), 300);

    let builder = CommandBuilder::new();
    assert!(matches!(
        builder.report_interval(Product::Miho013, 7, Duration::from_millis(500)),
        Err(MiHomeError::BadParameter(_))
    ));
    assert!(matches!(
        builder.report_interval(Product::Miho013, 7, Duration::from_secs(0x1_0000)),
        Err(MiHomeError::BadParameter(_))
    ));
}

#[test]
fn test_target_temperature() {
    let t = CommandBuilder::new()
        .target_temperature(Product::Miho013, 7, 19.5)
        .unwrap();
    let (_, records) = openthings::decode_frame(&t.payload).unwrap();
    assert_eq!(records[0].name(), ParameterName::Temperature);
    assert_eq!(records[0].float_value().unwrap(), 19.5);
    assert!(!records[0].is_report());
}

#[test]
fn test_empty_requests() {
    let builder = CommandBuilder::new();
    let cases = [
        (builder.join(Product::Miho032, 1).unwrap(), ParameterName::Join),
        (builder.identify(Product::Miho013, 1).unwrap(), ParameterName::Identify),
        (builder.diagnostics(Product::Miho013, 1).unwrap(), ParameterName::Diagnostics),
        (builder.exercise(Product::Miho013, 1).unwrap(), ParameterName::ExerciseValve),
        (builder.battery_level(Product::Miho013, 1).unwrap(), ParameterName::BatteryLevel),
    ];
    for (t, name) in cases {
        let (_, records) = openthings::decode_frame(&t.payload).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name(), name);
        assert!(records[0].data().is_empty());
        assert!(!records[0].is_report());
    }
}

#[test]
fn test_requests_need_monitor_products() {
    let builder = CommandBuilder::new();
    assert!(matches!(
        builder.identify(Product::ControlOne, 1),
        Err(MiHomeError::BadParameter(_))
    ));
    assert!(matches!(
        builder.switch_on(Product::None, 1),
        Err(MiHomeError::BadParameter(_))
    ));
    assert!(matches!(
        builder.low_power_mode(Product::Miho013, 0x0100_0000, true),
        Err(MiHomeError::BadParameter(_))
    ));
}
