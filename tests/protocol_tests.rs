//! Tests for the OpenThings and OOK codecs and the protocol registry.

use bytes::Bytes;
use mihome_rs::error::MiHomeError;
use mihome_rs::payload::{DataType, FieldType, ParameterName, ParameterRecord, RecordValue};
use mihome_rs::protocol::{ook, openthings};
use mihome_rs::{DeviceKey, Message, Product, Protocol, ProtocolRegistry};
use std::sync::Arc;

/// Frame with a valid length, terminator and CRC around `body`
fn frame_with_body(body: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8];
    frame.extend_from_slice(body);
    frame.push(0x00);
    let crc = openthings::crc16(&frame[5..]);
    frame.extend_from_slice(&crc.to_be_bytes());
    frame[0] = (frame.len() - 1) as u8;
    frame
}

fn power_report() -> Vec<u8> {
    let key = DeviceKey::energenie(Product::Miho004, 0x00_0A_BC);
    let records = vec![
        ParameterRecord::from_value(
            ParameterName::RealPower,
            true,
            FieldType::new(DataType::Dec0, 2).unwrap(),
            &RecordValue::Int(-12),
        )
        .unwrap(),
        ParameterRecord::from_value(
            ParameterName::Voltage,
            true,
            FieldType::new(DataType::UDec0, 1).unwrap(),
            &RecordValue::Uint(241),
        )
        .unwrap(),
    ];
    openthings::encode_frame(key, &records).unwrap()
}

#[test]
fn test_registry_default_order() {
    let registry = ProtocolRegistry::with_defaults();
    assert_eq!(registry.protos(), vec!["openthings", "ook"]);
}

#[test]
fn test_decode_openthings_report() {
    let registry = ProtocolRegistry::with_defaults();
    let message = registry.decode(&Bytes::from(power_report())).unwrap();
    let Message::Telemetry(telemetry) = message else {
        panic!("expected telemetry");
    };
    assert_eq!(
        telemetry.sender(),
        DeviceKey::energenie(Product::Miho004, 0xABC)
    );
    assert_eq!(telemetry.records().len(), 2);
    let power = telemetry.record(ParameterName::RealPower).unwrap();
    assert!(power.is_report());
    assert_eq!(power.int_value().unwrap(), -12);
    let voltage = telemetry.record(ParameterName::Voltage).unwrap();
    assert_eq!(voltage.uint_value().unwrap(), 241);
}

#[test]
fn test_decode_ook_switch() {
    let registry = ProtocolRegistry::with_defaults();
    let frame = ook::encode_frame(0x6C6C6, 2, false).unwrap();
    let message = registry.decode(&Bytes::from(frame)).unwrap();
    let Message::Control(control) = message else {
        panic!("expected control message");
    };
    assert_eq!(control.addr(), 0x6C6C6);
    assert_eq!(control.socket(), 2);
    assert!(!control.state());
    assert_eq!(control.product(), Product::ControlTwo);
}

#[test]
fn test_record_width_mismatch_in_frame() {
    // temperature declared UDEC_8 width 1, followed by two stray bytes
    let frame = frame_with_body(&[
        0x04, 0x03, 0x00, 0x00, 0x00, 0x12, 0x34, 0x74, 0x21, 0x15, 0x80, 0x00,
    ]);
    assert!(matches!(
        openthings::decode_frame(&frame),
        Err(MiHomeError::RecordDecodeError(_))
    ));
    let registry = ProtocolRegistry::with_defaults();
    assert!(matches!(
        registry.decode(&Bytes::from(frame)),
        Err(MiHomeError::NoMatchingProtocolError)
    ));
}

#[test]
fn test_frame_without_records_is_rejected() {
    let frame = frame_with_body(&[0x04, 0x03, 0x00, 0x00, 0x00, 0x12, 0x34]);
    assert!(matches!(
        openthings::decode_frame(&frame),
        Err(MiHomeError::RecordDecodeError(_))
    ));
}

#[test]
fn test_corrupted_crc_is_rejected() {
    let mut frame = power_report();
    let last = frame.len() - 1;
    frame[last] ^= 0x01;
    assert!(matches!(
        openthings::decode_frame(&frame),
        Err(MiHomeError::InvalidFrame(_))
    ));
}

#[test]
fn test_garbage_matches_nothing() {
    let registry = ProtocolRegistry::with_defaults();
    let result = registry.decode(&Bytes::from_static(&[0x01, 0x02, 0x03]));
    assert!(matches!(result, Err(MiHomeError::NoMatchingProtocolError)));
}

#[test]
fn test_unknown_socket_code() {
    let mut frame = ook::encode_frame(0x6C6C6, 1, true).unwrap();
    // command nibbles 1 000: socket code 000 is not defined
    frame[14] = 0xE8;
    frame[15] = 0x88;
    assert!(matches!(
        ook::decode_frame(&frame),
        Err(MiHomeError::UnknownSocketError(0))
    ));
}

#[test]
fn test_ook_rejects_bad_arguments() {
    assert!(matches!(
        ook::encode_frame(0x10_0000, 1, true),
        Err(MiHomeError::BadParameter(_))
    ));
    assert!(matches!(
        ook::encode_frame(0x6C6C6, 5, true),
        Err(MiHomeError::BadParameter(_))
    ));
}

struct Catchall;

impl Protocol for Catchall {
    fn name(&self) -> &str {
        "catchall"
    }

    fn decode(&self, payload: &Bytes) -> Result<Message, MiHomeError> {
        Ok(mihome_rs::ControlMessage::new(
            0,
            0,
            !payload.is_empty(),
            std::time::SystemTime::now(),
            payload.clone(),
        )
        .into())
    }
}

#[test]
fn test_first_match_wins() {
    let registry = ProtocolRegistry::with_defaults();
    registry.add_proto(Arc::new(Catchall)).unwrap();

    // a valid frame still goes to the earlier protocol
    let message = registry.decode(&Bytes::from(power_report())).unwrap();
    assert!(matches!(message, Message::Telemetry(_)));

    // anything else falls through to the catch-all
    let message = registry.decode(&Bytes::from_static(&[0xAA])).unwrap();
    assert!(matches!(message, Message::Control(_)));
}

#[test]
fn test_duplicate_protocol_name() {
    let registry = ProtocolRegistry::with_defaults();
    let result = registry.add_proto(Arc::new(openthings::OpenThingsProtocol::new()));
    assert!(matches!(
        result,
        Err(MiHomeError::DuplicateProtocolError(name)) if name == "openthings"
    ));
    assert_eq!(registry.len(), 2);
}
