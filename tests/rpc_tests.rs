//! Tests for the wire projection and the service layer.

use bytes::Bytes;
use mihome_rs::error::MiHomeError;
use mihome_rs::payload::{DataType, FieldType, ParameterName, ParameterRecord, RecordValue};
use mihome_rs::protocol::{ook, openthings};
use mihome_rs::rpc::{
    to_wire_message, CommandKind, CommandRequest, MessageFilter, MiHomeRpc, MiHomeService,
    ParameterValue, SensorKey, WireMessage, WireValveState,
};
use mihome_rs::{decode_payload, DeviceKey, GatewayConfig, MiHome, MockHal, Product};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

fn monitor_frame(sensor_id: u32) -> Vec<u8> {
    let records = vec![
        ParameterRecord::from_value(
            ParameterName::Temperature,
            true,
            FieldType::new(DataType::Dec8, 2).unwrap(),
            &RecordValue::Float(21.5),
        )
        .unwrap(),
        ParameterRecord::from_value(
            ParameterName::RealPower,
            true,
            FieldType::new(DataType::Dec0, 2).unwrap(),
            &RecordValue::Int(-3),
        )
        .unwrap(),
        ParameterRecord::from_value(
            ParameterName::Voltage,
            true,
            FieldType::new(DataType::UDec0, 1).unwrap(),
            &RecordValue::Uint(230),
        )
        .unwrap(),
        ParameterRecord::string(ParameterName::DebugOutput, true, "v1").unwrap(),
    ];
    openthings::encode_frame(DeviceKey::energenie(Product::Miho004, sensor_id), &records).unwrap()
}

async fn service() -> (MockHal, MiHomeService<MockHal>) {
    let hal = MockHal::new();
    let config = GatewayConfig {
        tx_gap_ms: 1,
        poll_interval_ms: 1,
        ..Default::default()
    };
    let gateway = MiHome::open(hal.clone(), config).await.unwrap();
    (hal, MiHomeService::new(gateway))
}

#[test]
fn test_telemetry_projection() {
    let frame = monitor_frame(0x00_12_34);
    let message = decode_payload(&frame).unwrap();
    let wire = to_wire_message(&message).unwrap();

    assert_eq!(
        wire.sender,
        SensorKey {
            protocol: "openthings".to_string(),
            manufacturer: 4,
            product: 1,
            sensor: 0x1234,
        }
    );
    assert_eq!(wire.data, frame);
    let values: Vec<_> = wire.params.iter().map(|p| p.value.clone()).collect();
    assert_eq!(
        values,
        vec![
            ParameterValue::Float(21.5),
            ParameterValue::Int(-3),
            ParameterValue::Uint(230),
            ParameterValue::String("v1".to_string()),
        ]
    );
    assert_eq!(wire.params[0].name, "temperature");
    assert!(wire.params.iter().all(|p| p.report));
}

#[test]
fn test_control_projection() {
    let frame = ook::encode_frame(0x6C6C6, 4, true).unwrap();
    let wire = to_wire_message(&decode_payload(&frame).unwrap()).unwrap();
    assert_eq!(wire.sender.protocol, "ook");
    assert_eq!(wire.sender.product, Product::ControlFour.code() as u32);
    assert_eq!(wire.sender.sensor, 0x6C6C6);
    assert_eq!(wire.params.len(), 1);
    assert_eq!(wire.params[0].name, "switch-state");
    assert_eq!(wire.params[0].value, ParameterValue::Uint(1));
}

#[test]
fn test_wire_message_json() {
    let message = decode_payload(&monitor_frame(7)).unwrap();
    let wire = to_wire_message(&message).unwrap();
    let json = wire.to_json().unwrap();
    assert_eq!(WireMessage::from_json(&json).unwrap(), wire);
}

#[cfg(feature = "cbor")]
#[test]
fn test_wire_message_cbor() {
    let message = decode_payload(&monitor_frame(7)).unwrap();
    let wire = to_wire_message(&message).unwrap();
    let cbor = wire.to_cbor().unwrap();
    assert_eq!(WireMessage::from_cbor(&cbor).unwrap(), wire);
}

#[test]
fn test_command_json_shape() {
    let request: CommandRequest = serde_json::from_str(
        r#"{"sender":{"manufacturer":4,"product":3,"sensor":4660},
            "command":{"kind":"valve_state","state":"SOMETHING_NEW"}}"#,
    )
    .unwrap();
    assert_eq!(request.sender.protocol, "");
    assert_eq!(
        request.command,
        CommandKind::ValveState {
            state: WireValveState::Unspecified
        }
    );
}

#[test]
fn test_filter() {
    let wire = to_wire_message(&decode_payload(&monitor_frame(9)).unwrap()).unwrap();
    assert!(MessageFilter::default().matches(&wire));
    let by_sensor = MessageFilter {
        sensor: Some(9),
        ..Default::default()
    };
    assert!(by_sensor.matches(&wire));
    let other_product = MessageFilter {
        product: Some(3),
        ..Default::default()
    };
    assert!(!other_product.matches(&wire));
}

#[tokio::test]
async fn test_send_command() {
    let (hal, service) = service().await;
    let request = CommandRequest {
        sender: SensorKey {
            protocol: "openthings".to_string(),
            manufacturer: 4,
            product: Product::Miho013.code() as u32,
            sensor: 0x55,
        },
        command: CommandKind::TargetTemperature { celsius: 20.0 },
    };
    let ack = service.send_command(request.clone()).await.unwrap();
    assert_eq!(ack.sender, request.sender);
    assert_eq!(ack.command, "target_temperature");

    let sent = hal.transmitted();
    assert_eq!(sent.len(), 1);
    let (header, records) = openthings::decode_frame(&sent[0].payload).unwrap();
    assert_eq!(header.sensor_id, 0x55);
    assert_eq!(records[0].float_value().unwrap(), 20.0);
}

#[tokio::test]
async fn test_send_command_unknown_product() {
    let (_hal, service) = service().await;
    let request = CommandRequest {
        sender: SensorKey {
            protocol: String::new(),
            manufacturer: 4,
            product: 0x77,
            sensor: 1,
        },
        command: CommandKind::Identify,
    };
    assert!(matches!(
        service.send_command(request).await,
        Err(MiHomeError::BadParameter(_))
    ));
}

#[tokio::test]
async fn test_stream_filters_and_cancels() {
    let (_hal, service) = service().await;
    let cancel = CancellationToken::new();
    let filter = MessageFilter {
        sensor: Some(2),
        ..Default::default()
    };
    let mut stream = service.stream_messages(filter, cancel.clone()).await;

    let gateway = service.gateway();
    gateway.process_payload(Bytes::from(monitor_frame(1)));
    gateway.process_payload(Bytes::from(monitor_frame(2)));

    let wire = timeout(Duration::from_secs(1), stream.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wire.sender.sensor, 2);

    cancel.cancel();
    let end = timeout(Duration::from_secs(1), stream.recv()).await.unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn test_stream_ends_when_gateway_closes() {
    let (_hal, service) = service().await;
    let mut stream = service
        .stream_messages(MessageFilter::default(), CancellationToken::new())
        .await;
    service.gateway().close();
    let end = timeout(Duration::from_secs(1), stream.recv()).await.unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn test_protocols_and_temperature() {
    let (_hal, service) = service().await;
    assert_eq!(service.protocols(), vec!["openthings", "ook"]);
    assert_eq!(service.measure_temperature().await.unwrap(), 21.0);
    service.reset().await.unwrap();
}
