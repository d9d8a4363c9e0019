//! Gateway tests: decode, de-duplication, fan-out and requests over the mock radio.

use bytes::Bytes;
use mihome_rs::error::MiHomeError;
use mihome_rs::payload::{DataType, FieldType, ParameterName, ParameterRecord, RecordValue};
use mihome_rs::protocol::openthings;
use mihome_rs::radio::registers::RF_DATAMODUL_OOK;
use mihome_rs::{DeviceKey, GatewayConfig, Message, MiHome, MockHal, Mode, Product, ValveState};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

fn test_config() -> GatewayConfig {
    GatewayConfig {
        tx_gap_ms: 1,
        poll_interval_ms: 1,
        op_timeout_ms: 1000,
        subscriber_capacity: 4,
        temperature_offset: -1.0,
        ..Default::default()
    }
}

async fn open_gateway(config: GatewayConfig) -> (MockHal, MiHome<MockHal>) {
    let hal = MockHal::new();
    let gateway = MiHome::open(hal.clone(), config).await.unwrap();
    (hal, gateway)
}

fn temperature_report(sensor_id: u32, celsius: f64) -> Vec<u8> {
    let record = ParameterRecord::from_value(
        ParameterName::Temperature,
        true,
        FieldType::new(DataType::Dec8, 2).unwrap(),
        &RecordValue::Float(celsius),
    )
    .unwrap();
    openthings::encode_frame(DeviceKey::energenie(Product::Miho013, sensor_id), &[record]).unwrap()
}

#[tokio::test]
async fn test_malformed_frame_does_not_end_stream() {
    let (hal, gateway) = open_gateway(test_config()).await;
    let mut messages = gateway.subscribe();
    let cancel = CancellationToken::new();
    let runner = gateway.clone();
    let token = cancel.clone();
    let handle = tokio::spawn(async move { runner.run(Mode::Monitor, token, None).await });

    let mut corrupt = temperature_report(0x10, 20.0);
    let last = corrupt.len() - 1;
    corrupt[last] ^= 0xFF;
    hal.queue_rx_frame(&corrupt);
    hal.queue_rx_frame(&temperature_report(0x10, 20.5));

    let message = timeout(Duration::from_secs(2), messages.recv())
        .await
        .unwrap()
        .unwrap();
    let Message::Telemetry(telemetry) = message else {
        panic!("expected telemetry");
    };
    assert_eq!(
        telemetry
            .record(ParameterName::Temperature)
            .unwrap()
            .float_value()
            .unwrap(),
        20.5
    );

    cancel.cancel();
    handle.await.unwrap().unwrap();
    let stats = gateway.stats();
    assert_eq!(stats.frames_received, 2);
    assert_eq!(stats.decode_errors, 1);
}

#[tokio::test]
async fn test_repeats_are_suppressed() {
    let (_hal, gateway) = open_gateway(test_config()).await;
    let mut messages = gateway.subscribe();
    let frame = Bytes::from(temperature_report(0x20, 18.0));

    assert!(gateway.process_payload(frame.clone()).is_some());
    assert!(gateway.process_payload(frame).is_none());
    assert!(gateway
        .process_payload(Bytes::from(temperature_report(0x20, 18.5)))
        .is_some());

    assert_eq!(gateway.stats().duplicates_suppressed, 1);
    assert!(messages.try_recv().is_ok());
    assert!(messages.try_recv().is_ok());
    assert!(messages.try_recv().is_err());
}

#[tokio::test]
async fn test_repeats_outside_window_are_delivered() {
    let config = GatewayConfig {
        dedup_window_ms: 0,
        ..test_config()
    };
    let (_hal, gateway) = open_gateway(config).await;
    let frame = Bytes::from(temperature_report(0x20, 18.0));
    assert!(gateway.process_payload(frame.clone()).is_some());
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(gateway.process_payload(frame).is_some());
}

#[tokio::test]
async fn test_slow_subscriber_drops_and_counts() {
    let config = GatewayConfig {
        subscriber_capacity: 1,
        ..test_config()
    };
    let (_hal, gateway) = open_gateway(config).await;
    let _slow = gateway.subscribe();
    for i in 0..3 {
        gateway.process_payload(Bytes::from(temperature_report(0x30, 15.0 + i as f64)));
    }
    assert_eq!(gateway.stats().deliveries_dropped, 2);
    assert_eq!(gateway.subscriber_count(), 1);
}

#[tokio::test]
async fn test_dropped_subscriber_is_removed() {
    let (_hal, gateway) = open_gateway(test_config()).await;
    drop(gateway.subscribe());
    gateway.process_payload(Bytes::from(temperature_report(0x40, 10.0)));
    assert_eq!(gateway.subscriber_count(), 0);
}

#[tokio::test]
async fn test_close_ends_subscriptions() {
    let (_hal, gateway) = open_gateway(test_config()).await;
    let mut messages = gateway.subscribe();
    gateway.close();
    assert!(messages.recv().await.is_none());
}

#[tokio::test]
async fn test_switch_request_goes_out_as_ook() {
    let (hal, gateway) = open_gateway(test_config()).await;
    gateway
        .request_switch_on(DeviceKey::energenie(Product::ControlOne, 0))
        .await
        .unwrap();
    let sent = hal.transmitted();
    assert_eq!(sent.len(), 8);
    assert!(sent.iter().all(|t| t.data_modul == RF_DATAMODUL_OOK));
}

#[tokio::test]
async fn test_monitor_request_rejects_control_product() {
    let (hal, gateway) = open_gateway(test_config()).await;
    let result = gateway
        .request_valve_state(DeviceKey::energenie(Product::ControlOne, 1), ValveState::Open)
        .await;
    assert!(matches!(result, Err(MiHomeError::BadParameter(_))));
    assert!(hal.transmitted().is_empty());
}

#[tokio::test]
async fn test_temperature_uses_configured_offset() {
    let (hal, gateway) = open_gateway(test_config()).await;
    hal.set_temperature_raw(140);
    assert_eq!(gateway.measure_temperature().await.unwrap(), 24.0);
}

#[tokio::test]
async fn test_run_without_mode_returns() {
    let (_hal, gateway) = open_gateway(test_config()).await;
    gateway
        .run(Mode::None, CancellationToken::new(), None)
        .await
        .unwrap();
    assert_eq!(gateway.protos(), vec!["openthings", "ook"]);
}

#[tokio::test]
async fn test_run_stops_at_deadline() {
    let (_hal, gateway) = open_gateway(test_config()).await;
    timeout(
        Duration::from_secs(1),
        gateway.run(
            Mode::Monitor,
            CancellationToken::new(),
            Some(Duration::from_millis(20)),
        ),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(
        gateway.session().state().await,
        mihome_rs::radio::SessionState::Idle
    );
}
