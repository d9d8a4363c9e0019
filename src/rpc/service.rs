//! # MiHome Service
//!
//! Remote-facing operations over a [`MiHome`] gateway. A transport (gRPC,
//! HTTP, a message bus) only has to move the records in [`super::types`]
//! and call into [`MiHomeRpc`].

use super::projection::{device_key, low_power_from_wire, to_wire_message, valve_state_from_wire};
use super::types::{CommandAck, CommandKind, CommandRequest, MessageFilter, WireMessage};
use crate::error::MiHomeError;
use crate::gateway::MiHome;
use crate::radio::Hal;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait MiHomeRpc: Send + Sync {
    /// Sends one command and acknowledges it once it went out on the radio.
    async fn send_command(&self, request: CommandRequest) -> Result<CommandAck, MiHomeError>;

    /// Streams received messages matching `filter`.
    ///
    /// The stream ends when `cancel` fires, the caller drops the receiver or
    /// the gateway closes its subscribers.
    async fn stream_messages(
        &self,
        filter: MessageFilter,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<WireMessage>;

    fn protocols(&self) -> Vec<String>;

    async fn measure_temperature(&self) -> Result<f32, MiHomeError>;

    async fn reset(&self) -> Result<(), MiHomeError>;
}

pub struct MiHomeService<H: Hal> {
    gateway: MiHome<H>,
}

impl<H: Hal + 'static> MiHomeService<H> {
    pub fn new(gateway: MiHome<H>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &MiHome<H> {
        &self.gateway
    }
}

#[async_trait]
impl<H: Hal + 'static> MiHomeRpc for MiHomeService<H> {
    async fn send_command(&self, request: CommandRequest) -> Result<CommandAck, MiHomeError> {
        let key = device_key(Some(&request.sender))?;
        debug!("{} for {}", request.command.name(), key);
        let gateway = &self.gateway;
        match &request.command {
            CommandKind::SwitchOn => gateway.request_switch_on(key).await?,
            CommandKind::SwitchOff => gateway.request_switch_off(key).await?,
            CommandKind::Join => gateway.send_join(key).await?,
            CommandKind::Identify => gateway.request_identify(key).await?,
            CommandKind::Diagnostics => gateway.request_diagnostics(key).await?,
            CommandKind::Exercise => gateway.request_exercise(key).await?,
            CommandKind::BatteryLevel => gateway.request_battery_level(key).await?,
            CommandKind::TargetTemperature { celsius } => {
                gateway.request_target_temperature(key, *celsius).await?
            }
            CommandKind::ReportInterval { seconds } => {
                gateway
                    .request_report_interval(key, Duration::from_secs(*seconds))
                    .await?
            }
            CommandKind::ValveState { state } => {
                gateway
                    .request_valve_state(key, valve_state_from_wire(*state))
                    .await?
            }
            CommandKind::PowerMode { mode } => {
                gateway
                    .request_low_power_mode(key, low_power_from_wire(*mode))
                    .await?
            }
        }
        Ok(CommandAck {
            sender: request.sender,
            command: request.command.name().to_string(),
            timestamp: Utc::now(),
        })
    }

    async fn stream_messages(
        &self,
        filter: MessageFilter,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<WireMessage> {
        let mut subscription = self.gateway.subscribe();
        let (tx, rx) = mpsc::channel(self.gateway.config().subscriber_capacity);
        tokio::spawn(async move {
            info!("Message stream opened");
            loop {
                let message = tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tx.closed() => break,
                    message = subscription.recv() => match message {
                        Some(message) => message,
                        None => break,
                    },
                };
                let wire = match to_wire_message(&message) {
                    Ok(wire) => wire,
                    Err(e) => {
                        warn!("Message from {} not streamed: {}", message.sender(), e);
                        continue;
                    }
                };
                if !filter.matches(&wire) {
                    continue;
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = tx.send(wire) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            info!("Message stream closed");
        });
        rx
    }

    fn protocols(&self) -> Vec<String> {
        self.gateway.protos()
    }

    async fn measure_temperature(&self) -> Result<f32, MiHomeError> {
        self.gateway.measure_temperature().await
    }

    async fn reset(&self) -> Result<(), MiHomeError> {
        self.gateway.reset().await
    }
}
