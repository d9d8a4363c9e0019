//! # MiHome Gateway
//!
//! Ties one [`RadioSession`] to a [`ProtocolRegistry`] and a set of
//! subscribers. `run` drives the receive path:
//!
//! ```text
//! radio ─▶ session.receive ─▶ registry.decode ─▶ de-dup ─▶ subscribers
//! ```
//!
//! The request methods build a transmission with [`CommandBuilder`] and hand
//! it to the session, which pauses reception while it transmits.

use crate::command::{CommandBuilder, Transmission};
use crate::config::GatewayConfig;
use crate::device::{DeviceKey, Mode, ValveState};
use crate::error::MiHomeError;
use crate::log_warn_throttled;
use crate::message::Message;
use crate::protocol::{Protocol, ProtocolRegistry};
use crate::radio::{Hal, RadioSession, Rfm69};
use crate::util::logging::{log_frame_hex, LogThrottle};
use bytes::Bytes;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Decode warnings allowed per second
const DECODE_WARNINGS_PER_SEC: u32 = 5;

/// Counters since the gateway was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStats {
    pub frames_received: u64,
    pub decode_errors: u64,
    pub duplicates_suppressed: u64,
    /// Messages not delivered because a subscriber queue was full
    pub deliveries_dropped: u64,
    /// Raw frames dropped between the radio and the decoder
    pub radio_frames_dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    frames_received: AtomicU64,
    decode_errors: AtomicU64,
    duplicates_suppressed: AtomicU64,
    deliveries_dropped: AtomicU64,
}

/// Recently delivered messages, used to collapse retransmissions.
#[derive(Debug)]
struct RecentMessages {
    window: Duration,
    messages: VecDeque<Message>,
}

impl RecentMessages {
    fn new(window: Duration) -> Self {
        Self {
            window,
            messages: VecDeque::new(),
        }
    }

    /// Records `message` unless it repeats one seen within the window.
    fn is_repeat(&mut self, message: &Message) -> bool {
        let window = self.window;
        let now = message.timestamp();
        while let Some(oldest) = self.messages.front() {
            let age = now.duration_since(oldest.timestamp()).unwrap_or_default();
            if age > window {
                self.messages.pop_front();
            } else {
                break;
            }
        }
        if self.messages.iter().any(|m| message.is_repeat_of(m, window)) {
            return true;
        }
        self.messages.push_back(message.clone());
        false
    }
}

/// Gateway between a radio and the rest of the application.
///
/// Clones share the radio, the registry, the subscribers and the counters.
pub struct MiHome<H: Hal> {
    session: RadioSession<H>,
    registry: ProtocolRegistry,
    commands: CommandBuilder,
    config: GatewayConfig,
    subscribers: Arc<Mutex<Vec<mpsc::Sender<Message>>>>,
    recent: Arc<Mutex<RecentMessages>>,
    counters: Arc<Counters>,
    throttle: Arc<Mutex<LogThrottle>>,
}

impl<H: Hal> Clone for MiHome<H> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            registry: self.registry.clone(),
            commands: self.commands,
            config: self.config.clone(),
            subscribers: Arc::clone(&self.subscribers),
            recent: Arc::clone(&self.recent),
            counters: Arc::clone(&self.counters),
            throttle: Arc::clone(&self.throttle),
        }
    }
}

impl<H: Hal + 'static> MiHome<H> {
    /// Wraps an open session.
    pub fn new(session: RadioSession<H>, config: GatewayConfig) -> Self {
        Self {
            session,
            registry: ProtocolRegistry::with_defaults(),
            commands: CommandBuilder::new(),
            recent: Arc::new(Mutex::new(RecentMessages::new(config.dedup_window()))),
            config,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            counters: Arc::new(Counters::default()),
            throttle: Arc::new(Mutex::new(LogThrottle::new(
                Duration::from_secs(1),
                DECODE_WARNINGS_PER_SEC,
            ))),
        }
    }

    /// Validates `config`, initializes the radio behind `hal` and wraps it.
    pub async fn open(hal: H, config: GatewayConfig) -> Result<Self, MiHomeError> {
        config.validate()?;
        let radio = Rfm69::new(hal, config.radio_pins());
        let session = RadioSession::open(radio, config.session_config()).await?;
        info!("MiHome gateway ready, rx mode {}", config.rx_mode);
        Ok(Self::new(session, config))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn session(&self) -> &RadioSession<H> {
        &self.session
    }

    pub fn registry(&self) -> &ProtocolRegistry {
        &self.registry
    }

    pub fn add_proto(&self, protocol: Arc<dyn Protocol>) -> Result<(), MiHomeError> {
        self.registry.add_proto(protocol)
    }

    pub fn protos(&self) -> Vec<String> {
        self.registry.protos()
    }

    /// Re-initializes the radio; a running `run` ends with `ResetError`.
    pub async fn reset(&self) -> Result<(), MiHomeError> {
        self.session.reset_radio().await
    }

    /// Chip temperature with the configured offset applied.
    pub async fn measure_temperature(&self) -> Result<f32, MiHomeError> {
        self.session
            .measure_temperature(self.config.temperature_offset)
            .await
    }

    /// Registers a subscriber with a bounded queue.
    ///
    /// A subscriber that falls behind loses messages; dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(self.config.subscriber_capacity);
        lock(&self.subscribers).push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Drops every subscriber, ending their streams.
    pub fn close(&self) {
        let dropped = std::mem::take(&mut *lock(&self.subscribers));
        debug!("Closed {} subscribers", dropped.len());
    }

    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            frames_received: self.counters.frames_received.load(Ordering::Relaxed),
            decode_errors: self.counters.decode_errors.load(Ordering::Relaxed),
            duplicates_suppressed: self.counters.duplicates_suppressed.load(Ordering::Relaxed),
            deliveries_dropped: self.counters.deliveries_dropped.load(Ordering::Relaxed),
            radio_frames_dropped: self.session.dropped_frames(),
        }
    }

    /// Receives and publishes messages in `mode` until `cancel` fires or
    /// `deadline` passes.
    ///
    /// Payloads no protocol accepts are counted and skipped; they never end
    /// the stream. Mode `None` returns at once.
    pub async fn run(
        &self,
        mode: Mode,
        cancel: CancellationToken,
        deadline: Option<Duration>,
    ) -> Result<(), MiHomeError> {
        if mode == Mode::None {
            info!("Receive mode is {}, not listening", mode);
            return Ok(());
        }
        let (tx, mut rx) = mpsc::channel::<Bytes>(self.config.subscriber_capacity);
        let receiver = self.session.receive(mode, tx, cancel, deadline);
        let processor = async {
            while let Some(payload) = rx.recv().await {
                self.process_payload(payload);
            }
        };
        let (result, ()) = tokio::join!(receiver, processor);
        result
    }

    /// Decodes one raw payload and publishes it unless it repeats a recent
    /// message. Returns the message if it was published.
    pub fn process_payload(&self, payload: Bytes) -> Option<Message> {
        self.counters.frames_received.fetch_add(1, Ordering::Relaxed);
        let message = match self.registry.decode(&payload) {
            Ok(message) => message,
            Err(e) => {
                self.counters.decode_errors.fetch_add(1, Ordering::Relaxed);
                let mut throttle = lock(&self.throttle);
                log_warn_throttled!(throttle, "Dropping undecodable payload: {}", e);
                log_frame_hex("Undecodable payload", &payload);
                return None;
            }
        };

        if lock(&self.recent).is_repeat(&message) {
            self.counters
                .duplicates_suppressed
                .fetch_add(1, Ordering::Relaxed);
            debug!("Suppressed repeat from {}", message.sender());
            return None;
        }

        self.publish(&message);
        Some(message)
    }

    fn publish(&self, message: &Message) {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|subscriber| match subscriber.try_send(message.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.deliveries_dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Subscriber queue full, message dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Sends a prepared transmission.
    pub async fn send(&self, transmission: &Transmission) -> Result<(), MiHomeError> {
        debug!("Sending {}", transmission);
        self.session
            .send(&transmission.payload, transmission.repeat, transmission.mode)
            .await
    }

    pub async fn request_switch_on(&self, key: DeviceKey) -> Result<(), MiHomeError> {
        let t = self.commands.switch_on(key.product(), key.sensor_id())?;
        self.send(&t).await
    }

    pub async fn request_switch_off(&self, key: DeviceKey) -> Result<(), MiHomeError> {
        let t = self.commands.switch_off(key.product(), key.sensor_id())?;
        self.send(&t).await
    }

    pub async fn send_join(&self, key: DeviceKey) -> Result<(), MiHomeError> {
        let t = self.commands.join(key.product(), key.sensor_id())?;
        self.send(&t).await
    }

    pub async fn request_identify(&self, key: DeviceKey) -> Result<(), MiHomeError> {
        let t = self.commands.identify(key.product(), key.sensor_id())?;
        self.send(&t).await
    }

    pub async fn request_diagnostics(&self, key: DeviceKey) -> Result<(), MiHomeError> {
        let t = self.commands.diagnostics(key.product(), key.sensor_id())?;
        self.send(&t).await
    }

    pub async fn request_exercise(&self, key: DeviceKey) -> Result<(), MiHomeError> {
        let t = self.commands.exercise(key.product(), key.sensor_id())?;
        self.send(&t).await
    }

    pub async fn request_battery_level(&self, key: DeviceKey) -> Result<(), MiHomeError> {
        let t = self.commands.battery_level(key.product(), key.sensor_id())?;
        self.send(&t).await
    }

    pub async fn request_target_temperature(
        &self,
        key: DeviceKey,
        celsius: f64,
    ) -> Result<(), MiHomeError> {
        let t = self
            .commands
            .target_temperature(key.product(), key.sensor_id(), celsius)?;
        self.send(&t).await
    }

    pub async fn request_report_interval(
        &self,
        key: DeviceKey,
        interval: Duration,
    ) -> Result<(), MiHomeError> {
        let t = self
            .commands
            .report_interval(key.product(), key.sensor_id(), interval)?;
        self.send(&t).await
    }

    pub async fn request_valve_state(
        &self,
        key: DeviceKey,
        state: ValveState,
    ) -> Result<(), MiHomeError> {
        let t = self
            .commands
            .valve_state(key.product(), key.sensor_id(), state)?;
        self.send(&t).await
    }

    pub async fn request_low_power_mode(
        &self,
        key: DeviceKey,
        enabled: bool,
    ) -> Result<(), MiHomeError> {
        let t = self
            .commands
            .low_power_mode(key.product(), key.sensor_id(), enabled)?;
        self.send(&t).await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
