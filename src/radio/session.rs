//! # Radio Session
//!
//! Sole owner of the transceiver. Every hardware access goes through one
//! async mutex, so a long running receive loop, sends, resets and
//! temperature reads never touch the radio at the same time.
//!
//! State machine:
//!
//! ```text
//! IDLE ──receive──▶ RECEIVING ──cancel / deadline / hardware error──▶ IDLE
//! IDLE | RECEIVING ──send──▶ SENDING ──▶ previous state
//! any ──reset──▶ RESETTING ──▶ IDLE   (an active receive ends with ResetError)
//! ```
//!
//! The receive loop only holds the lock while polling for a frame; a send
//! takes the lock, parks the receiver (dropping any partial frame), transmits
//! every repeat and restarts reception before releasing it.
//!
//! A receive future dropped before it finishes (an outer `timeout`, an
//! aborted task) cannot park the radio itself. Its `ReceiveGuard` marks it
//! abandoned and the next operation to take the lock parks it instead.

use crate::constants::{DEFAULT_OP_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_TX_GAP};
use crate::device::Mode;
use crate::error::MiHomeError;
use crate::radio::hal::Hal;
use crate::radio::rfm69::{Modulation, Rfm69};
use crate::util::logging::log_frame_hex;
use bytes::Bytes;
use log::{debug, error, info, warn};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;

/// Session states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Receiving,
    Sending,
    Resetting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "IDLE",
            SessionState::Receiving => "RECEIVING",
            SessionState::Sending => "SENDING",
            SessionState::Resetting => "RESETTING",
        };
        f.write_str(name)
    }
}

/// Timing of a session
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Pause between repeats of a transmission
    pub tx_gap: Duration,
    /// Bound on send (per repeat), reset and temperature reads
    pub op_timeout: Duration,
    /// Receive loop poll interval
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tx_gap: DEFAULT_TX_GAP,
            op_timeout: DEFAULT_OP_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

struct Inner<H: Hal> {
    radio: Rfm69<H>,
    state: SessionState,
    /// Mode of the active receive, if any
    rx_mode: Option<Mode>,
    /// Cleared when the active receive future is dropped
    rx_live: Option<Arc<AtomicBool>>,
    /// Bumped by every reset
    epoch: u64,
}

/// Half-duplex arbiter for one radio.
///
/// Clones share the same radio.
pub struct RadioSession<H: Hal> {
    inner: Arc<Mutex<Inner<H>>>,
    config: SessionConfig,
    dropped_frames: Arc<AtomicU64>,
}

impl<H: Hal> Clone for RadioSession<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config,
            dropped_frames: Arc::clone(&self.dropped_frames),
        }
    }
}

impl<H: Hal + 'static> RadioSession<H> {
    /// Wraps an initialized radio.
    pub fn new(radio: Rfm69<H>, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                radio,
                state: SessionState::Idle,
                rx_mode: None,
                rx_live: None,
                epoch: 0,
            })),
            config,
            dropped_frames: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Initializes `radio` and wraps it.
    pub async fn open(mut radio: Rfm69<H>, config: SessionConfig) -> Result<Self, MiHomeError> {
        bounded(config.op_timeout, "radio init", radio.init()).await?;
        Ok(Self::new(radio, config))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub async fn state(&self) -> SessionState {
        let mut inner = self.inner.lock().await;
        settle(&mut inner).await;
        inner.state
    }

    /// Frames dropped because the receive sink was full
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    async fn lock(&self) -> Result<MutexGuard<'_, Inner<H>>, MiHomeError> {
        let mut inner = timeout(self.config.op_timeout, self.inner.lock())
            .await
            .map_err(|_| MiHomeError::Timeout("radio lock".to_string()))?;
        settle(&mut inner).await;
        Ok(inner)
    }

    /// Receives raw payloads in `mode` until `cancel` fires, `deadline`
    /// passes, the sink is closed or the radio fails.
    ///
    /// Frames are handed to `sink` without blocking; a full sink drops the
    /// frame. Returns `ResetError` if the radio is reset while receiving.
    pub async fn receive(
        &self,
        mode: Mode,
        sink: mpsc::Sender<Bytes>,
        cancel: CancellationToken,
        deadline: Option<Duration>,
    ) -> Result<(), MiHomeError> {
        let modulation = Modulation::try_from(mode)?;
        let deadline = deadline.map(|d| Instant::now() + d);
        let (epoch, _guard) = {
            let mut inner = self.inner.lock().await;
            settle(&mut inner).await;
            if inner.rx_mode.is_some() {
                return Err(MiHomeError::ReceiveActive);
            }
            let guard = ReceiveGuard::new();
            inner.state = SessionState::Receiving;
            inner.rx_mode = Some(mode);
            inner.rx_live = Some(Arc::clone(&guard.live));
            let started = match inner.radio.start_rx(modulation).await {
                Ok(()) => inner.radio.set_led_rx(true),
                Err(e) => Err(e),
            };
            if let Err(e) = started {
                error!("Failed to start receive: {}", e);
                if let Err(park) = park_receiver(&mut inner).await {
                    warn!("Failed to park receiver: {}", park);
                }
                return Err(e);
            }
            (inner.epoch, guard)
        };
        info!("Receiving in {}", mode);

        let result = self.receive_loop(epoch, &sink, &cancel, deadline).await;

        let mut inner = self.inner.lock().await;
        if inner.epoch == epoch {
            if let Err(e) = park_receiver(&mut inner).await {
                warn!("Failed to park receiver: {}", e);
            }
        }
        info!("Receive in {} ended", mode);
        result
    }

    async fn receive_loop(
        &self,
        epoch: u64,
        sink: &mpsc::Sender<Bytes>,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<(), MiHomeError> {
        let expired = async {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(expired);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = &mut expired => {
                    debug!("Receive deadline reached");
                    return Ok(());
                }
                _ = sink.closed() => return Ok(()),
                _ = sleep(self.config.poll_interval) => {}
            }

            let frame = {
                let mut inner = self.inner.lock().await;
                if inner.epoch != epoch {
                    return Err(MiHomeError::ResetError);
                }
                match inner.radio.poll_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        error!("Receive failed: {}", e);
                        return Err(e);
                    }
                }
            };

            if let Some(frame) = frame {
                log_frame_hex("Received frame", &frame);
                match sink.try_send(Bytes::from(frame)) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                        warn!("Receive sink full, frame dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => return Ok(()),
                }
            }
        }
    }

    /// Transmits `payload` `repeat` times in `mode`.
    ///
    /// An active receive is paused for the duration and resumed afterwards.
    /// If a repeat after the first fails, the result is `TransmitIncomplete`
    /// with the number of repeats that went out.
    pub async fn send(&self, payload: &[u8], repeat: u32, mode: Mode) -> Result<(), MiHomeError> {
        if repeat == 0 {
            return Err(MiHomeError::BadParameter(
                "repeat must be at least 1".to_string(),
            ));
        }
        let modulation = Modulation::try_from(mode)?;

        let mut inner = self.lock().await?;
        let resume = inner.rx_mode;
        inner.state = SessionState::Sending;
        debug!("Sending {} bytes x{} in {}", payload.len(), repeat, mode);
        log_frame_hex("Payload", payload);

        let result = self.transmit_all(&mut inner, payload, repeat, modulation).await;

        let restored = restore(&mut inner, resume).await;
        match (result, restored) {
            (Err(e), _) => Err(e),
            (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    async fn transmit_all(
        &self,
        inner: &mut Inner<H>,
        payload: &[u8],
        repeat: u32,
        modulation: Modulation,
    ) -> Result<(), MiHomeError> {
        // a frame the receiver had started on is discarded, never mixed in
        inner.radio.standby().await?;
        inner.radio.flush_fifo()?;
        inner.radio.set_led_tx(true)?;

        let mut completed = 0;
        let mut result = Ok(());
        while completed < repeat {
            if completed > 0 {
                sleep(self.config.tx_gap).await;
            }
            let sent = bounded(
                self.config.op_timeout,
                "transmit",
                inner.radio.transmit(payload, modulation),
            )
            .await;
            if let Err(e) = sent {
                error!("Transmit {} of {} failed: {}", completed + 1, repeat, e);
                result = if completed == 0 {
                    Err(e)
                } else {
                    Err(MiHomeError::TransmitIncomplete {
                        completed,
                        requested: repeat,
                    })
                };
                break;
            }
            completed += 1;
        }

        if let Err(e) = inner.radio.set_led_tx(false) {
            warn!("Failed to clear TX LED: {}", e);
        }
        result
    }

    /// Re-initializes the radio. An active receive ends with `ResetError`.
    pub async fn reset_radio(&self) -> Result<(), MiHomeError> {
        let mut inner = self.lock().await?;
        info!("Resetting radio");
        inner.state = SessionState::Resetting;
        inner.epoch += 1;
        inner.rx_mode = None;
        inner.rx_live = None;
        let result = bounded(self.config.op_timeout, "radio reset", inner.radio.init()).await;
        inner.state = SessionState::Idle;
        result
    }

    /// Reads the on-chip temperature plus `offset`.
    pub async fn measure_temperature(&self, offset: f32) -> Result<f32, MiHomeError> {
        let mut inner = self.lock().await?;
        bounded(
            self.config.op_timeout,
            "temperature",
            inner.radio.measure_temperature(offset),
        )
        .await
    }
}

/// Puts the radio back into the receive mode it was in, or standby.
async fn restore<H: Hal>(inner: &mut Inner<H>, resume: Option<Mode>) -> Result<(), MiHomeError> {
    match resume {
        Some(mode) => {
            let modulation = Modulation::try_from(mode)?;
            inner.state = SessionState::Receiving;
            if let Err(e) = inner.radio.start_rx(modulation).await {
                error!("Failed to resume receive: {}", e);
                return Err(e);
            }
            inner.radio.set_led_rx(true)
        }
        None => {
            inner.state = SessionState::Idle;
            inner.radio.standby().await
        }
    }
}

/// Marks its receive as abandoned when dropped.
struct ReceiveGuard {
    live: Arc<AtomicBool>,
}

impl ReceiveGuard {
    fn new() -> Self {
        Self {
            live: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl Drop for ReceiveGuard {
    fn drop(&mut self) {
        self.live.store(false, Ordering::Release);
    }
}

/// Parks a receiver whose future was dropped without cleaning up.
async fn settle<H: Hal>(inner: &mut Inner<H>) {
    let abandoned = inner
        .rx_live
        .as_ref()
        .is_some_and(|live| !live.load(Ordering::Acquire));
    if abandoned {
        warn!("Receive in {:?} was abandoned, parking radio", inner.rx_mode);
        if let Err(e) = park_receiver(inner).await {
            warn!("Failed to park receiver: {}", e);
        }
    }
}

async fn park_receiver<H: Hal>(inner: &mut Inner<H>) -> Result<(), MiHomeError> {
    inner.rx_mode = None;
    inner.rx_live = None;
    inner.state = SessionState::Idle;
    inner.radio.standby().await?;
    inner.radio.flush_fifo()?;
    inner.radio.set_led_rx(false)
}

async fn bounded<T>(
    limit: Duration,
    what: &str,
    operation: impl Future<Output = Result<T, MiHomeError>>,
) -> Result<T, MiHomeError> {
    timeout(limit, operation)
        .await
        .map_err(|_| MiHomeError::Timeout(what.to_string()))?
}
