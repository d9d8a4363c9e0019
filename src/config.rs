//! # Gateway Configuration
//!
//! Settings for a [`crate::gateway::MiHome`] gateway, loadable from a JSON
//! file. Every field has a default, so a file only needs the values it
//! changes:
//!
//! ```json
//! { "rx_mode": "monitor", "temperature_offset": -1.5 }
//! ```

use crate::constants::{
    DEFAULT_DEDUP_WINDOW, DEFAULT_LED1_PIN, DEFAULT_LED2_PIN, DEFAULT_OP_TIMEOUT,
    DEFAULT_POLL_INTERVAL, DEFAULT_RESET_PIN, DEFAULT_SPI_SLAVE, DEFAULT_SPI_SPEED_HZ,
    DEFAULT_SUBSCRIBER_CAPACITY, DEFAULT_TX_GAP,
};
use crate::device::Mode;
use crate::error::MiHomeError;
use crate::radio::{RadioPins, SessionConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Receive mode for `run`: `none`, `monitor` or `control`
    pub rx_mode: String,
    /// GPIO numbers; anything outside 1..=255 means not connected
    pub reset_pin: u32,
    /// Green LED
    pub led1_pin: u32,
    /// Red LED
    pub led2_pin: u32,
    pub spi_slave: u8,
    pub spi_speed_hz: u32,
    /// Added to every on-chip temperature reading
    pub temperature_offset: f32,
    pub dedup_window_ms: u64,
    pub subscriber_capacity: usize,
    pub tx_gap_ms: u64,
    pub op_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rx_mode: "monitor".to_string(),
            reset_pin: DEFAULT_RESET_PIN as u32,
            led1_pin: DEFAULT_LED1_PIN as u32,
            led2_pin: DEFAULT_LED2_PIN as u32,
            spi_slave: DEFAULT_SPI_SLAVE,
            spi_speed_hz: DEFAULT_SPI_SPEED_HZ,
            temperature_offset: 0.0,
            dedup_window_ms: DEFAULT_DEDUP_WINDOW.as_millis() as u64,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            tx_gap_ms: DEFAULT_TX_GAP.as_millis() as u64,
            op_timeout_ms: DEFAULT_OP_TIMEOUT.as_millis() as u64,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl GatewayConfig {
    /// Loads and validates a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MiHomeError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| MiHomeError::Config(format!("{}: {}", path.display(), e)))?;
        let config: GatewayConfig = serde_json::from_str(&json)
            .map_err(|e| MiHomeError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as pretty JSON.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), MiHomeError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| MiHomeError::Config(e.to_string()))?;
        fs::write(path, json).map_err(|e| MiHomeError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), MiHomeError> {
        self.rx_mode()?;
        if self.spi_slave > 2 {
            return Err(MiHomeError::Config(format!(
                "spi_slave {} outside 0..=2",
                self.spi_slave
            )));
        }
        if self.spi_speed_hz == 0 {
            return Err(MiHomeError::Config("spi_speed_hz must be positive".to_string()));
        }
        if !self.temperature_offset.is_finite() {
            return Err(MiHomeError::Config("temperature_offset is not finite".to_string()));
        }
        if self.subscriber_capacity == 0 {
            return Err(MiHomeError::Config(
                "subscriber_capacity must be positive".to_string(),
            ));
        }
        if self.op_timeout_ms == 0 || self.poll_interval_ms == 0 {
            return Err(MiHomeError::Config(
                "op_timeout_ms and poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rx_mode(&self) -> Result<Mode, MiHomeError> {
        self.rx_mode
            .parse()
            .map_err(|e: MiHomeError| MiHomeError::Config(e.to_string()))
    }

    pub fn radio_pins(&self) -> RadioPins {
        RadioPins {
            reset: pin(self.reset_pin),
            led_rx: pin(self.led1_pin),
            led_tx: pin(self.led2_pin),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tx_gap: Duration::from_millis(self.tx_gap_ms),
            op_timeout: Duration::from_millis(self.op_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }
}

fn pin(value: u32) -> Option<u8> {
    match value {
        1..=255 => Some(value as u8),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pins() {
        let pins = GatewayConfig::default().radio_pins();
        assert_eq!(pins.reset, Some(25));
        assert_eq!(pins.led_rx, Some(27));
        assert_eq!(pins.led_tx, Some(22));
    }

    #[test]
    fn test_out_of_range_pin_disconnected() {
        let config = GatewayConfig {
            reset_pin: 0,
            led1_pin: 256,
            ..Default::default()
        };
        let pins = config.radio_pins();
        assert_eq!(pins.reset, None);
        assert_eq!(pins.led_rx, None);
        assert_eq!(pins.led_tx, Some(22));
    }

    #[test]
    fn test_bad_mode_rejected() {
        let config = GatewayConfig {
            rx_mode: "listen".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("none, monitor, control"));
    }
}
