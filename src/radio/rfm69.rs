//! # RFM69 Radio Driver for MiHome
//!
//! Async driver for the HopeRF RFM69 on the Energenie ENER314-RT. The radio
//! is switched between two modem profiles on demand:
//!
//! - FSK, 434.3 MHz, 4800 bps, 30 kHz deviation, sync word 0x2DD4, variable
//!   length frames (OpenThings monitor devices)
//! - OOK, 433.92 MHz, 4800 bps, fixed 16 byte frames (control sockets)
//!
//! The driver does no locking of its own; [`crate::radio::session::RadioSession`]
//! owns it and serializes access.

use crate::constants::OOK_FRAME_LENGTH;
use crate::device::Mode;
use crate::error::MiHomeError;
use crate::radio::hal::Hal;
use crate::radio::registers::*;
use log::{debug, info, warn};
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Reset line held high for this long
const RESET_PULSE: Duration = Duration::from_millis(10);

/// Time for the chip to come out of reset
const RESET_SETTLE: Duration = Duration::from_millis(10);

const MODE_READY_TIMEOUT: Duration = Duration::from_millis(500);
const PACKET_SENT_TIMEOUT: Duration = Duration::from_secs(1);
const TEMPERATURE_TIMEOUT: Duration = Duration::from_millis(100);

/// GPIO lines wired to the radio board; `None` means not connected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RadioPins {
    pub reset: Option<u8>,
    /// Green LED, lit while receiving
    pub led_rx: Option<u8>,
    /// Red LED, lit while transmitting
    pub led_tx: Option<u8>,
}

impl RadioPins {
    /// Connected pins
    pub fn iter(&self) -> impl Iterator<Item = u8> {
        [self.reset, self.led_rx, self.led_tx].into_iter().flatten()
    }
}

/// Modem profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modulation {
    Fsk,
    Ook,
}

impl TryFrom<Mode> for Modulation {
    type Error = MiHomeError;

    fn try_from(mode: Mode) -> Result<Self, Self::Error> {
        match mode {
            Mode::Monitor => Ok(Modulation::Fsk),
            Mode::Control => Ok(Modulation::Ook),
            Mode::None => Err(MiHomeError::BadParameter(format!(
                "no modulation for {mode}"
            ))),
        }
    }
}

/// Operating modes for the RFM69
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rfm69Mode {
    Sleep,
    Standby,
    Tx,
    Rx,
}

impl Rfm69Mode {
    fn opmode(self) -> u8 {
        match self {
            Rfm69Mode::Sleep => RF_OPMODE_SLEEP,
            Rfm69Mode::Standby => RF_OPMODE_STANDBY,
            Rfm69Mode::Tx => RF_OPMODE_TRANSMITTER,
            Rfm69Mode::Rx => RF_OPMODE_RECEIVER,
        }
    }
}

/// RFM69 driver over a [`Hal`]
pub struct Rfm69<H: Hal> {
    hal: H,
    pins: RadioPins,
    current_mode: Rfm69Mode,
    modulation: Option<Modulation>,
}

impl<H: Hal> Rfm69<H> {
    pub fn new(hal: H, pins: RadioPins) -> Self {
        Self {
            hal,
            pins,
            current_mode: Rfm69Mode::Sleep,
            modulation: None,
        }
    }

    pub fn mode(&self) -> Rfm69Mode {
        self.current_mode
    }

    pub fn modulation(&self) -> Option<Modulation> {
        self.modulation
    }

    /// Resets the chip, checks its identity and leaves it in standby.
    pub async fn init(&mut self) -> Result<(), MiHomeError> {
        info!("Initializing RFM69 radio");
        self.reset().await?;
        self.verify_chip()?;
        self.modulation = None;
        self.current_mode = Rfm69Mode::Sleep;
        self.set_mode(Rfm69Mode::Standby).await?;
        self.set_led_rx(false)?;
        self.set_led_tx(false)?;
        info!("RFM69 radio initialized");
        Ok(())
    }

    async fn reset(&mut self) -> Result<(), MiHomeError> {
        if let Some(pin) = self.pins.reset {
            debug!("Resetting RFM69 on GPIO {}", pin);
            self.hal.set_pin(pin, true)?;
            sleep(RESET_PULSE).await;
            self.hal.set_pin(pin, false)?;
            sleep(RESET_SETTLE).await;
        }
        Ok(())
    }

    fn verify_chip(&mut self) -> Result<(), MiHomeError> {
        let version = self.read_register(REG_VERSION)?;
        debug!("RFM69 chip version: 0x{:02X}", version);
        match version {
            RF_VERSION => Ok(()),
            0x00 | 0xFF => Err(MiHomeError::DeviceNotFound),
            other => Err(MiHomeError::InvalidDeviceIdentity(other)),
        }
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), MiHomeError> {
        Ok(self.hal.write_register(reg, value)?)
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, MiHomeError> {
        Ok(self.hal.read_register(reg)?)
    }

    /// Writes a configuration register and reads it back.
    fn write_verified(&mut self, reg: u8, value: u8) -> Result<(), MiHomeError> {
        self.write_register(reg, value)?;
        if self.read_register(reg)? != value {
            return Err(MiHomeError::HardwareWriteError { register: reg });
        }
        Ok(())
    }

    fn write_register_bits(&mut self, reg: u8, mask: u8, value: u8) -> Result<(), MiHomeError> {
        let current = self.read_register(reg)?;
        self.write_register(reg, (current & !mask) | (value & mask))
    }

    fn irq_flags2(&mut self) -> Result<IrqFlags2, MiHomeError> {
        Ok(IrqFlags2::from_bits_truncate(
            self.read_register(REG_IRQFLAGS2)?,
        ))
    }

    /// Switches the operating mode and waits for mode-ready.
    pub async fn set_mode(&mut self, mode: Rfm69Mode) -> Result<(), MiHomeError> {
        if self.current_mode == mode {
            return Ok(());
        }
        self.write_register_bits(REG_OPMODE, RF_OPMODE_MASK, mode.opmode())?;
        self.wait_for_mode_ready().await?;
        self.current_mode = mode;
        debug!("RFM69 mode set to: {:?}", mode);
        Ok(())
    }

    async fn wait_for_mode_ready(&mut self) -> Result<(), MiHomeError> {
        let start = Instant::now();
        while start.elapsed() < MODE_READY_TIMEOUT {
            let flags = IrqFlags1::from_bits_truncate(self.read_register(REG_IRQFLAGS1)?);
            if flags.contains(IrqFlags1::MODE_READY) {
                return Ok(());
            }
            sleep(Duration::from_millis(1)).await;
        }
        Err(MiHomeError::Timeout("Mode ready".to_string()))
    }

    pub async fn standby(&mut self) -> Result<(), MiHomeError> {
        self.set_mode(Rfm69Mode::Standby).await
    }

    /// Discards anything in the FIFO, including a partially received frame.
    pub fn flush_fifo(&mut self) -> Result<(), MiHomeError> {
        self.write_register(REG_IRQFLAGS2, IrqFlags2::FIFO_OVERRUN.bits())
    }

    /// Loads a modem profile. The radio is left in standby.
    pub async fn configure(&mut self, modulation: Modulation) -> Result<(), MiHomeError> {
        self.standby().await?;
        if self.modulation == Some(modulation) {
            return Ok(());
        }
        info!("Configuring RFM69 for {:?}", modulation);
        match modulation {
            Modulation::Fsk => {
                self.write_verified(REG_DATAMODUL, RF_DATAMODUL_FSK)?;
                self.write_frequency(FSK_FREQUENCY)?;
                self.write_verified(REG_FDEVMSB, RF_FDEVMSB_30000)?;
                self.write_verified(REG_FDEVLSB, RF_FDEVLSB_30000)?;
                self.write_verified(REG_BITRATEMSB, RF_BITRATEMSB_4800)?;
                self.write_verified(REG_BITRATELSB, RF_BITRATELSB_4800)?;
                self.write_verified(REG_PREAMBLEMSB, 0x00)?;
                self.write_verified(REG_PREAMBLELSB, 0x03)?;
                self.write_verified(REG_SYNCCONFIG, RF_SYNCCONFIG_ON_2)?;
                self.write_verified(REG_SYNCVALUE1, FSK_SYNC_WORD[0])?;
                self.write_verified(REG_SYNCVALUE2, FSK_SYNC_WORD[1])?;
                self.write_verified(REG_PACKETCONFIG1, RF_PACKETCONFIG1_FSK)?;
                self.write_verified(REG_PAYLOADLENGTH, FIFO_SIZE as u8)?;
            }
            Modulation::Ook => {
                self.write_verified(REG_DATAMODUL, RF_DATAMODUL_OOK)?;
                self.write_frequency(OOK_FREQUENCY)?;
                self.write_verified(REG_BITRATEMSB, RF_BITRATEMSB_4800)?;
                self.write_verified(REG_BITRATELSB, RF_BITRATELSB_4800)?;
                self.write_verified(REG_PREAMBLEMSB, 0x00)?;
                self.write_verified(REG_PREAMBLELSB, 0x00)?;
                self.write_verified(REG_SYNCCONFIG, RF_SYNCCONFIG_OFF)?;
                self.write_verified(REG_PACKETCONFIG1, RF_PACKETCONFIG1_OOK)?;
                self.write_verified(REG_PAYLOADLENGTH, OOK_FRAME_LENGTH as u8)?;
            }
        }
        self.write_verified(REG_FIFOTHRESH, RF_FIFOTHRESH_TXSTART_NOT_EMPTY)?;
        self.modulation = Some(modulation);
        Ok(())
    }

    fn write_frequency(&mut self, frequency_hz: f64) -> Result<(), MiHomeError> {
        let [msb, mid, lsb] = frequency_registers(frequency_hz);
        self.write_verified(REG_FRFMSB, msb)?;
        self.write_verified(REG_FRFMID, mid)?;
        self.write_verified(REG_FRFLSB, lsb)?;
        debug!("Frequency set to: {:.3} MHz", frequency_hz / 1e6);
        Ok(())
    }

    /// Enters receive mode with an empty FIFO.
    pub async fn start_rx(&mut self, modulation: Modulation) -> Result<(), MiHomeError> {
        self.configure(modulation).await?;
        if modulation == Modulation::Ook {
            self.write_register(REG_PAYLOADLENGTH, OOK_FRAME_LENGTH as u8)?;
        }
        self.flush_fifo()?;
        self.set_mode(Rfm69Mode::Rx).await
    }

    /// Transmits one frame and returns to standby.
    pub async fn transmit(
        &mut self,
        payload: &[u8],
        modulation: Modulation,
    ) -> Result<(), MiHomeError> {
        if payload.is_empty() || payload.len() > FIFO_SIZE {
            return Err(MiHomeError::BadParameter(format!(
                "payload of {} bytes does not fit the FIFO",
                payload.len()
            )));
        }
        self.configure(modulation).await?;
        self.flush_fifo()?;
        if modulation == Modulation::Ook {
            self.write_register(REG_PAYLOADLENGTH, payload.len() as u8)?;
        }
        for &byte in payload {
            self.write_register(REG_FIFO, byte)?;
        }
        self.set_mode(Rfm69Mode::Tx).await?;
        self.wait_for_packet_sent().await?;
        self.standby().await
    }

    async fn wait_for_packet_sent(&mut self) -> Result<(), MiHomeError> {
        let start = Instant::now();
        while start.elapsed() < PACKET_SENT_TIMEOUT {
            if self.irq_flags2()?.contains(IrqFlags2::PACKET_SENT) {
                return Ok(());
            }
            sleep(Duration::from_millis(1)).await;
        }
        Err(MiHomeError::Timeout("Packet sent".to_string()))
    }

    /// Reads a complete frame if one is waiting in the FIFO.
    pub fn poll_frame(&mut self) -> Result<Option<Vec<u8>>, MiHomeError> {
        if self.current_mode != Rfm69Mode::Rx {
            return Ok(None);
        }
        if !self.irq_flags2()?.contains(IrqFlags2::PAYLOAD_READY) {
            return Ok(None);
        }
        match self.modulation {
            Some(Modulation::Fsk) => {
                let length = self.read_register(REG_FIFO)? as usize;
                if length == 0 || length >= FIFO_SIZE {
                    warn!("Discarding frame with length byte {}", length);
                    self.flush_fifo()?;
                    return Ok(None);
                }
                let mut frame = Vec::with_capacity(length + 1);
                frame.push(length as u8);
                for _ in 0..length {
                    frame.push(self.read_register(REG_FIFO)?);
                }
                Ok(Some(frame))
            }
            Some(Modulation::Ook) => {
                let mut frame = Vec::with_capacity(OOK_FRAME_LENGTH);
                for _ in 0..OOK_FRAME_LENGTH {
                    frame.push(self.read_register(REG_FIFO)?);
                }
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }

    /// Reads the on-chip temperature sensor.
    ///
    /// The chip can only measure in standby, so the radio leaves RX for the
    /// measurement and goes back to RX afterwards.
    pub async fn measure_temperature(&mut self, offset: f32) -> Result<f32, MiHomeError> {
        let previous = self.current_mode;
        self.standby().await?;
        let result = self.read_temperature(offset).await;
        if previous == Rfm69Mode::Rx {
            self.set_mode(Rfm69Mode::Rx).await?;
        }
        result
    }

    async fn read_temperature(&mut self, offset: f32) -> Result<f32, MiHomeError> {
        if self.read_register(REG_TEMP1)? & RF_TEMP1_MEAS_RUNNING != 0 {
            return Err(MiHomeError::SampleSkipped(
                "temperature measurement already running".to_string(),
            ));
        }
        self.write_register(REG_TEMP1, RF_TEMP1_MEAS_START)?;
        let start = Instant::now();
        while self.read_register(REG_TEMP1)? & RF_TEMP1_MEAS_RUNNING != 0 {
            if start.elapsed() >= TEMPERATURE_TIMEOUT {
                return Err(MiHomeError::Timeout("Temperature measurement".to_string()));
            }
            sleep(Duration::from_millis(1)).await;
        }
        let raw = self.read_register(REG_TEMP2)?;
        Ok((255 - raw) as f32 - 90.0 + offset)
    }

    pub fn set_led_rx(&mut self, on: bool) -> Result<(), MiHomeError> {
        if let Some(pin) = self.pins.led_rx {
            self.hal.set_pin(pin, on)?;
        }
        Ok(())
    }

    pub fn set_led_tx(&mut self, on: bool) -> Result<(), MiHomeError> {
        if let Some(pin) = self.pins.led_tx {
            self.hal.set_pin(pin, on)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::hal::MockHal;

    fn pins() -> RadioPins {
        RadioPins {
            reset: Some(25),
            led_rx: Some(27),
            led_tx: Some(22),
        }
    }

    #[tokio::test]
    async fn test_init_pulses_reset() {
        let hal = MockHal::new();
        let mut radio = Rfm69::new(hal.clone(), pins());
        radio.init().await.unwrap();
        assert_eq!(&hal.pin_history()[..2], &[(25, true), (25, false)]);
        assert_eq!(radio.mode(), Rfm69Mode::Standby);
    }

    #[tokio::test]
    async fn test_chip_identity() {
        let hal = MockHal::new();
        hal.set_version(0xFF);
        let mut radio = Rfm69::new(hal.clone(), pins());
        assert!(matches!(radio.init().await, Err(MiHomeError::DeviceNotFound)));

        hal.set_version(0x23);
        assert!(matches!(
            radio.init().await,
            Err(MiHomeError::InvalidDeviceIdentity(0x23))
        ));
    }

    #[tokio::test]
    async fn test_fsk_profile() {
        let hal = MockHal::new();
        let mut radio = Rfm69::new(hal.clone(), RadioPins::default());
        radio.init().await.unwrap();
        radio.configure(Modulation::Fsk).await.unwrap();
        assert_eq!(hal.register(REG_FRFMSB), 0x6C);
        assert_eq!(hal.register(REG_FRFMID), 0x93);
        assert_eq!(hal.register(REG_FRFLSB), 0x33);
        assert_eq!(hal.register(REG_SYNCVALUE1), 0x2D);
        assert_eq!(hal.register(REG_SYNCVALUE2), 0xD4);
        assert_eq!(hal.register(REG_DATAMODUL), RF_DATAMODUL_FSK);
    }

    #[tokio::test]
    async fn test_temperature() {
        let hal = MockHal::new();
        let mut radio = Rfm69::new(hal.clone(), RadioPins::default());
        radio.init().await.unwrap();
        hal.set_temperature_raw(144);
        assert_eq!(radio.measure_temperature(0.5).await.unwrap(), 21.5);

        hal.set_temperature_busy(true);
        assert!(matches!(
            radio.measure_temperature(0.0).await,
            Err(MiHomeError::SampleSkipped(_))
        ));
    }
}
