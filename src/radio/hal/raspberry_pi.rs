//! # Raspberry Pi HAL Implementation
//!
//! SPI register access and GPIO outputs for the ENER314-RT board, which
//! plugs onto the Raspberry Pi header.
//!
//! ```text
//! Pi Pin │ BCM GPIO │ ENER314-RT │ Function
//! ───────┼──────────┼────────────┼──────────────
//! 19     │ GPIO 10  │ MOSI       │ SPI data out
//! 21     │ GPIO 9   │ MISO       │ SPI data in
//! 23     │ GPIO 11  │ SCLK       │ SPI clock
//! 26     │ GPIO 7   │ NSS        │ Chip select (CE1)
//! 22     │ GPIO 25  │ RESET      │ Radio reset (active high)
//! 13     │ GPIO 27  │ LED1       │ Green, receive
//! 15     │ GPIO 22  │ LED2       │ Red, transmit
//! ```

use crate::radio::hal::{Hal, HalError};
use crate::radio::rfm69::RadioPins;
use rppal::gpio::{Gpio, Level, OutputPin};
use rppal::spi::{BitOrder, Bus, Mode, SlaveSelect, Spi};
use std::collections::HashMap;

/// Raspberry Pi HAL for the RFM69 on an ENER314-RT
pub struct RaspberryPiHal {
    spi: Spi,
    outputs: HashMap<u8, OutputPin>,
}

impl RaspberryPiHal {
    /// Opens SPI0 with the given chip select and claims the configured pins
    /// as outputs, all driven low.
    pub fn new(spi_slave: u8, spi_speed_hz: u32, pins: &RadioPins) -> Result<Self, HalError> {
        let slave_select = match spi_slave {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            other => {
                return Err(HalError::InvalidConfig(format!(
                    "Invalid SPI slave {other}, only 0-2 are supported"
                )))
            }
        };

        let spi = Spi::new(Bus::Spi0, slave_select, spi_speed_hz, Mode::Mode0)
            .map_err(|e| HalError::Spi(format!("SPI initialization failed: {e}")))?;
        spi.set_bit_order(BitOrder::MsbFirst)
            .map_err(|e| HalError::Spi(format!("SPI bit order: {e}")))?;

        let gpio = Gpio::new().map_err(|e| HalError::Gpio(format!("GPIO init failed: {e}")))?;
        let mut outputs = HashMap::new();
        for pin in pins.iter() {
            let mut output = gpio
                .get(pin)
                .map_err(|e| HalError::Gpio(format!("GPIO {pin}: {e}")))?
                .into_output();
            output.set_low();
            outputs.insert(pin, output);
        }

        log::info!("Raspberry Pi HAL initialized:");
        log::info!("  SPI: SPI0 CE{} at {} Hz", spi_slave, spi_speed_hz);
        if let Some(reset) = pins.reset {
            log::info!("  RESET: GPIO {}", reset);
        }
        if let Some(led) = pins.led_rx {
            log::info!("  LED1: GPIO {}", led);
        }
        if let Some(led) = pins.led_tx {
            log::info!("  LED2: GPIO {}", led);
        }

        Ok(Self { spi, outputs })
    }

    fn output(&mut self, pin: u8) -> Result<&mut OutputPin, HalError> {
        self.outputs.get_mut(&pin).ok_or(HalError::InvalidPin(pin))
    }
}

impl Hal for RaspberryPiHal {
    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), HalError> {
        self.spi
            .write(&[addr | 0x80, value])
            .map_err(|e| HalError::Spi(format!("Write register 0x{addr:02X} failed: {e}")))?;
        Ok(())
    }

    fn read_register(&mut self, addr: u8) -> Result<u8, HalError> {
        let mut read = [0u8; 2];
        self.spi
            .transfer(&mut read, &[addr & 0x7F, 0])
            .map_err(|e| HalError::Spi(format!("Read register 0x{addr:02X} failed: {e}")))?;
        Ok(read[1])
    }

    fn set_pin(&mut self, pin: u8, level: bool) -> Result<(), HalError> {
        let output = self.output(pin)?;
        output.write(if level { Level::High } else { Level::Low });
        Ok(())
    }

    fn read_pin(&mut self, pin: u8) -> Result<bool, HalError> {
        Ok(self.output(pin)?.is_set_high())
    }
}
