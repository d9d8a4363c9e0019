//! # Hardware Abstraction Layer for Radio Hardware
//!
//! The RFM69 driver only needs register access over SPI and a handful of
//! GPIO lines (reset and the two status LEDs on the ENER314-RT). Platform
//! implementations provide exactly that.

use thiserror::Error;

/// Errors that can occur during HAL operations
#[derive(Debug, Error)]
pub enum HalError {
    #[error("SPI communication error: {0}")]
    Spi(String),

    #[error("GPIO operation error: {0}")]
    Gpio(String),

    #[error("Invalid pin: {0}")]
    InvalidPin(u8),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Hardware Abstraction Layer trait for RFM69 register access
pub trait Hal: Send {
    /// Write one radio register
    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), HalError>;

    /// Read one radio register
    fn read_register(&mut self, addr: u8) -> Result<u8, HalError>;

    /// Drive a GPIO output
    fn set_pin(&mut self, pin: u8, level: bool) -> Result<(), HalError>;

    /// Read back a GPIO line
    fn read_pin(&mut self, pin: u8) -> Result<bool, HalError>;
}

impl<H: Hal + ?Sized> Hal for Box<H> {
    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), HalError> {
        (**self).write_register(addr, value)
    }

    fn read_register(&mut self, addr: u8) -> Result<u8, HalError> {
        (**self).read_register(addr)
    }

    fn set_pin(&mut self, pin: u8, level: bool) -> Result<(), HalError> {
        (**self).set_pin(pin, level)
    }

    fn read_pin(&mut self, pin: u8) -> Result<bool, HalError> {
        (**self).read_pin(pin)
    }
}

pub mod mock;

// Platform implementations
#[cfg(feature = "raspberry-pi")]
pub mod raspberry_pi;

pub use mock::MockHal;

#[cfg(feature = "raspberry-pi")]
pub use raspberry_pi::RaspberryPiHal;
