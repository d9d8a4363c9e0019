//! Mock RFM69 for testing
//!
//! Simulates the parts of the RFM69 register file the driver touches: mode
//! switching with an immediate mode-ready flag, the FIFO, PACKETSENT and
//! PAYLOADREADY, the chip version and the temperature sensor. Clones share
//! state, so a test keeps one handle to queue inbound frames and inspect
//! transmissions while the driver owns another.

use crate::radio::hal::{Hal, HalError};
use crate::radio::registers::*;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// A frame the mock transmitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRecord {
    pub payload: Vec<u8>,
    /// REG_DATAMODUL at the time of transmission
    pub data_modul: u8,
}

#[derive(Debug)]
struct MockState {
    registers: [u8; 0x80],
    fifo: VecDeque<u8>,
    /// FIFO holds a complete frame
    payload_ready: bool,
    packet_sent: bool,
    rx_queue: VecDeque<Vec<u8>>,
    tx_log: Vec<TxRecord>,
    transmit_attempts: u32,
    fail_transmit_at: Option<u32>,
    bus_failure: bool,
    gpio_failure: bool,
    temperature_busy: bool,
    temperature_raw: u8,
    opmode_history: Vec<u8>,
    pins: HashMap<u8, bool>,
    pin_history: Vec<(u8, bool)>,
}

impl Default for MockState {
    fn default() -> Self {
        let mut registers = [0u8; 0x80];
        registers[REG_VERSION as usize] = RF_VERSION;
        registers[REG_OPMODE as usize] = RF_OPMODE_STANDBY;
        registers[REG_IRQFLAGS1 as usize] = IrqFlags1::MODE_READY.bits();
        Self {
            registers,
            fifo: VecDeque::new(),
            payload_ready: false,
            packet_sent: false,
            rx_queue: VecDeque::new(),
            tx_log: Vec::new(),
            transmit_attempts: 0,
            fail_transmit_at: None,
            bus_failure: false,
            gpio_failure: false,
            temperature_busy: false,
            // 21 degrees before offset
            temperature_raw: 144,
            opmode_history: Vec::new(),
            pins: HashMap::new(),
            pin_history: Vec::new(),
        }
    }
}

impl MockState {
    fn mode(&self) -> u8 {
        self.registers[REG_OPMODE as usize] & RF_OPMODE_MASK
    }

    /// Loads the next queued frame when the receiver is idle.
    fn deliver(&mut self) {
        if self.mode() == RF_OPMODE_RECEIVER && self.fifo.is_empty() {
            if let Some(frame) = self.rx_queue.pop_front() {
                self.fifo.extend(frame);
                self.payload_ready = true;
            }
        }
    }

    fn flags2(&mut self) -> u8 {
        self.deliver();
        let mut flags = IrqFlags2::empty();
        if !self.fifo.is_empty() {
            flags |= IrqFlags2::FIFO_NOT_EMPTY;
        }
        if self.payload_ready && self.mode() == RF_OPMODE_RECEIVER {
            flags |= IrqFlags2::PAYLOAD_READY;
        }
        if self.packet_sent {
            flags |= IrqFlags2::PACKET_SENT;
        }
        flags.bits()
    }

    fn set_opmode(&mut self, value: u8) -> Result<(), HalError> {
        let mode = value & RF_OPMODE_MASK;
        self.registers[REG_OPMODE as usize] = value;
        self.opmode_history.push(mode);
        match mode {
            RF_OPMODE_TRANSMITTER => {
                self.transmit_attempts += 1;
                if self.fail_transmit_at == Some(self.transmit_attempts) {
                    self.registers[REG_OPMODE as usize] = RF_OPMODE_STANDBY;
                    return Err(HalError::Spi(format!(
                        "transmit {} failed",
                        self.transmit_attempts
                    )));
                }
                let payload: Vec<u8> = self.fifo.drain(..).collect();
                self.tx_log.push(TxRecord {
                    payload,
                    data_modul: self.registers[REG_DATAMODUL as usize],
                });
                self.packet_sent = true;
            }
            _ => {
                self.packet_sent = false;
            }
        }
        Ok(())
    }
}

/// In-memory RFM69
#[derive(Debug, Clone, Default)]
pub struct MockHal {
    state: Arc<Mutex<MockState>>,
}

impl MockHal {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a frame to be received once the radio is in RX mode
    pub fn queue_rx_frame(&self, frame: &[u8]) {
        self.state().rx_queue.push_back(frame.to_vec());
    }

    /// Put bytes in the FIFO without completing a frame
    pub fn inject_partial_frame(&self, bytes: &[u8]) {
        let mut state = self.state();
        state.fifo.extend(bytes.iter().copied());
        state.payload_ready = false;
    }

    /// Frames transmitted so far
    pub fn transmitted(&self) -> Vec<TxRecord> {
        self.state().tx_log.clone()
    }

    /// Make the `n`th transmit attempt (1-based, counted from now on) fail
    pub fn fail_transmit_at(&self, n: u32) {
        let mut state = self.state();
        let base = state.transmit_attempts;
        state.fail_transmit_at = Some(base + n);
    }

    /// Make every bus access fail
    pub fn set_bus_failure(&self, failing: bool) {
        self.state().bus_failure = failing;
    }

    /// Make pin access fail while registers keep working
    pub fn set_gpio_failure(&self, failing: bool) {
        self.state().gpio_failure = failing;
    }

    /// Value returned by REG_VERSION
    pub fn set_version(&self, version: u8) {
        self.state().registers[REG_VERSION as usize] = version;
    }

    /// Raw REG_TEMP2 reading
    pub fn set_temperature_raw(&self, raw: u8) {
        self.state().temperature_raw = raw;
    }

    /// Report a temperature measurement as already running
    pub fn set_temperature_busy(&self, busy: bool) {
        self.state().temperature_busy = busy;
    }

    /// Current REG_OPMODE mode bits
    pub fn opmode(&self) -> u8 {
        self.state().mode()
    }

    /// Every mode written to REG_OPMODE, oldest first
    pub fn opmode_history(&self) -> Vec<u8> {
        self.state().opmode_history.clone()
    }

    pub fn fifo_len(&self) -> usize {
        self.state().fifo.len()
    }

    /// Last level driven on a pin
    pub fn pin(&self, pin: u8) -> Option<bool> {
        self.state().pins.get(&pin).copied()
    }

    /// Every pin write, oldest first
    pub fn pin_history(&self) -> Vec<(u8, bool)> {
        self.state().pin_history.clone()
    }

    /// Raw register contents
    pub fn register(&self, addr: u8) -> u8 {
        self.state().registers[(addr & 0x7F) as usize]
    }
}

impl Hal for MockHal {
    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), HalError> {
        let mut state = self.state();
        if state.bus_failure {
            return Err(HalError::Spi("bus failure".to_string()));
        }
        match addr {
            REG_FIFO => state.fifo.push_back(value),
            REG_OPMODE => state.set_opmode(value)?,
            REG_IRQFLAGS2 => {
                if IrqFlags2::from_bits_truncate(value).contains(IrqFlags2::FIFO_OVERRUN) {
                    state.fifo.clear();
                    state.payload_ready = false;
                }
            }
            REG_VERSION | REG_IRQFLAGS1 | REG_TEMP2 => {}
            REG_TEMP1 => {
                if value & RF_TEMP1_MEAS_START != 0 && !state.temperature_busy {
                    let raw = state.temperature_raw;
                    state.registers[REG_TEMP2 as usize] = raw;
                }
            }
            other => state.registers[(other & 0x7F) as usize] = value,
        }
        Ok(())
    }

    fn read_register(&mut self, addr: u8) -> Result<u8, HalError> {
        let mut state = self.state();
        if state.bus_failure {
            return Err(HalError::Spi("bus failure".to_string()));
        }
        let value = match addr {
            REG_FIFO => {
                state.deliver();
                let byte = state.fifo.pop_front().unwrap_or(0);
                if state.fifo.is_empty() {
                    state.payload_ready = false;
                }
                byte
            }
            REG_IRQFLAGS2 => state.flags2(),
            REG_TEMP1 => {
                if state.temperature_busy {
                    RF_TEMP1_MEAS_RUNNING
                } else {
                    0
                }
            }
            other => state.registers[(other & 0x7F) as usize],
        };
        Ok(value)
    }

    fn set_pin(&mut self, pin: u8, level: bool) -> Result<(), HalError> {
        let mut state = self.state();
        if state.bus_failure || state.gpio_failure {
            return Err(HalError::Gpio("bus failure".to_string()));
        }
        state.pins.insert(pin, level);
        state.pin_history.push((pin, level));
        Ok(())
    }

    fn read_pin(&mut self, pin: u8) -> Result<bool, HalError> {
        let state = self.state();
        if state.bus_failure || state.gpio_failure {
            return Err(HalError::Gpio("bus failure".to_string()));
        }
        Ok(state.pins.get(&pin).copied().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transmit_records_fifo() {
        let mut hal = MockHal::new();
        for b in [1u8, 2, 3] {
            hal.write_register(REG_FIFO, b).unwrap();
        }
        hal.write_register(REG_OPMODE, RF_OPMODE_TRANSMITTER).unwrap();
        assert_eq!(hal.transmitted()[0].payload, vec![1, 2, 3]);
        let flags = IrqFlags2::from_bits_truncate(hal.read_register(REG_IRQFLAGS2).unwrap());
        assert!(flags.contains(IrqFlags2::PACKET_SENT));
    }

    #[test]
    fn test_receive_delivers_queued_frame() {
        let mut hal = MockHal::new();
        hal.queue_rx_frame(&[2, 0xAA, 0xBB]);
        // nothing arrives outside RX mode
        assert_eq!(hal.read_register(REG_IRQFLAGS2).unwrap(), 0);

        hal.write_register(REG_OPMODE, RF_OPMODE_RECEIVER).unwrap();
        let flags = IrqFlags2::from_bits_truncate(hal.read_register(REG_IRQFLAGS2).unwrap());
        assert!(flags.contains(IrqFlags2::PAYLOAD_READY));
        assert_eq!(hal.read_register(REG_FIFO).unwrap(), 2);
        assert_eq!(hal.read_register(REG_FIFO).unwrap(), 0xAA);
        assert_eq!(hal.read_register(REG_FIFO).unwrap(), 0xBB);
        assert_eq!(hal.fifo_len(), 0);
    }

    #[test]
    fn test_injected_transmit_fault() {
        let mut hal = MockHal::new();
        hal.fail_transmit_at(2);
        assert!(hal.write_register(REG_OPMODE, RF_OPMODE_TRANSMITTER).is_ok());
        assert!(hal.write_register(REG_OPMODE, RF_OPMODE_TRANSMITTER).is_err());
        assert!(hal.write_register(REG_OPMODE, RF_OPMODE_TRANSMITTER).is_ok());
    }
}
