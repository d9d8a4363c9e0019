//! # OOK Control Frames
//!
//! Control sockets listen for a fixed 16-byte frame: a four byte preamble
//! followed by 24 bits, each carried as one nibble (`0x8` for 0, `0xE` for 1).
//! The first 20 bits are the house address, the last four the command: bit 3
//! is the requested state and bits 2..0 select the socket.

use crate::constants::{
    OOK_ADDRESS_BITS, OOK_ADDRESS_MAX, OOK_BIT_ONE, OOK_BIT_ZERO, OOK_FRAME_LENGTH, OOK_PREAMBLE,
};
use crate::error::MiHomeError;
use crate::message::{ControlMessage, Message};
use crate::protocol::Protocol;
use bytes::Bytes;
use std::time::SystemTime;

const COMMAND_BITS: u32 = 4;
const STATE_BIT: u8 = 0x08;
const SOCKET_MASK: u8 = 0x07;

/// Socket code (bits 2..0 of the command) for sockets 0 (all) to 4
const SOCKET_CODES: [u8; 5] = [0b011, 0b111, 0b110, 0b101, 0b100];

/// Command nibble code for a socket number.
pub fn socket_code(socket: u8) -> Result<u8, MiHomeError> {
    SOCKET_CODES
        .get(socket as usize)
        .copied()
        .ok_or_else(|| MiHomeError::BadParameter(format!("socket {socket} is not 0-4")))
}

/// Socket number for a command nibble code.
pub fn socket_from_code(code: u8) -> Result<u8, MiHomeError> {
    SOCKET_CODES
        .iter()
        .position(|&c| c == code & SOCKET_MASK)
        .map(|s| s as u8)
        .ok_or(MiHomeError::UnknownSocketError(code & SOCKET_MASK))
}

/// Encodes an on/off frame for `socket` on house address `addr`.
pub fn encode_frame(addr: u32, socket: u8, state: bool) -> Result<Vec<u8>, MiHomeError> {
    if addr > OOK_ADDRESS_MAX {
        return Err(MiHomeError::BadParameter(format!(
            "address 0x{addr:X} does not fit {OOK_ADDRESS_BITS} bits"
        )));
    }
    let mut command = socket_code(socket)?;
    if state {
        command |= STATE_BIT;
    }
    let bits = (addr << COMMAND_BITS) | command as u32;
    let total = OOK_ADDRESS_BITS + COMMAND_BITS;

    let mut frame = Vec::with_capacity(OOK_FRAME_LENGTH);
    frame.extend_from_slice(&OOK_PREAMBLE);
    for pair in (0..total).step_by(2) {
        let hi = nibble(bits, total - 1 - pair);
        let lo = nibble(bits, total - 2 - pair);
        frame.push((hi << 4) | lo);
    }
    Ok(frame)
}

fn nibble(bits: u32, index: u32) -> u8 {
    if (bits >> index) & 1 == 1 {
        OOK_BIT_ONE
    } else {
        OOK_BIT_ZERO
    }
}

fn bit_of(nibble: u8) -> Result<u32, MiHomeError> {
    match nibble {
        OOK_BIT_ZERO => Ok(0),
        OOK_BIT_ONE => Ok(1),
        other => Err(MiHomeError::InvalidFrame(format!(
            "invalid bit symbol 0x{other:X}"
        ))),
    }
}

/// Decodes a frame into (address, socket, state).
pub fn decode_frame(payload: &[u8]) -> Result<(u32, u8, bool), MiHomeError> {
    if payload.len() != OOK_FRAME_LENGTH {
        return Err(MiHomeError::InvalidFrame(format!(
            "expected {} bytes, got {}",
            OOK_FRAME_LENGTH,
            payload.len()
        )));
    }
    if payload[..OOK_PREAMBLE.len()] != OOK_PREAMBLE {
        return Err(MiHomeError::InvalidFrame("missing preamble".to_string()));
    }
    let mut bits = 0u32;
    for &byte in &payload[OOK_PREAMBLE.len()..] {
        bits = (bits << 1) | bit_of(byte >> 4)?;
        bits = (bits << 1) | bit_of(byte & 0x0F)?;
    }
    let addr = bits >> COMMAND_BITS;
    let command = (bits & 0x0F) as u8;
    let socket = socket_from_code(command)?;
    Ok((addr, socket, command & STATE_BIT != 0))
}

/// Legacy on/off protocol for control sockets
#[derive(Debug, Default, Clone, Copy)]
pub struct OokProtocol;

impl OokProtocol {
    pub const NAME: &'static str = "ook";

    pub fn new() -> Self {
        Self
    }
}

impl Protocol for OokProtocol {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn decode(&self, payload: &Bytes) -> Result<Message, MiHomeError> {
        let (addr, socket, state) = decode_frame(payload)?;
        Ok(Message::Control(ControlMessage::new(
            addr,
            socket,
            state,
            SystemTime::now(),
            payload.clone(),
        )))
    }
}
