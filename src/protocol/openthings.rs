//! # OpenThings Frames
//!
//! Framing used by monitor devices:
//!
//! ```text
//! len | manufacturer | product | pip (2) | sensor id (3) | records... | 0x00 | crc (2)
//! ```
//!
//! `len` counts the bytes that follow it. The CRC is CRC-16/XMODEM over the
//! sensor id, records and terminator. Each record is a parameter byte (bit 7
//! set for requests), a `type << 4 | width` byte and `width` data bytes.
//! Encrypted frames are not supported; pip is written as zero and ignored.

use crate::constants::{
    OT_CRC_OFFSET, OT_FRAME_MAX_LENGTH, OT_HEADER_LENGTH, OT_PARAM_MASK, OT_PARAM_REQUEST_BIT,
    OT_RECORD_TERMINATOR, OT_SENSOR_ID_MAX,
};
use crate::device::{DeviceKey, Manufacturer, Mode, Product};
use crate::error::MiHomeError;
use crate::message::{Message, TelemetryMessage};
use crate::payload::record::{FieldType, ParameterName, ParameterRecord};
use crate::protocol::Protocol;
use bytes::Bytes;
use crc::{Crc, CRC_16_XMODEM};
use nom::{
    bytes::complete::take,
    number::complete::{be_u16, be_u24, be_u8},
    IResult,
};
use std::time::SystemTime;

const OT_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Length byte, header, terminator and CRC of a frame with no records
const OT_FRAME_OVERHEAD: usize = 1 + OT_HEADER_LENGTH + 1 + 2;

/// CRC-16/XMODEM as used by OpenThings.
pub fn crc16(data: &[u8]) -> u16 {
    OT_CRC.checksum(data)
}

/// Frame header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub manufacturer: u8,
    pub product: u8,
    pub pip: u16,
    pub sensor_id: u32,
}

/// Record as laid out on the wire, before interpretation.
struct RawRecord<'a> {
    param: u8,
    type_byte: u8,
    data: &'a [u8],
}

fn parse_header(input: &[u8]) -> IResult<&[u8], FrameHeader> {
    let (input, manufacturer) = be_u8(input)?;
    let (input, product) = be_u8(input)?;
    let (input, pip) = be_u16(input)?;
    let (input, sensor_id) = be_u24(input)?;
    Ok((
        input,
        FrameHeader {
            manufacturer,
            product,
            pip,
            sensor_id,
        },
    ))
}

fn parse_raw_record(input: &[u8]) -> IResult<&[u8], RawRecord<'_>> {
    let (input, param) = be_u8(input)?;
    let (input, type_byte) = be_u8(input)?;
    let (input, data) = take((type_byte & 0x0F) as usize)(input)?;
    Ok((
        input,
        RawRecord {
            param,
            type_byte,
            data,
        },
    ))
}

fn decode_record(raw: RawRecord<'_>) -> Result<ParameterRecord, MiHomeError> {
    if raw.param == OT_RECORD_TERMINATOR {
        return Err(MiHomeError::RecordDecodeError(
            "terminator inside record list".to_string(),
        ));
    }
    let name = ParameterName::from_id(raw.param & OT_PARAM_MASK)?;
    let is_report = raw.param & OT_PARAM_REQUEST_BIT == 0;
    let field = FieldType::from_byte(raw.type_byte)?;
    ParameterRecord::from_bytes(name, is_report, field, raw.data)
}

/// Checks length, terminator and CRC, returning the bytes between the length
/// byte and the terminator.
fn validate_frame(payload: &[u8]) -> Result<&[u8], MiHomeError> {
    if payload.len() < OT_FRAME_OVERHEAD {
        return Err(MiHomeError::InvalidFrame(format!(
            "frame too short: {} bytes",
            payload.len()
        )));
    }
    let declared = payload[0] as usize;
    if declared + 1 != payload.len() {
        return Err(MiHomeError::InvalidFrame(format!(
            "length byte says {} bytes, frame has {}",
            declared,
            payload.len() - 1
        )));
    }
    let crc_start = payload.len() - 2;
    let terminator = crc_start - 1;
    if payload[terminator] != OT_RECORD_TERMINATOR {
        return Err(MiHomeError::InvalidFrame(
            "missing record terminator".to_string(),
        ));
    }
    let received = u16::from_be_bytes([payload[crc_start], payload[crc_start + 1]]);
    let calculated = crc16(&payload[OT_CRC_OFFSET..crc_start]);
    if received != calculated {
        return Err(MiHomeError::InvalidFrame(format!(
            "CRC mismatch: received 0x{received:04X}, calculated 0x{calculated:04X}"
        )));
    }
    Ok(&payload[1..terminator])
}

/// Decodes a complete frame into its header and records.
pub fn decode_frame(payload: &[u8]) -> Result<(FrameHeader, Vec<ParameterRecord>), MiHomeError> {
    let body = validate_frame(payload)?;
    let (mut rest, header) = parse_header(body)
        .map_err(|e| MiHomeError::InvalidFrame(format!("bad header: {e:?}")))?;

    let mut records = Vec::new();
    while !rest.is_empty() {
        let (next, raw) = parse_raw_record(rest).map_err(|_| {
            MiHomeError::RecordDecodeError(format!(
                "truncated record at offset {}",
                body.len() - rest.len() + 1
            ))
        })?;
        records.push(decode_record(raw)?);
        rest = next;
    }
    if records.is_empty() {
        return Err(MiHomeError::RecordDecodeError(
            "frame carries no records".to_string(),
        ));
    }
    Ok((header, records))
}

/// Encodes `records` addressed to `key` into a complete frame.
pub fn encode_frame(key: DeviceKey, records: &[ParameterRecord]) -> Result<Vec<u8>, MiHomeError> {
    if key.sensor_id() > OT_SENSOR_ID_MAX {
        return Err(MiHomeError::BadParameter(format!(
            "sensor id 0x{:X} does not fit three bytes",
            key.sensor_id()
        )));
    }
    if records.is_empty() {
        return Err(MiHomeError::BadParameter(
            "a frame needs at least one record".to_string(),
        ));
    }

    let mut frame = Vec::with_capacity(OT_FRAME_MAX_LENGTH);
    frame.push(0); // length, patched below
    frame.push(key.manufacturer() as u8);
    frame.push(key.product().code());
    frame.extend_from_slice(&[0, 0]);
    frame.extend_from_slice(&key.sensor_id().to_be_bytes()[1..]);
    for record in records {
        let mut param = record.name().id();
        if !record.is_report() {
            param |= OT_PARAM_REQUEST_BIT;
        }
        frame.push(param);
        frame.push(record.field_type().to_byte());
        frame.extend_from_slice(record.data());
    }
    frame.push(OT_RECORD_TERMINATOR);
    let crc = crc16(&frame[OT_CRC_OFFSET..]);
    frame.extend_from_slice(&crc.to_be_bytes());

    if frame.len() > OT_FRAME_MAX_LENGTH {
        return Err(MiHomeError::BadParameter(format!(
            "frame of {} bytes exceeds {}",
            frame.len(),
            OT_FRAME_MAX_LENGTH
        )));
    }
    frame[0] = (frame.len() - 1) as u8;
    Ok(frame)
}

/// OpenThings telemetry protocol for monitor devices
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenThingsProtocol;

impl OpenThingsProtocol {
    pub const NAME: &'static str = "openthings";

    pub fn new() -> Self {
        Self
    }
}

impl Protocol for OpenThingsProtocol {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn decode(&self, payload: &Bytes) -> Result<Message, MiHomeError> {
        let (header, records) = decode_frame(payload)?;
        let manufacturer = Manufacturer::try_from(header.manufacturer)
            .map_err(|e| MiHomeError::InvalidFrame(e.to_string()))?;
        let product = Product::try_from(header.product)
            .map_err(|e| MiHomeError::InvalidFrame(e.to_string()))?;
        if product.mode() != Mode::Monitor {
            return Err(MiHomeError::InvalidFrame(format!(
                "{product} is not a monitor product"
            )));
        }
        let sender = DeviceKey::new(manufacturer, product, header.sensor_id);
        Ok(Message::Telemetry(TelemetryMessage::new(
            sender,
            SystemTime::now(),
            records,
            payload.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::record::{DataType, RecordValue};

    fn temperature_report() -> Vec<u8> {
        let record = ParameterRecord::from_value(
            ParameterName::Temperature,
            true,
            FieldType::new(DataType::Dec8, 2).unwrap(),
            &RecordValue::Float(21.5),
        )
        .unwrap();
        encode_frame(DeviceKey::energenie(Product::Miho013, 0x00_1234), &[record]).unwrap()
    }

    #[test]
    fn test_crc_xmodem_check_value() {
        assert_eq!(crc16(b"123456789"), 0x31C3);
    }

    #[test]
    fn test_encode_layout() {
        let frame = temperature_report();
        assert_eq!(
            frame,
            vec![
                0x0E, 0x04, 0x03, 0x00, 0x00, 0x00, 0x12, 0x34, 0x74, 0x92, 0x15, 0x80, 0x00,
                frame[13], frame[14]
            ]
        );
        assert_eq!(frame[0] as usize, frame.len() - 1);
    }

    #[test]
    fn test_decode_frame() {
        let (header, records) = decode_frame(&temperature_report()).unwrap();
        assert_eq!(header.sensor_id, 0x1234);
        assert_eq!(records.len(), 1);
        assert!(records[0].is_report());
        assert_eq!(records[0].float_value().unwrap(), 21.5);
    }

    #[test]
    fn test_crc_mismatch() {
        let mut frame = temperature_report();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert!(matches!(
            decode_frame(&frame).unwrap_err(),
            MiHomeError::InvalidFrame(_)
        ));
    }

    #[test]
    fn test_empty_record_list_rejected() {
        let mut frame = vec![0x0A, 0x04, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00];
        let crc = crc16(&frame[OT_CRC_OFFSET..]);
        frame.extend_from_slice(&crc.to_be_bytes());
        assert!(matches!(
            decode_frame(&frame).unwrap_err(),
            MiHomeError::RecordDecodeError(_)
        ));
    }
}
