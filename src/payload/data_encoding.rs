//! # Record Value Encoding and Decoding
//!
//! Lossless conversion between a scalar value and the big-endian bytes of an
//! OpenThings record. Numeric types are fixed-point with a binary point of
//! `w` bits, so the wire integer is `round(value * 2^w)`; unsigned types use
//! a plain big-endian integer, signed types two's complement. Strings are raw
//! UTF-8 whose length is carried by the record's type/length byte.
//!
//! Widths are always exact: a byte sequence that does not match the declared
//! width is rejected rather than truncated or padded.

use crate::error::MiHomeError;
use crate::payload::record::{DataType, FieldType, RecordValue};

/// Largest width a numeric record can carry (64-bit accumulator)
pub const MAX_NUMERIC_WIDTH: usize = 8;

/// Encodes `value` into exactly `field.width()` bytes.
pub fn encode_value(value: &RecordValue, field: FieldType) -> Result<Vec<u8>, MiHomeError> {
    let width = field.width();
    let data_type = field.data_type();

    match data_type {
        DataType::String => match value {
            RecordValue::String(s) => {
                if s.len() != width {
                    return Err(MiHomeError::BadParameter(format!(
                        "string of {} bytes does not fit a {}-byte field",
                        s.len(),
                        width
                    )));
                }
                Ok(s.as_bytes().to_vec())
            }
            other => Err(type_mismatch(other, data_type)),
        },
        DataType::Float => Err(MiHomeError::BadParameter(
            "no encoding rule for FLOAT records".to_string(),
        )),
        _ if data_type.is_signed() => {
            let raw = signed_raw(value, data_type)?;
            if !fits_signed(raw, width) {
                return Err(out_of_range(value, field));
            }
            Ok(write_be(raw as u64, width))
        }
        _ => {
            let raw = unsigned_raw(value, data_type)?;
            if !fits_unsigned(raw, width) {
                return Err(out_of_range(value, field));
            }
            Ok(write_be(raw, width))
        }
    }
}

/// Decodes `bytes` as a value of `field`, which must match its width exactly.
pub fn decode_value(bytes: &[u8], field: FieldType) -> Result<RecordValue, MiHomeError> {
    let data_type = field.data_type();
    if bytes.len() != field.width() {
        return Err(MiHomeError::RecordDecodeError(format!(
            "expected {} bytes for {}, got {}",
            field.width(),
            data_type,
            bytes.len()
        )));
    }

    match data_type {
        DataType::String => std::str::from_utf8(bytes)
            .map(|s| RecordValue::String(s.to_string()))
            .map_err(|e| MiHomeError::RecordDecodeError(format!("invalid UTF-8: {e}"))),
        DataType::Float => Err(MiHomeError::RecordDecodeError(
            "no decoding rule for FLOAT records".to_string(),
        )),
        DataType::UDec0 => Ok(RecordValue::Uint(read_be(bytes))),
        DataType::Dec0 => Ok(RecordValue::Int(sign_extend(read_be(bytes), bytes.len()))),
        _ => {
            let scale = scale_of(data_type);
            let raw = if data_type.is_signed() {
                sign_extend(read_be(bytes), bytes.len()) as f64
            } else {
                read_be(bytes) as f64
            };
            Ok(RecordValue::Float(raw / scale))
        }
    }
}

/// Reads a big-endian unsigned integer of up to eight bytes.
pub fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Writes the low `width` bytes of `raw` in big-endian order.
pub fn write_be(raw: u64, width: usize) -> Vec<u8> {
    (0..width)
        .rev()
        .map(|i| if i >= 8 { 0 } else { (raw >> (i * 8)) as u8 })
        .collect()
}

/// Sign-extends a `width`-byte two's complement value.
pub fn sign_extend(raw: u64, width: usize) -> i64 {
    if width == 0 || width >= MAX_NUMERIC_WIDTH {
        return raw as i64;
    }
    let shift = 64 - width * 8;
    ((raw << shift) as i64) >> shift
}

fn scale_of(data_type: DataType) -> f64 {
    (1u64 << data_type.binary_point().unwrap_or(0)) as f64
}

fn unsigned_raw(value: &RecordValue, data_type: DataType) -> Result<u64, MiHomeError> {
    match value {
        RecordValue::Uint(v) if data_type.binary_point() == Some(0) => Ok(*v),
        RecordValue::Uint(v) => scaled(*v as f64, data_type).and_then(|r| non_negative(r, value)),
        RecordValue::Int(v) if *v < 0 => Err(MiHomeError::BadParameter(format!(
            "negative value {v} for unsigned {data_type}"
        ))),
        RecordValue::Int(v) => scaled(*v as f64, data_type).and_then(|r| non_negative(r, value)),
        RecordValue::Float(v) => scaled(*v, data_type).and_then(|r| non_negative(r, value)),
        RecordValue::String(_) => Err(type_mismatch(value, data_type)),
    }
}

fn signed_raw(value: &RecordValue, data_type: DataType) -> Result<i64, MiHomeError> {
    let scaled_value = match value {
        RecordValue::Int(v) if data_type.binary_point() == Some(0) => return Ok(*v),
        RecordValue::Uint(v) if data_type.binary_point() == Some(0) => {
            return i64::try_from(*v).map_err(|_| {
                MiHomeError::BadParameter(format!("value {v} out of range for {data_type}"))
            })
        }
        RecordValue::Uint(v) => scaled(*v as f64, data_type)?,
        RecordValue::Int(v) => scaled(*v as f64, data_type)?,
        RecordValue::Float(v) => scaled(*v, data_type)?,
        RecordValue::String(_) => return Err(type_mismatch(value, data_type)),
    };
    if scaled_value < i64::MIN as f64 || scaled_value >= i64::MAX as f64 {
        return Err(MiHomeError::BadParameter(format!(
            "value out of range for {data_type}"
        )));
    }
    Ok(scaled_value as i64)
}

fn scaled(value: f64, data_type: DataType) -> Result<f64, MiHomeError> {
    if !value.is_finite() {
        return Err(MiHomeError::BadParameter(format!(
            "non-finite value for {data_type}"
        )));
    }
    Ok((value * scale_of(data_type)).round())
}

fn non_negative(raw: f64, value: &RecordValue) -> Result<u64, MiHomeError> {
    if raw < 0.0 || raw >= u64::MAX as f64 {
        return Err(MiHomeError::BadParameter(format!(
            "value {value:?} out of range for an unsigned record"
        )));
    }
    Ok(raw as u64)
}

fn fits_unsigned(raw: u64, width: usize) -> bool {
    width >= MAX_NUMERIC_WIDTH || raw >> (width * 8) == 0
}

fn fits_signed(raw: i64, width: usize) -> bool {
    if width >= MAX_NUMERIC_WIDTH {
        return true;
    }
    if width == 0 {
        return raw == 0;
    }
    let bits = width * 8 - 1;
    let min = -(1i64 << bits);
    let max = (1i64 << bits) - 1;
    (min..=max).contains(&raw)
}

fn out_of_range(value: &RecordValue, field: FieldType) -> MiHomeError {
    MiHomeError::BadParameter(format!(
        "value {:?} does not fit {} bytes of {}",
        value,
        field.width(),
        field.data_type()
    ))
}

fn type_mismatch(value: &RecordValue, data_type: DataType) -> MiHomeError {
    MiHomeError::TypeMismatchError {
        requested: value.kind(),
        actual: data_type.name(),
    }
}
