//! The payload module contains the typed parameter records carried inside
//! OpenThings telemetry payloads and the codec for their values.

pub mod data_encoding;
pub mod record;

pub use data_encoding::{decode_value, encode_value};
pub use record::{DataType, FieldType, ParameterName, ParameterRecord, RecordValue};
