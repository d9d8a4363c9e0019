#![no_main]

use libfuzzer_sys::fuzz_target;
use mihome_rs::payload::{FieldType, ParameterName, ParameterRecord};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let Ok(field_type) = FieldType::from_byte(data[0]) else {
        return;
    };
    let Ok(record) = ParameterRecord::from_bytes(ParameterName::Temperature, true, field_type, &data[1..])
    else {
        return;
    };
    // Accessors never panic, whatever the declared type
    let _ = record.value();
    let _ = record.uint_value();
    let _ = record.int_value();
    let _ = record.float_value();
    let _ = record.string_value();
});
