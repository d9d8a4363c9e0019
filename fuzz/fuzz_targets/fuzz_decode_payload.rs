#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use mihome_rs::protocol::openthings;
use mihome_rs::ProtocolRegistry;

fuzz_target!(|data: &[u8]| {
    // Any input must decode or fail cleanly
    let registry = ProtocolRegistry::with_defaults();
    let _ = registry.decode(&Bytes::copy_from_slice(data));

    // Repair length, terminator and CRC so the record parser is reached
    if data.len() >= 6 && data.len() < 250 {
        let mut frame = data.to_vec();
        frame.push(0x00);
        let crc = openthings::crc16(&frame[5..]);
        frame.extend_from_slice(&crc.to_be_bytes());
        frame[0] = (frame.len() - 1) as u8;
        let _ = openthings::decode_frame(&frame);
    }
});
