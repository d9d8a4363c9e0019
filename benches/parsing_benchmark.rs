use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mihome_rs::payload::{DataType, FieldType, ParameterName, ParameterRecord, RecordValue};
use mihome_rs::protocol::{ook, openthings};
use mihome_rs::{DeviceKey, Product, ProtocolRegistry};

fn power_report() -> Vec<u8> {
    let records = vec![
        ParameterRecord::from_value(
            ParameterName::RealPower,
            true,
            FieldType::new(DataType::Dec0, 2).unwrap(),
            &RecordValue::Int(1250),
        )
        .unwrap(),
        ParameterRecord::from_value(
            ParameterName::Voltage,
            true,
            FieldType::new(DataType::UDec0, 1).unwrap(),
            &RecordValue::Uint(241),
        )
        .unwrap(),
        ParameterRecord::from_value(
            ParameterName::Temperature,
            true,
            FieldType::new(DataType::Dec8, 2).unwrap(),
            &RecordValue::Float(21.5),
        )
        .unwrap(),
    ];
    openthings::encode_frame(DeviceKey::energenie(Product::Miho004, 0x0ABC), &records).unwrap()
}

fn benchmark_decode(c: &mut Criterion) {
    let registry = ProtocolRegistry::with_defaults();
    let report = Bytes::from(power_report());
    let switch = Bytes::from(ook::encode_frame(0x6C6C6, 3, true).unwrap());

    c.bench_function("decode_openthings", |b| {
        b.iter(|| {
            let _ = black_box(registry.decode(black_box(&report)));
        })
    });

    // falls through openthings first
    c.bench_function("decode_ook", |b| {
        b.iter(|| {
            let _ = black_box(registry.decode(black_box(&switch)));
        })
    });
}

fn benchmark_encode(c: &mut Criterion) {
    let key = DeviceKey::energenie(Product::Miho013, 0x1234);
    let record = ParameterRecord::from_value(
        ParameterName::Temperature,
        false,
        FieldType::new(DataType::Dec8, 2).unwrap(),
        &RecordValue::Float(19.5),
    )
    .unwrap();

    c.bench_function("encode_openthings", |b| {
        b.iter(|| {
            let _ = black_box(openthings::encode_frame(key, black_box(std::slice::from_ref(&record))));
        })
    });
}

criterion_group!(benches, benchmark_decode, benchmark_encode);
criterion_main!(benches);
