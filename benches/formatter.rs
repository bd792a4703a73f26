//! Benchmarks for the per-advertisement hot path: decoding, name extraction
//! and JSON rendering, without any async runtime involved.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tpms_mqtt_bridge::{
    Advertisement, JsonFormatter, MacAddress, OutputFormatter, decode_tpms_payload, extract_name,
};

const TEST_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// Flags record followed by a sensor frame (marker, padding, 3.0 V, 21 °C, raw 300)
fn sensor_advertisement() -> Vec<u8> {
    vec![
        0x02, 0x01, 0x06, // Flags
        0x03, 0x08, b'B', b'R', // Shortened name "BR" (marker)
        0x00, 0x00, 0x00, // Padding
        0x1E, // Battery: 3.0 V
        0x15, // Temperature: 21 °C
        0x01, 0x2C, // Raw pressure: 300
    ]
}

/// Typical non-sensor advertisement: flags, complete name, manufacturer data
fn foreign_advertisement() -> Vec<u8> {
    vec![
        0x02, 0x01, 0x06, 0x0A, 0x09, b'H', b'e', b'a', b'd', b'p', b'h', b'o', b'n', b'e', 0x07,
        0xFF, 0x4C, 0x00, 0x10, 0x02, 0x0B, 0x00,
    ]
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(1));

    let sensor = sensor_advertisement();
    group.bench_function("sensor", |b| {
        b.iter(|| black_box(decode_tpms_payload(black_box(&sensor))))
    });

    let foreign = foreign_advertisement();
    group.bench_function("foreign", |b| {
        b.iter(|| black_box(decode_tpms_payload(black_box(&foreign))))
    });

    // Marker at the very end of a long buffer: worst case for the scan
    for len in [31usize, 255] {
        let mut data = vec![0u8; len - 11];
        data.extend_from_slice(&sensor_advertisement()[3..]);
        group.bench_with_input(BenchmarkId::new("marker_at_end", len), &data, |b, data| {
            b.iter(|| black_box(decode_tpms_payload(black_box(data))))
        });
    }

    group.finish();
}

fn bench_extract_name(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_name");
    group.throughput(Throughput::Elements(1));

    let sensor = sensor_advertisement();
    group.bench_function("short_name", |b| {
        b.iter(|| black_box(extract_name(black_box(&sensor))))
    });

    let foreign = foreign_advertisement();
    group.bench_function("complete_name", |b| {
        b.iter(|| black_box(extract_name(black_box(&foreign))))
    });

    group.finish();
}

fn bench_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_json");
    group.throughput(Throughput::Elements(1));

    let formatter = JsonFormatter::default();
    let advertisement = Advertisement::new(TEST_MAC, sensor_advertisement());
    let reading = decode_tpms_payload(&advertisement.data).unwrap();
    let name = advertisement.name();

    group.bench_function("sensor", |b| {
        b.iter(|| {
            let message = formatter.format(
                black_box(&advertisement),
                black_box(&name),
                black_box(&reading),
            );
            black_box(message)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_extract_name, bench_format);
criterion_main!(benches);
