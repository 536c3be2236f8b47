//! Benchmarks for the radio codec and the telemetry update path
//!
//! Covers the work done per received buffer:
//! - unpacking a multi-record radio buffer, with and without reserved bytes
//! - decoding sensor records
//! - applying ACM and rig records to the telemetry state
//!
//! Platform: Cross-platform (synthetic records, CI-safe)

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use groundlink::framing::{SensorRecord, unpack};
use groundlink::telemetry::{Calibration, NullObserver, TelemetryState};
use groundlink::test_utils::{acm_at, acm_record, cmp_record, radio_buffer, rig_record};
use std::hint::black_box;

/// A buffer like the boards send at 100 Hz: one record per subsystem.
fn typical_buffer() -> Vec<u8> {
    radio_buffer(
        &[
            (1_000, acm_record(1_000, [4090, 236, 0])),
            (1_010, cmp_record(1_010)),
            (1_020, rig_record(1200, 300, 4000, 1_020)),
        ],
        1_030,
    )
}

/// Every payload byte is a delimiter or escape, so every byte gets stuffed.
fn worst_case_buffer() -> Vec<u8> {
    let payload: Vec<u8> = [0x9E, 0x9B].iter().copied().cycle().take(63).collect();
    radio_buffer(&[(0x9E9B_9E9B, payload.clone()), (0x9B9E_9B9E, payload)], 0x9E9E_9E9E)
}

fn bench_unpack(c: &mut Criterion) {
    let typical = typical_buffer();
    let worst = worst_case_buffer();

    let mut group = c.benchmark_group("unpack");
    group.throughput(Throughput::Bytes(typical.len() as u64));
    group.bench_function("typical_buffer", |b| b.iter(|| black_box(unpack(black_box(&typical)))));

    group.throughput(Throughput::Bytes(worst.len() as u64));
    group.bench_function("fully_escaped_buffer", |b| b.iter(|| black_box(unpack(black_box(&worst)))));
    group.finish();
}

fn bench_decode_records(c: &mut Criterion) {
    let acm = acm_record(1_000, [4090, 236, 0]);
    let rig = rig_record(1200, 300, 4000, 1_020);

    c.bench_function("decode_acm_record", |b| b.iter(|| black_box(SensorRecord::decode(black_box(&acm)))));
    c.bench_function("decode_rig_record", |b| b.iter(|| black_box(SensorRecord::decode(black_box(&rig)))));
}

fn bench_state_updates(c: &mut Criterion) {
    let mut state = TelemetryState::new(Calibration::default(), 50_000, Box::new(NullObserver));
    let mut ts = 0u32;

    c.bench_function("update_flight_surfaces", |b| {
        b.iter(|| {
            ts = ts.wrapping_add(10_000) & 0x7FFF_FFFF;
            state.update_flight_surfaces(black_box(&acm_at(ts, [4090, 236, 0])));
            black_box(state.snapshot().acm_attitude[0].rate)
        })
    });

    c.bench_function("gui_state_vector", |b| b.iter(|| black_box(state.snapshot().gui_states())));
}

criterion_group!(benches, bench_unpack, bench_decode_records, bench_state_updates);
criterion_main!(benches);
