//! Payload benchmarks
//!
//! Both operations run on the beacon's event loop for every refresh or read,
//! so their cost bounds the radio callback latency.

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tracker_beacon_lib::advertisement::{AdvertisementPayload, encode_advertisement};
use tracker_beacon_lib::test_utils::{
    REFERENCE_IDENTITY, REFERENCE_NOW, REFERENCE_VALIDATION, reference_key,
};
use tracker_beacon_lib::validation::{
    VALIDATION_LEN, ValidationVerifier, sign_validation, write_validation,
};

/// Benchmark advertisement encoding and decoding
fn bench_advertisement(c: &mut Criterion) {
    let mut group = c.benchmark_group("Advertisement");

    group.bench_function("encode", |b| {
        b.iter(|| {
            encode_advertisement(
                black_box(0x01),
                black_box(0x01),
                black_box(0x00),
                black_box(&REFERENCE_IDENTITY),
            )
        });
    });

    let payload = encode_advertisement(0x01, 0x01, 0x00, &REFERENCE_IDENTITY);
    group.bench_function("parse", |b| {
        b.iter(|| AdvertisementPayload::parse(black_box(&payload)).unwrap());
    });

    group.finish();
}

/// Benchmark validation signing and verification
fn bench_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Validation");
    let key = reference_key();

    group.bench_function("sign", |b| {
        b.iter(|| sign_validation(black_box(&REFERENCE_IDENTITY), black_box(REFERENCE_NOW), &key).unwrap());
    });

    let mut buf = [0u8; VALIDATION_LEN];
    group.bench_function("write_into_buffer", |b| {
        b.iter(|| {
            write_validation(&REFERENCE_IDENTITY, black_box(REFERENCE_NOW), &key, black_box(&mut buf))
                .unwrap()
        });
    });

    let verifier = ValidationVerifier::new(reference_key()).with_freshness(30, 5);
    group.bench_function("verify", |b| {
        b.iter(|| verifier.verify(black_box(&REFERENCE_VALIDATION), REFERENCE_NOW).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_advertisement, bench_validation);
criterion_main!(benches);
