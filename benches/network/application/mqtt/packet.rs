use atmqtt::config::MAX_PAYLOAD_LEN;
use atmqtt::network::application::mqtt::packet::{
    build_publish, decode_remaining_length, encode_remaining_length,
};
use atmqtt::network::application::mqtt::PublishFlags;
use criterion::{Criterion, Throughput};
use heapless::Vec;
use std::hint::black_box;

pub fn bench_build_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_publish");
    let payload = [0x5Au8; MAX_PAYLOAD_LEN];
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("max_payload", |b| {
        b.iter(|| {
            build_publish(
                black_box("stm32/test123"),
                black_box(&payload),
                PublishFlags::default(),
            )
            .expect("Failed to build")
        })
    });
    group.finish();
}

pub fn bench_remaining_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("remaining_length");
    for value in [127usize, 16_383, 268_435_455] {
        group.bench_function(format!("encode_decode_{}", value), |b| {
            b.iter(|| {
                let mut buf: Vec<u8, 4> = Vec::new();
                encode_remaining_length(&mut buf, black_box(value)).expect("Failed to encode");
                decode_remaining_length(&buf).expect("Failed to decode")
            })
        });
    }
    group.finish();
}
