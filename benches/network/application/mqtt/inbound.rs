use atmqtt::network::application::mqtt::packet::build_publish;
use atmqtt::network::application::mqtt::{Poll, PublishFlags, Reassembler};
use criterion::{BatchSize, Criterion, Throughput};
use std::hint::black_box;

fn envelope(payload: &[u8]) -> std::vec::Vec<u8> {
    let packet =
        build_publish("stm32/test123", payload, PublishFlags::default()).expect("Failed to build");
    let mut bytes = format!("\r\n+IPD,{}:", packet.len()).into_bytes();
    bytes.extend_from_slice(&packet);
    bytes
}

pub fn bench_poll_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassembler_block");
    let frame = envelope(b"hello world from bench");
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("poll_complete_frame", |b| {
        b.iter_batched_ref(
            || {
                let mut rx: Reassembler = Reassembler::new();
                rx.extend(&frame);
                rx
            },
            |rx| match rx.poll() {
                Poll::Message(message) => black_box(message),
                other => panic!("unexpected {:?}", other),
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

pub fn bench_poll_bytewise(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassembler_bytewise");
    let frame = envelope(&[0xA5; 96]);
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("push_and_poll_each_byte", |b| {
        b.iter(|| {
            let mut rx: Reassembler = Reassembler::new();
            let mut decoded = 0;
            for &byte in &frame {
                rx.push(byte);
                if let Poll::Message(_) = rx.poll() {
                    decoded += 1;
                }
            }
            assert_eq!(decoded, 1);
            black_box(rx.len())
        })
    });
    group.finish();
}
