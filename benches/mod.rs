use criterion::{criterion_group, criterion_main};

mod network;

criterion_group!(
    benches,
    network::application::mqtt::packet::bench_build_publish,
    network::application::mqtt::packet::bench_remaining_length,
    network::application::mqtt::inbound::bench_poll_block,
    network::application::mqtt::inbound::bench_poll_bytewise,
    network::application::mqtt::client::bench_send_publish
);
criterion_main!(benches);
