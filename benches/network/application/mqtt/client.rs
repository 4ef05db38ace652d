use atmqtt::network::application::mqtt::packet::build_publish;
use atmqtt::network::application::mqtt::PublishFlags;
use atmqtt::network::modem::Modem;
use atmqtt::network::{Clock, SerialLink};
use atmqtt::system::diagnostics::NullSink;
use criterion::{Criterion, Throughput};
use std::cell::Cell;
use std::collections::VecDeque;

/// A modem that prompts for every CIPSEND and acknowledges every data write.
struct AckLink {
    rx: VecDeque<u8>,
}

impl SerialLink for AckLink {
    type Error = ();

    fn transmit(&mut self, bytes: &[u8]) -> Result<(), ()> {
        if bytes.starts_with(b"AT+CIPSEND=") {
            self.rx.extend(b"\r\nOK\r\n>");
        } else if bytes != b"\r\n" {
            self.rx.extend(b"\r\nSEND OK");
        }
        Ok(())
    }

    fn receive_byte(&mut self, _timeout_ms: u32) -> Result<u8, ()> {
        self.rx.pop_front().ok_or(())
    }
}

struct Ticks(Cell<u32>);

impl Clock for Ticks {
    fn now_ms(&self) -> u32 {
        let now = self.0.get();
        self.0.set(now.wrapping_add(1));
        now
    }
}

pub fn bench_send_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("send_publish");
    let payload = b"hello world from bench";
    group.throughput(Throughput::Bytes(payload.len() as u64));

    let link = AckLink {
        rx: VecDeque::new(),
    };
    let mut modem = Modem::new(link, Ticks(Cell::new(0)), NullSink);

    group.bench_function("cipsend_cycle", |b| {
        b.iter(|| {
            let packet = build_publish("stm32/test123", payload, PublishFlags::default())
                .expect("Failed to build");
            modem
                .send_data(&packet, 5_000, Some(5_000))
                .expect("Failed to send");
        })
    });
    group.finish();
}
