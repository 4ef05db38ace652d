//! Scripted modem, virtual clock and capturing diagnostics for the
//! integration tests.
#![allow(dead_code)]

use atmqtt::config::Config;
use atmqtt::network::modem::Modem;
use atmqtt::network::{Clock, SerialLink};
use atmqtt::system::diagnostics::DiagnosticsSink;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

pub const SSID: &str = "workshop";
pub const PASSPHRASE: &str = "hunter22";
pub const HOST: &str = "192.168.1.104";
pub const PORT: u16 = 1883;
pub const TOPIC: &str = "stm32/test123";
pub const CLIENT_ID: &str = "STM32";

pub const CONFIG: Config<'static> = Config::new(SSID, PASSPHRASE, HOST, PORT, TOPIC, CLIENT_ID);

/// CONNECT for `CLIENT_ID`, keep-alive 100, clean session.
pub const CONNECT_HEAD: &[u8] = &[0x10, 0x11];

/// A millisecond tick shared between the link and the modem.
#[derive(Debug, Clone, Default)]
pub struct MockClock(Rc<Cell<u32>>);

impl MockClock {
    pub fn starting_at(ms: u32) -> Self {
        Self(Rc::new(Cell::new(ms)))
    }

    pub fn advance(&self, ms: u32) {
        self.0.set(self.0.get().wrapping_add(ms));
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u32 {
        self.0.get()
    }
}

#[derive(Debug)]
struct Rule {
    trigger: Vec<u8>,
    reply: Vec<u8>,
}

/// A modem that answers transmissions from an ordered script.
///
/// Rules fire one after another: once everything transmitted since the last
/// fired rule contains the next rule's trigger, its reply is queued for
/// reception. Every received byte costs one millisecond; an empty receive
/// costs the full timeout. After `listen` nothing is delivered through
/// `receive_byte` any more, as the bytes belong to the interrupt handler.
#[derive(Debug)]
pub struct MockLink {
    clock: MockClock,
    rules: VecDeque<Rule>,
    pending: Vec<u8>,
    rx: VecDeque<u8>,
    pub sent: Vec<u8>,
    pub fail_transmit: bool,
    pub receive_calls: usize,
    pub listen_calls: usize,
}

impl MockLink {
    pub fn new(clock: MockClock) -> Self {
        Self {
            clock,
            rules: VecDeque::new(),
            pending: Vec::new(),
            rx: VecDeque::new(),
            sent: Vec::new(),
            fail_transmit: false,
            receive_calls: 0,
            listen_calls: 0,
        }
    }

    /// Reply with `reply` once `trigger` has been transmitted.
    pub fn on(&mut self, trigger: impl AsRef<[u8]>, reply: impl AsRef<[u8]>) -> &mut Self {
        self.rules.push_back(Rule {
            trigger: trigger.as_ref().to_vec(),
            reply: reply.as_ref().to_vec(),
        });
        self
    }

    /// Make `bytes` available for reception right away.
    pub fn queue(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.rx.extend(bytes.as_ref());
        self
    }

    pub fn sent_text(&self) -> String {
        String::from_utf8_lossy(&self.sent).into_owned()
    }

    pub fn rules_left(&self) -> usize {
        self.rules.len()
    }

    pub fn unread(&self) -> usize {
        self.rx.len()
    }
}

impl SerialLink for MockLink {
    type Error = &'static str;

    fn transmit(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.fail_transmit {
            return Err("uart busy");
        }
        self.sent.extend_from_slice(bytes);
        self.pending.extend_from_slice(bytes);

        let fired = self.rules.front().is_some_and(|rule| {
            self.pending
                .windows(rule.trigger.len())
                .any(|window| window == rule.trigger.as_slice())
        });
        if fired {
            if let Some(rule) = self.rules.pop_front() {
                self.rx.extend(rule.reply);
            }
            self.pending.clear();
        }
        Ok(())
    }

    fn receive_byte(&mut self, timeout_ms: u32) -> Result<u8, Self::Error> {
        self.receive_calls += 1;
        let next = if self.listen_calls > 0 {
            None
        } else {
            self.rx.pop_front()
        };
        match next {
            Some(byte) => {
                self.clock.advance(1);
                Ok(byte)
            }
            None => {
                self.clock.advance(timeout_ms);
                Err("timeout")
            }
        }
    }

    fn listen(&mut self) -> Result<(), Self::Error> {
        self.listen_calls += 1;
        Ok(())
    }
}

/// Collects every diagnostics line.
#[derive(Debug, Clone, Default)]
pub struct CaptureSink(Rc<RefCell<Vec<String>>>);

impl CaptureSink {
    pub fn lines(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn has(&self, prefix: &str) -> bool {
        self.0.borrow().iter().any(|line| line.starts_with(prefix))
    }

    pub fn find(&self, prefix: &str) -> Option<String> {
        self.0
            .borrow()
            .iter()
            .find(|line| line.starts_with(prefix))
            .cloned()
    }
}

impl DiagnosticsSink for CaptureSink {
    fn write_line(&mut self, text: &str) {
        self.0.borrow_mut().push(text.to_string());
    }
}

pub type TestModem = Modem<MockLink, MockClock, CaptureSink>;

/// A modem over a fresh script, plus handles on its clock and trace.
pub fn modem() -> (TestModem, MockClock, CaptureSink) {
    let clock = MockClock::starting_at(1_000);
    let sink = CaptureSink::default();
    let link = MockLink::new(clock.clone());
    (Modem::new(link, clock.clone(), sink.clone()), clock, sink)
}

/// The AT replies up to and including the open TCP session.
pub fn script_network(link: &mut MockLink) {
    link.on("AT", "AT\r\r\n\r\nOK\r\n")
        .on("AT+CWMODE=1", "AT+CWMODE=1\r\r\n\r\nOK\r\n")
        .on(
            "AT+CWJAP=",
            "WIFI DISCONNECT\r\nWIFI CONNECTED\r\nWIFI GOT IP\r\n",
        )
        .on("AT+CIPMUX=0", "\r\nOK\r\n")
        .on("AT+CIPSTART=", "CONNECT\r\n\r\nOK\r\n");
}

/// The CIPSEND cycle for an outbound packet whose first bytes are `head`.
pub fn script_send(link: &mut MockLink, len: usize, head: &[u8], extra: &[u8]) {
    let mut reply = b"\r\nRecv ".to_vec();
    reply.extend_from_slice(len.to_string().as_bytes());
    reply.extend_from_slice(b" bytes\r\n\r\nSEND OK\r\n");
    reply.extend_from_slice(extra);
    link.on(format!("AT+CIPSEND={}", len), "\r\nOK\r\n> ")
        .on(head, reply);
}

/// Every reply a clean bootstrap needs, with `connack` as the broker's answer.
pub fn script_bootstrap(link: &mut MockLink, connack: &[u8]) {
    script_network(link);
    let mut envelope = b"\r\n+IPD,4:".to_vec();
    envelope.extend_from_slice(connack);
    script_send(link, 19, CONNECT_HEAD, &envelope);
}

pub const CONNACK_ACCEPTED: &[u8] = &[0x20, 0x02, 0x00, 0x00];
