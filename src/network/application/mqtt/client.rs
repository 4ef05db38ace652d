//! MQTT 3.1.1 client over an AT-command modem.
//!
//! The [`Client`] is the steady-state facade: it bootstraps the modem into an
//! MQTT session, then subscribes and publishes through the modem's raw send
//! cycle. Inbound messages do not come back through the client's own link;
//! they are collected by a [`SharedReassembler`] fed from the byte-arrival
//! interrupt and decoded by [`Client::poll`].
//!
//! # Ordering
//!
//! Outbound calls wait for the modem's `>` prompt and `SEND OK` on the
//! synchronous receive path. Once [`Client::listen`] has armed the interrupt
//! those bytes go to the interrupt handler instead, and [`Client::subscribe`]
//! or [`Client::publish`] fail with [`Error::Timeout`] after the prompt
//! budget. Subscribe and publish before listening.
//!
//! # Examples
//!
//! ```rust,no_run
//! use atmqtt::config::Config;
//! use atmqtt::network::application::mqtt::{Client, QoS, SharedReassembler};
//! use atmqtt::network::modem::Modem;
//! # use atmqtt::network::{Clock, SerialLink};
//! # struct Uart;
//! # impl SerialLink for Uart {
//! #     type Error = ();
//! #     fn transmit(&mut self, _bytes: &[u8]) -> Result<(), ()> { Ok(()) }
//! #     fn receive_byte(&mut self, _timeout_ms: u32) -> Result<u8, ()> { Err(()) }
//! # }
//! # struct SysTick;
//! # impl Clock for SysTick {
//! #     fn now_ms(&self) -> u32 { 0 }
//! # }
//! # fn log(_: &str) {}
//!
//! static RX: SharedReassembler = SharedReassembler::new();
//! const CONFIG: Config<'static> =
//!     Config::new("workshop", "hunter22", "192.168.1.104", 1883, "stm32/test123", "STM32");
//!
//! let modem = Modem::new(Uart, SysTick, log as fn(&str));
//! let mut client = match Client::connect(modem, &CONFIG) {
//!     Ok(client) => client,
//!     Err(fatal) => panic!("bootstrap failed: {}", fatal),
//! };
//!
//! client.subscribe(CONFIG.topic, QoS::AtMostOnce).unwrap();
//! client.publish(CONFIG.topic, b"HELL").unwrap();
//! client.listen().unwrap();
//!
//! loop {
//!     if let Ok(Some(_message)) = client.poll(&RX) {
//!         // handle message.topic / message.payload
//!     }
//! }
//! ```

use super::inbound::{InboundMessage, Poll};
use super::packet::{PublishFlags, QoS, build_publish, build_subscribe};
use super::shared::SharedReassembler;
use crate::config::Config;
use crate::network::error::Error;
use crate::network::modem::{Bootstrap, Fatal, Modem};
use crate::network::{Clock, SerialLink};
use crate::system::diagnostics::{DiagnosticsSink, Printable};

/// An MQTT 3.1.1 client driving an AT-command modem.
///
/// # Type Parameters
///
/// * `L` - the serial link to the modem
/// * `C` - the millisecond clock
/// * `D` - where the protocol trace goes
#[derive(Debug)]
pub struct Client<'a, L, C, D> {
    modem: Modem<L, C, D>,
    config: &'a Config<'a>,
    next_packet_id: u16,
    listening: bool,
}

impl<'a, L, C, D> Client<'a, L, C, D>
where
    L: SerialLink,
    C: Clock,
    D: DiagnosticsSink,
{
    /// Bootstrap the modem into an MQTT session with the broker.
    ///
    /// Runs every [`Bootstrap`] step: join the access point, open the TCP
    /// session, send CONNECT and check the CONNACK.
    ///
    /// # Errors
    ///
    /// The [`Fatal`] of the first step that failed. The modem is dropped.
    pub fn connect(mut modem: Modem<L, C, D>, config: &'a Config<'a>) -> Result<Self, Fatal> {
        let mut bootstrap = Bootstrap::new(config);
        bootstrap.run(&mut modem)?;
        modem.trace(format_args!("[mqtt] connected as {}", config.client_id));

        Ok(Self {
            modem,
            config,
            next_packet_id: 1,
            listening: false,
        })
    }

    /// Subscribe to a single topic filter.
    ///
    /// Returns the packet identifier used. Identifiers start at 1 and skip 0
    /// when they wrap. The SUBACK is not waited for and the client never
    /// reads it: it arrives after `SEND OK`, before any interrupt is armed,
    /// and is left on the link.
    ///
    /// # Errors
    ///
    /// * [`Error::PayloadTooLarge`] - topic longer than the topic bound
    /// * [`Error::Timeout`] - no `>` prompt or `SEND OK`
    /// * [`Error::TransmitFailed`] - the link refused the bytes
    pub fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<u16, Error> {
        let packet_id = self.next_packet_id;
        let packet = build_subscribe(packet_id, topic, qos)?;
        self.send(&packet)?;

        self.next_packet_id = match packet_id.wrapping_add(1) {
            0 => 1,
            id => id,
        };
        debug!("subscribed to {} with packet id {}", topic, packet_id);
        self.modem
            .trace(format_args!("[mqtt] subscribed: {}", topic));
        Ok(packet_id)
    }

    /// Publish `payload` on `topic` at QoS 0.
    ///
    /// # Errors
    ///
    /// * [`Error::PayloadTooLarge`] - topic or payload over its bound
    /// * [`Error::Timeout`] - no `>` prompt or `SEND OK`
    /// * [`Error::TransmitFailed`] - the link refused the bytes
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Error> {
        self.publish_with(topic, payload, PublishFlags::default())
    }

    /// Publish with explicit header flags.
    ///
    /// QoS 1 and 2 only set the header bits; no acknowledgement is tracked.
    pub fn publish_with(
        &mut self,
        topic: &str,
        payload: &[u8],
        flags: PublishFlags,
    ) -> Result<(), Error> {
        let packet = build_publish(topic, payload, flags)?;
        self.send(&packet)?;
        self.modem.trace(format_args!(
            "[mqtt] published: {} | {}",
            topic,
            Printable(payload)
        ));
        Ok(())
    }

    /// Arm the byte-arrival interrupt.
    ///
    /// From here on inbound bytes are expected in the [`SharedReassembler`]
    /// passed to [`Client::poll`], including the replies that
    /// [`Client::subscribe`] and [`Client::publish`] wait for. Those calls
    /// time out once the client is listening.
    pub fn listen(&mut self) -> Result<(), Error> {
        self.modem.listen()?;
        self.listening = true;
        self.modem.trace(format_args!("[mqtt] listening"));
        Ok(())
    }

    /// Decode at most one inbound message.
    ///
    /// * `Ok(Some(message))` - a PUBLISH arrived; it was also reported to the
    ///   diagnostics sink as `topic | message`
    /// * `Ok(None)` - nothing complete yet
    /// * `Err(Error::MalformedFrame)` - an envelope was thrown away; keep
    ///   polling, the buffer has already moved past it
    pub fn poll<const N: usize>(
        &mut self,
        rx: &SharedReassembler<N>,
    ) -> Result<Option<InboundMessage>, Error> {
        match rx.poll() {
            Poll::Message(message) => {
                self.modem.trace(format_args!(
                    "[mqtt] topic: {} | message: {}",
                    message.topic.as_str(),
                    Printable(&message.payload)
                ));
                Ok(Some(message))
            }
            Poll::Discarded(reason) => {
                warn!("inbound envelope discarded: {}", reason);
                self.modem
                    .trace(format_args!("[mqtt] discarded: {}", reason));
                Err(reason.into())
            }
            Poll::Idle | Poll::AwaitingHeader | Poll::AwaitingBody { .. } => Ok(None),
        }
    }

    /// Whether [`Client::listen`] has been called.
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// The configuration the session was opened with.
    pub fn config(&self) -> &'a Config<'a> {
        self.config
    }

    /// The packet identifier the next SUBSCRIBE will use.
    pub fn next_packet_id(&self) -> u16 {
        self.next_packet_id
    }

    /// The underlying modem.
    pub fn modem(&self) -> &Modem<L, C, D> {
        &self.modem
    }

    /// Mutable access to the underlying modem.
    pub fn modem_mut(&mut self) -> &mut Modem<L, C, D> {
        &mut self.modem
    }

    /// Give back the modem.
    pub fn into_modem(self) -> Modem<L, C, D> {
        self.modem
    }

    fn send(&mut self, packet: &[u8]) -> Result<(), Error> {
        let timeouts = self.config.timeouts;
        self.modem
            .send_data(packet, timeouts.prompt_ms, Some(timeouts.send_ok_ms))
    }
}
