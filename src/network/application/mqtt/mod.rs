//! MQTT 3.1.1 over an AT-command modem.
//!
//! MQTT (Message Queuing Telemetry Transport) is a lightweight
//! publish-subscribe protocol. Here the TCP session belongs to the modem:
//! outbound packets are pushed through `AT+CIPSEND`, inbound packets arrive
//! wrapped in `+IPD,<n>:` envelopes on the same serial line.
//!
//! # Layout
//!
//! - [`packet`]: CONNECT, SUBSCRIBE and PUBLISH builders, the remaining-length
//!   codec and the CONNACK parser
//! - [`inbound`]: the [`Reassembler`] that finds envelopes in the received
//!   bytes and decodes the PUBLISH inside
//! - [`shared`]: [`SharedReassembler`], the interrupt-safe wrapper the
//!   byte-arrival handler writes into
//! - [`client`]: the [`Client`] facade
//!
//! Only QoS 0 has delivery semantics. There is no reconnection and a single
//! topic is expected per session.

/// MQTT client over the modem.
pub mod client;

/// Inbound envelope reassembly and PUBLISH decoding.
pub mod inbound;

/// Control packet encoding.
pub mod packet;

/// Critical-section guarded reassembler.
pub mod shared;

pub use client::Client;
pub use inbound::{DiscardReason, InboundMessage, Poll, Reassembler};
pub use packet::{Connack, PublishFlags, QoS};
pub use shared::SharedReassembler;
