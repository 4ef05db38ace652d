//! # atmqtt - MQTT over AT-command Wi-Fi modems
//!
//! An MQTT 3.1.1 client for microcontrollers whose only path to the network
//! is a serial line to an ESP8266-style modem. The crate drives the modem
//! with AT commands, opens a TCP session to the broker, and speaks MQTT
//! through the modem's raw send cycle. Inbound PUBLISH packets are rebuilt
//! from the `+IPD,<n>:` envelopes the modem prints, one interrupt-delivered
//! byte at a time.
//!
//! Everything is `no_std` and heap-free: every buffer is fixed-size and every
//! wait is bounded by a millisecond deadline.
//!
//! ## Layout
//!
//! - [`network`]: the [`SerialLink`](network::SerialLink) and
//!   [`Clock`](network::Clock) capabilities, the [`modem`](network::modem)
//!   transaction engine and bootstrap, and the [`mqtt`](network::application::mqtt)
//!   codec, reassembler and client
//! - [`config`]: the injected [`Config`](config::Config) and the size bounds
//! - [`system`]: the [`diagnostics`](system::diagnostics) trace channel
//!
//! ## Usage
//!
//! The platform supplies three things: a [`SerialLink`](network::SerialLink)
//! over the modem UART, a [`Clock`](network::Clock) over its tick counter,
//! and a [`DiagnosticsSink`](system::diagnostics::DiagnosticsSink), for
//! example a `fn(&str)` writing to a debug UART. Its receive interrupt
//! forwards each byte to a `static`
//! [`SharedReassembler`](network::application::mqtt::SharedReassembler).
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
//! # fn debug_uart(_: &str) {}
//!
//! static RX: SharedReassembler = SharedReassembler::new();
//!
//! // USART1 receive interrupt: RX.on_byte_arrived(byte);
//!
//! let config = Config::new("workshop", "hunter22", "192.168.1.104", 1883, "stm32/test123", "STM32");
//! let modem = Modem::new(Uart, SysTick, debug_uart as fn(&str));
//!
//! let mut client = Client::connect(modem, &config).unwrap_or_else(|fatal| panic!("{}", fatal));
//! client.subscribe(config.topic, QoS::AtMostOnce).unwrap();
//! client.publish(config.topic, b"HELL").unwrap();
//! client.listen().unwrap();
//!
//! loop {
//!     let _ = client.poll(&RX);
//! }
//! ```
//!
//! ## Optional Features
//!
//! - `std`: link the standard library (default: disabled)
//! - `defmt`: developer logging through `defmt` and `defmt::Format` impls on
//!   the public error and state types

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod fmt;

/// Injected configuration, timeouts and size bounds.
pub mod config;

/// Serial link abstraction, modem driver and application protocols.
///
/// Contains the AT-command transaction engine, the connection bootstrap and
/// the MQTT codec, reassembler and client.
pub mod network;

/// System utilities for embedded devices.
///
/// Contains the diagnostics trace channel used by every layer.
pub mod system;
