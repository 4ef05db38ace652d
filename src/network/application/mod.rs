//! # Application Layer Protocols
//!
//! Protocols carried over the modem's TCP session.
//!
//! ## Available Protocols
//!
//! - **[`mqtt`]**: MQTT 3.1.1 client for lightweight publish-subscribe messaging
//!
//! ## Design Principles
//!
//! - **Modem Agnostic**: works with any link implementing
//!   [`SerialLink`](crate::network::SerialLink) that speaks the ESP8266 AT dialect
//! - **No-std Compatible**: no heap allocation, fixed-size buffers throughout
//! - **Bounded**: every topic, payload and buffer has a named limit in
//!   [`config`](crate::config)

/// MQTT client implementation.
///
/// Provides an MQTT 3.1.1 client for lightweight publish-subscribe messaging,
/// commonly used in IoT applications.
pub mod mqtt;
