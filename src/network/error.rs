//! Common error types for modem and MQTT operations

use core::fmt;

/// A common error type for modem transactions and MQTT framing.
///
/// This enum is deliberately small and `Copy` so it can travel through
/// `no_std` code and be reported from interrupt-free contexts without
/// allocation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The serial link rejected a transmission.
    TransmitFailed,
    /// The expected response or bytes did not arrive in time.
    Timeout,
    /// An envelope or MQTT structure violated its encoding or bounds.
    MalformedFrame,
    /// The modem or broker answered with an explicit negative status.
    ///
    /// Carries the CONNACK return code.
    Rejected(u8),
    /// A packet would exceed the encodable remaining length or a configured
    /// topic, payload or client id bound.
    PayloadTooLarge,
    /// The injected configuration cannot be expressed on the wire.
    InvalidConfig,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TransmitFailed => f.write_str("transmit failed"),
            Error::Timeout => f.write_str("timeout"),
            Error::MalformedFrame => f.write_str("malformed frame"),
            Error::Rejected(code) => write!(f, "rejected (return code {})", code),
            Error::PayloadTooLarge => f.write_str("payload too large"),
            Error::InvalidConfig => f.write_str("invalid configuration"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::TransmitFailed => defmt::write!(f, "TransmitFailed"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::MalformedFrame => defmt::write!(f, "MalformedFrame"),
            Error::Rejected(code) => defmt::write!(f, "Rejected({})", code),
            Error::PayloadTooLarge => defmt::write!(f, "PayloadTooLarge"),
            Error::InvalidConfig => defmt::write!(f, "InvalidConfig"),
        }
    }
}
