//! Serial transport abstraction for AT-command modems
//!
//! The microcontroller owns nothing but a byte stream in each direction. The
//! traits in this module describe exactly that capability, plus the
//! millisecond tick every timeout is measured against. Platform crates
//! implement them on top of their UART driver and system timer.
//!

#![deny(unsafe_code)]

/// Common error types for modem and MQTT operations
pub mod error;

/// AT-command transaction engine, connection bootstrap and `+IPD` envelopes
pub mod modem;

/// Application protocols carried over the modem's TCP session
pub mod application;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Clock, SerialLink};
    pub use crate::system::diagnostics::DiagnosticsSink;
}

/// A byte-oriented serial link to the modem.
///
/// # Examples
///
/// ```rust
/// use atmqtt::network::SerialLink;
///
/// struct Loopback {
///     pending: heapless::Deque<u8, 64>,
/// }
///
/// impl SerialLink for Loopback {
///     type Error = ();
///
///     fn transmit(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
///         for &b in bytes {
///             self.pending.push_back(b).map_err(|_| ())?;
///         }
///         Ok(())
///     }
///
///     fn receive_byte(&mut self, _timeout_ms: u32) -> Result<u8, Self::Error> {
///         self.pending.pop_front().ok_or(())
///     }
/// }
/// ```
pub trait SerialLink {
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Transmit all of `bytes`, blocking until the peripheral accepted them.
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Receive a single byte, giving up after `timeout_ms`.
    ///
    /// Any error, including a timeout, is read by callers as "nothing
    /// arrived in this slice".
    fn receive_byte(&mut self, timeout_ms: u32) -> Result<u8, Self::Error>;

    /// Arm the asynchronous byte-arrival interrupt.
    ///
    /// From this point bytes are expected to be delivered to a
    /// [`SharedReassembler`](crate::network::application::mqtt::SharedReassembler)
    /// by the platform's interrupt handler instead of through
    /// [`receive_byte`](SerialLink::receive_byte).
    fn listen(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A monotonic millisecond tick.
///
/// The counter is allowed to wrap; every comparison in this crate uses
/// wrapping arithmetic.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch.
    fn now_ms(&self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

/// A wall-clock budget started at a known tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    start: u32,
    timeout_ms: u32,
}

impl Deadline {
    /// Start a budget of `timeout_ms` at the clock's current tick.
    pub fn start<C: Clock>(clock: &C, timeout_ms: u32) -> Self {
        Self {
            start: clock.now_ms(),
            timeout_ms,
        }
    }

    /// Milliseconds spent since the budget started.
    pub fn elapsed<C: Clock>(&self, clock: &C) -> u32 {
        clock.now_ms().wrapping_sub(self.start)
    }

    /// Whether the whole budget has been spent.
    pub fn expired<C: Clock>(&self, clock: &C) -> bool {
        self.elapsed(clock) >= self.timeout_ms
    }

    /// Milliseconds left, saturating at zero.
    pub fn remaining<C: Clock>(&self, clock: &C) -> u32 {
        self.timeout_ms.saturating_sub(self.elapsed(clock))
    }
}
