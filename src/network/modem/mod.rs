//! AT-command modem driver
//!
//! This module turns a raw [`SerialLink`](crate::network::SerialLink) into a
//! Wi-Fi/TCP modem that can be scripted with AT commands:
//!
//! - **[`transaction`]**: the [`Modem`] transaction engine. One command, one
//!   bounded response buffer, one outcome.
//! - **[`bootstrap`]**: the fail-fast [`Bootstrap`] state machine that brings
//!   the modem from power-on to an open MQTT session.
//! - **[`envelope`]**: the `+IPD,<n>:` header the modem wraps around every
//!   chunk of TCP data it forwards.
//!
//! ```rust
//! use atmqtt::network::modem::{Modem, Outcome};
//! use atmqtt::network::{Clock, SerialLink};
//! use atmqtt::system::diagnostics::NullSink;
//! use core::cell::Cell;
//!
//! struct Echo { reply: &'static [u8], at: usize }
//!
//! impl SerialLink for Echo {
//!     type Error = ();
//!     fn transmit(&mut self, _bytes: &[u8]) -> Result<(), ()> { Ok(()) }
//!     fn receive_byte(&mut self, _timeout_ms: u32) -> Result<u8, ()> {
//!         let byte = *self.reply.get(self.at).ok_or(())?;
//!         self.at += 1;
//!         Ok(byte)
//!     }
//! }
//!
//! struct Ticks(Cell<u32>);
//! impl Clock for Ticks {
//!     fn now_ms(&self) -> u32 {
//!         self.0.set(self.0.get() + 1);
//!         self.0.get()
//!     }
//! }
//!
//! let link = Echo { reply: b"AT\r\n\r\nOK\r\n", at: 0 };
//! let mut modem = Modem::new(link, Ticks(Cell::new(0)), NullSink);
//! let exchange = modem.execute("AT", Some("OK"), 1000);
//! assert_eq!(exchange.outcome, Outcome::Ok);
//! assert!(exchange.response.contains("OK"));
//! ```

/// Connection bootstrap from power-on to MQTT session
pub mod bootstrap;

/// `+IPD,<n>:` data envelope scanning
pub mod envelope;

/// Command/response transaction engine
pub mod transaction;

pub use bootstrap::{Bootstrap, Fatal, State};
pub use envelope::{EnvelopeHeader, Scan};
pub use transaction::{CommandTransaction, Exchange, Modem, Outcome, RawResponse};

/// Position of the first occurrence of `needle` in `haystack`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::find;

    #[test]
    fn test_find() {
        assert_eq!(find(b"AT\r\nOK\r\n", b"OK"), Some(4));
        assert_eq!(find(b"AT", b"OK"), None);
        assert_eq!(find(b"O", b"OK"), None);
        assert_eq!(find(b"abc", b""), Some(0));
    }
}
