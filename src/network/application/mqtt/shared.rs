//! Interrupt-safe home of the inbound reassembler.
//!
//! The byte-arrival interrupt and the main loop both touch the same buffer.
//! Every access goes through [`critical_section::with`], so a compaction in
//! the main loop can never interleave with an append from the interrupt.
//!
//! ```rust
//! use atmqtt::network::application::mqtt::{Poll, SharedReassembler};
//!
//! static RX: SharedReassembler = SharedReassembler::new();
//!
//! // In the UART receive interrupt handler:
//! for &byte in b"+IPD,6:\x30\x04\x00\x01aZ" {
//!     RX.on_byte_arrived(byte);
//! }
//!
//! // In the main loop:
//! assert!(matches!(RX.poll(), Poll::Message(_)));
//! ```

use super::inbound::{Poll, Reassembler};
use crate::config::RX_BUFFER_SIZE;
use core::cell::RefCell;
use core::fmt;
use critical_section::Mutex;

/// A [`Reassembler`] shared between an interrupt handler and the main loop.
///
/// Meant to live in a `static`.
pub struct SharedReassembler<const N: usize = RX_BUFFER_SIZE> {
    inner: Mutex<RefCell<Reassembler<N>>>,
}

impl<const N: usize> fmt::Debug for SharedReassembler<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedReassembler")
            .field("capacity", &N)
            .finish_non_exhaustive()
    }
}

impl<const N: usize> Default for SharedReassembler<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SharedReassembler<N> {
    /// An empty buffer.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Reassembler::new())),
        }
    }

    /// Append one received byte. Call this from the byte-arrival interrupt.
    pub fn on_byte_arrived(&self, byte: u8) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).push(byte));
    }

    /// Look for one complete envelope and decode it.
    ///
    /// See [`Reassembler::poll`].
    pub fn poll(&self) -> Poll {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).poll())
    }

    /// Run `f` with exclusive access to the reassembler.
    pub fn with<R>(&self, f: impl FnOnce(&mut Reassembler<N>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// How many times the write cursor wrapped.
    pub fn overflows(&self) -> u32 {
        self.with(|rx| rx.overflows())
    }

    /// Drop everything buffered.
    pub fn clear(&self) {
        self.with(|rx| rx.clear())
    }
}
