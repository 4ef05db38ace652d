//! Command/response transactions over the serial link.
//!
//! Every interaction with the modem has the same shape: optionally send a
//! line, then read bytes one at a time into a bounded buffer until an
//! expected substring shows up or the time budget is spent. [`Modem`] owns
//! that loop and reports everything it sent and saw to its
//! [`DiagnosticsSink`].

use super::find;
use crate::config::{RESPONSE_BUFFER_SIZE, Timeouts};
use crate::network::error::Error;
use crate::network::{Clock, Deadline, SerialLink};
use crate::system::diagnostics::{DiagnosticsSink, Printable, emit};
use core::fmt;
use heapless::{String, Vec};

/// Upper bound on bytes thrown away by a single [`Modem::drain`].
const MAX_DRAIN_BYTES: usize = 4 * RESPONSE_BUFFER_SIZE;

/// One AT command and what to wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTransaction<'a> {
    /// Command text without the trailing CRLF.
    pub command: &'a str,
    /// Substring that ends the wait successfully. `None` drains the window.
    pub expect: Option<&'a str>,
    /// Total budget for the response, measured from the start of the call.
    pub timeout_ms: u32,
}

impl<'a> CommandTransaction<'a> {
    /// A command that waits for `expect`.
    pub const fn new(command: &'a str, expect: &'a str, timeout_ms: u32) -> Self {
        Self {
            command,
            expect: Some(expect),
            timeout_ms,
        }
    }

    /// A command whose response is collected for `timeout_ms` and not judged.
    pub const fn drain(command: &'a str, timeout_ms: u32) -> Self {
        Self {
            command,
            expect: None,
            timeout_ms,
        }
    }
}

/// How a transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// The expectation was seen, or no expectation was given.
    Ok,
    /// The link refused the command bytes.
    TransmitFailed,
    /// The budget ran out, or the buffer filled, before the expectation was seen.
    Timeout,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Ok => "ok",
            Outcome::TransmitFailed => "transmit failed",
            Outcome::Timeout => "timeout",
        })
    }
}

/// Bytes collected during one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    bytes: Vec<u8, RESPONSE_BUFFER_SIZE>,
}

impl RawResponse {
    /// An empty response.
    pub const fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// The collected bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of collected bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the buffer reached [`RESPONSE_BUFFER_SIZE`].
    pub fn is_full(&self) -> bool {
        self.bytes.is_full()
    }

    /// Whether `pattern` occurs anywhere in the collected bytes.
    pub fn contains(&self, pattern: &str) -> bool {
        self.find(pattern.as_bytes()).is_some()
    }

    /// Offset of the first occurrence of `pattern`.
    pub fn find(&self, pattern: &[u8]) -> Option<usize> {
        find(&self.bytes, pattern)
    }

    fn push(&mut self, byte: u8) {
        // Bytes beyond capacity are dropped; the caller ends the loop on full.
        let _ = self.bytes.push(byte);
    }
}

/// A finished transaction: the outcome plus everything that was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// How the transaction ended.
    pub outcome: Outcome,
    /// Bytes received while waiting.
    pub response: RawResponse,
}

impl Exchange {
    /// Whether the outcome is [`Outcome::Ok`].
    pub fn is_ok(&self) -> bool {
        self.outcome == Outcome::Ok
    }

    /// The response on success, the matching [`Error`] otherwise.
    pub fn into_result(self) -> Result<RawResponse, Error> {
        match self.outcome {
            Outcome::Ok => Ok(self.response),
            Outcome::TransmitFailed => Err(Error::TransmitFailed),
            Outcome::Timeout => Err(Error::Timeout),
        }
    }
}

/// The AT-command transaction engine.
///
/// Owns the serial link, the clock and the diagnostics sink for as long as
/// the modem is driven synchronously. Every wait is a busy loop of short
/// single-byte receives checked against a [`Deadline`].
///
/// # Type Parameters
///
/// * `L` - the serial link to the modem
/// * `C` - the millisecond clock
/// * `D` - where the protocol trace goes
#[derive(Debug)]
pub struct Modem<L, C, D> {
    link: L,
    clock: C,
    sink: D,
    byte_timeout_ms: u32,
}

impl<L, C, D> Modem<L, C, D>
where
    L: SerialLink,
    C: Clock,
    D: DiagnosticsSink,
{
    /// Wrap a link with the default per-byte receive slice.
    pub fn new(link: L, clock: C, sink: D) -> Self {
        Self {
            link,
            clock,
            sink,
            byte_timeout_ms: Timeouts::new().byte_ms,
        }
    }

    /// Set the per-byte receive slice. Zero is raised to one millisecond.
    pub fn set_byte_timeout(&mut self, byte_timeout_ms: u32) {
        self.byte_timeout_ms = byte_timeout_ms.max(1);
    }

    /// Send `command` and wait for `expect`.
    ///
    /// See [`Modem::perform`].
    pub fn execute(&mut self, command: &str, expect: Option<&str>, timeout_ms: u32) -> Exchange {
        self.perform(&CommandTransaction {
            command,
            expect,
            timeout_ms,
        })
    }

    /// Run one command transaction.
    ///
    /// The command is sent followed by CRLF. Bytes are then collected until:
    ///
    /// * the expectation appears in the collected bytes - [`Outcome::Ok`]
    /// * `timeout_ms` has elapsed since the call began - [`Outcome::Timeout`]
    /// * the response buffer is full - [`Outcome::Timeout`]
    ///
    /// Without an expectation whatever arrives during the window is collected
    /// and the outcome is [`Outcome::Ok`]. A budget of zero still makes one
    /// receive attempt. The command, the raw response and the outcome are
    /// written to the diagnostics sink as one line, whatever the outcome.
    pub fn perform(&mut self, transaction: &CommandTransaction<'_>) -> Exchange {
        let sent = self
            .link
            .transmit(transaction.command.as_bytes())
            .and_then(|_| self.link.transmit(b"\r\n"));
        let exchange = match sent {
            Ok(()) => self.collect(transaction.expect, transaction.timeout_ms),
            Err(e) => {
                warn!("modem transmit failed");
                emit(&mut self.sink, format_args!("[modem] transmit failed: {:?}", e));
                Exchange {
                    outcome: Outcome::TransmitFailed,
                    response: RawResponse::new(),
                }
            }
        };
        self.report("cmd", transaction.command, &exchange);
        exchange
    }

    /// Shorthand for [`Modem::execute`] followed by [`Exchange::into_result`].
    pub fn send_at(
        &mut self,
        command: &str,
        expect: &str,
        timeout_ms: u32,
    ) -> Result<RawResponse, Error> {
        self.execute(command, Some(expect), timeout_ms)
            .into_result()
    }

    /// Wait for `pattern` without sending anything first.
    pub fn wait_for(&mut self, pattern: &str, timeout_ms: u32) -> Exchange {
        let exchange = self.collect(Some(pattern), timeout_ms);
        self.report("wait", pattern, &exchange);
        exchange
    }

    /// Transmit raw bytes.
    pub fn transmit(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.link.transmit(bytes).map_err(|e| {
            emit(&mut self.sink, format_args!("[modem] transmit failed: {:?}", e));
            Error::TransmitFailed
        })
    }

    /// Fill `buf` with the next bytes from the link.
    ///
    /// Returns how many bytes arrived before `timeout_ms` elapsed; fewer than
    /// `buf.len()` means the budget ran out.
    pub fn read_exact(&mut self, buf: &mut [u8], timeout_ms: u32) -> usize {
        let deadline = Deadline::start(&self.clock, timeout_ms);
        let mut filled = 0;
        while filled < buf.len() {
            let slice = self.slice(&deadline);
            if let Ok(byte) = self.link.receive_byte(slice) {
                buf[filled] = byte;
                filled += 1;
            } else if deadline.expired(&self.clock) {
                break;
            }
        }
        filled
    }

    /// Throw away stale bytes until the link stays quiet for `quiet_ms`.
    ///
    /// Returns the number of bytes discarded.
    pub fn drain(&mut self, quiet_ms: u32) -> usize {
        let mut discarded = 0;
        while discarded < MAX_DRAIN_BYTES && self.link.receive_byte(quiet_ms).is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("drained {} stale bytes", discarded);
            emit(
                &mut self.sink,
                format_args!("[modem] drained {} stale bytes", discarded),
            );
        }
        discarded
    }

    /// Factory-reset the modem and wait for it to report `ready`.
    pub fn restore(&mut self, timeout_ms: u32) -> Result<(), Error> {
        self.send_at("AT+RESTORE", "ready", timeout_ms).map(|_| ())
    }

    /// Push `data` through the modem's open TCP session.
    ///
    /// Sends `AT+CIPSEND=<len>`, waits up to `prompt_ms` for the `>` prompt,
    /// then transmits `data` unchanged. With `send_ok_ms` set, also waits for
    /// the modem's `SEND OK`.
    pub fn send_data(
        &mut self,
        data: &[u8],
        prompt_ms: u32,
        send_ok_ms: Option<u32>,
    ) -> Result<(), Error> {
        let mut command: String<24> = String::new();
        fmt::write(&mut command, format_args!("AT+CIPSEND={}", data.len()))
            .map_err(|_| Error::PayloadTooLarge)?;

        self.send_at(&command, ">", prompt_ms)?;
        self.transmit(data)?;
        emit(
            &mut self.sink,
            format_args!("[modem] sent {} data bytes", data.len()),
        );

        if let Some(timeout_ms) = send_ok_ms {
            self.wait_for("SEND OK", timeout_ms).into_result()?;
        }
        Ok(())
    }

    /// Arm the link's byte-arrival interrupt.
    pub fn listen(&mut self) -> Result<(), Error> {
        self.link.listen().map_err(|e| {
            emit(&mut self.sink, format_args!("[modem] listen failed: {:?}", e));
            Error::TransmitFailed
        })
    }

    /// Write a formatted line to the diagnostics sink.
    pub fn trace(&mut self, args: fmt::Arguments<'_>) {
        emit(&mut self.sink, args);
    }

    /// The clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The serial link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Mutable access to the serial link.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Mutable access to the diagnostics sink.
    pub fn sink_mut(&mut self) -> &mut D {
        &mut self.sink
    }

    /// Give back the link, clock and sink.
    pub fn into_parts(self) -> (L, C, D) {
        (self.link, self.clock, self.sink)
    }

    fn slice(&self, deadline: &Deadline) -> u32 {
        self.byte_timeout_ms
            .min(deadline.remaining(&self.clock))
            .max(1)
    }

    fn collect(&mut self, expect: Option<&str>, timeout_ms: u32) -> Exchange {
        let deadline = Deadline::start(&self.clock, timeout_ms);
        let mut response = RawResponse::new();

        let outcome = loop {
            let slice = self.slice(&deadline);
            if let Ok(byte) = self.link.receive_byte(slice) {
                response.push(byte);
            }

            match expect {
                // Checked after every byte, so the match always ends the buffer.
                Some(pattern) if response.as_bytes().ends_with(pattern.as_bytes()) => {
                    break Outcome::Ok;
                }
                Some(_) if response.is_full() => break Outcome::Timeout,
                None if response.is_full() => break Outcome::Ok,
                _ => {}
            }

            if deadline.expired(&self.clock) {
                break match expect {
                    Some(_) => Outcome::Timeout,
                    None => Outcome::Ok,
                };
            }
        };

        Exchange { outcome, response }
    }

    fn report(&mut self, kind: &str, text: &str, exchange: &Exchange) {
        emit(
            &mut self.sink,
            format_args!(
                "[modem] {}: {} | rsp: {} ({})",
                kind,
                text,
                Printable(exchange.response.as_bytes()),
                exchange.outcome
            ),
        );
    }
}
