//! Human-readable protocol trace.
//!
//! The modem link has no other observability than a text channel, usually a
//! second UART. Everything the transaction engine, the bootstrap and the
//! client want to say goes through a [`DiagnosticsSink`] one line at a time.
//! Writing is best effort: a sink never reports failure back into the
//! protocol logic.
//!
//! Lines are formatted into a bounded buffer ([`DIAGNOSTIC_LINE_SIZE`]) and
//! silently truncated when they do not fit. Raw modem bytes are rendered
//! through [`Printable`] or [`HexDump`].
//!
//! ```rust
//! use atmqtt::system::diagnostics::{emit, DiagnosticsSink, HexDump, Printable};
//!
//! struct Collect(std::vec::Vec<std::string::String>);
//!
//! impl DiagnosticsSink for Collect {
//!     fn write_line(&mut self, text: &str) {
//!         self.0.push(text.into());
//!     }
//! }
//!
//! let mut sink = Collect(Vec::new());
//! emit(&mut sink, format_args!("rsp: {}", Printable(b"OK\r\n")));
//! emit(&mut sink, format_args!("{}", HexDump(&[0x20, 0x02, 0x00, 0x00])));
//! assert_eq!(sink.0[0], "rsp: OK\\r\\n");
//! assert_eq!(sink.0[1], "0x20 0x02 0x00 0x00");
//! ```

use crate::config::DIAGNOSTIC_LINE_SIZE;
use core::fmt::{self, Write};
use heapless::String;

/// Destination for diagnostic text lines.
///
/// Implementations must not block the caller for long and must swallow their
/// own failures.
pub trait DiagnosticsSink {
    /// Write one line. The text carries no line terminator.
    fn write_line(&mut self, text: &str);
}

/// Output function signature accepted as a sink, e.g. a UART writer.
pub type OutputFn = fn(&str);

impl DiagnosticsSink for OutputFn {
    fn write_line(&mut self, text: &str) {
        (self)(text)
    }
}

impl<S: DiagnosticsSink + ?Sized> DiagnosticsSink for &mut S {
    fn write_line(&mut self, text: &str) {
        (**self).write_line(text)
    }
}

/// A sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn write_line(&mut self, _text: &str) {}
}

/// A bounded line buffer that keeps whatever fits and drops the rest.
#[derive(Debug, Default)]
pub struct LineWriter<const N: usize = DIAGNOSTIC_LINE_SIZE> {
    line: String<N>,
    truncated: bool,
}

impl<const N: usize> LineWriter<N> {
    /// Create an empty line.
    pub const fn new() -> Self {
        Self {
            line: String::new(),
            truncated: false,
        }
    }

    /// The text collected so far.
    pub fn as_str(&self) -> &str {
        self.line.as_str()
    }

    /// Whether anything was dropped.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl<const N: usize> Write for LineWriter<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.truncated {
            return Ok(());
        }
        if self.line.push_str(s).is_ok() {
            return Ok(());
        }
        for c in s.chars() {
            if self.line.push(c).is_err() {
                self.truncated = true;
                break;
            }
        }
        Ok(())
    }
}

/// Format `args` into a bounded line and hand it to `sink`.
pub fn emit<S: DiagnosticsSink + ?Sized>(sink: &mut S, args: fmt::Arguments<'_>) {
    let mut line = LineWriter::<DIAGNOSTIC_LINE_SIZE>::new();
    // LineWriter never reports an error; truncation is recorded instead.
    let _ = line.write_fmt(args);
    sink.write_line(line.as_str());
}

/// Renders bytes as ASCII, escaping CR, LF and anything non-printable.
#[derive(Debug, Clone, Copy)]
pub struct Printable<'a>(pub &'a [u8]);

impl fmt::Display for Printable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0 {
            match b {
                b'\r' => f.write_str("\\r")?,
                b'\n' => f.write_str("\\n")?,
                b'\\' => f.write_str("\\\\")?,
                0x20..=0x7e => f.write_char(b as char)?,
                _ => write!(f, "\\x{:02X}", b)?,
            }
        }
        Ok(())
    }
}

/// Renders bytes as `0x10 0x11 ...`.
#[derive(Debug, Clone, Copy)]
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_char(' ')?;
            }
            write!(f, "0x{:02X}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Last(String<64>);

    impl DiagnosticsSink for Last {
        fn write_line(&mut self, text: &str) {
            self.0.clear();
            let _ = self.0.push_str(text);
        }
    }

    #[test]
    fn test_printable_escapes_control_bytes() {
        let mut line = LineWriter::<64>::new();
        write!(line, "{}", Printable(b"AT\r\n\x00ok\\")).unwrap();
        assert_eq!(line.as_str(), "AT\\r\\n\\x00ok\\\\");
    }

    #[test]
    fn test_hex_dump() {
        let mut line = LineWriter::<64>::new();
        write!(line, "{}", HexDump(&[0x10, 0x11, 0xff])).unwrap();
        assert_eq!(line.as_str(), "0x10 0x11 0xFF");
        line = LineWriter::new();
        write!(line, "{}", HexDump(&[])).unwrap();
        assert_eq!(line.as_str(), "");
    }

    #[test]
    fn test_line_writer_truncates() {
        let mut line = LineWriter::<8>::new();
        write!(line, "{}", "0123456789").unwrap();
        assert_eq!(line.as_str(), "01234567");
        assert!(line.is_truncated());
        write!(line, "more").unwrap();
        assert_eq!(line.as_str(), "01234567");
    }

    #[test]
    fn test_emit_through_mut_reference() {
        let mut sink = Last(String::new());
        let sink_ref = &mut sink;
        emit(sink_ref, format_args!("state {}", 3));
        assert_eq!(sink.0.as_str(), "state 3");
    }

    #[test]
    fn test_output_fn_sink() {
        fn discard(_: &str) {}
        let mut sink: OutputFn = discard;
        sink.write_line("ignored");
        NullSink.write_line("ignored");
    }
}
