//! `+IPD,<n>:` envelope headers.
//!
//! When its TCP session receives data the modem prints `+IPD,`, the number of
//! data bytes in decimal, a colon, then the data itself. Nothing else frames
//! the data, so the declared length is the only way to know where it ends.

use super::find;

/// The literal that starts every data envelope.
pub const MARKER: &[u8] = b"+IPD,";

/// More digits than this can not come from a real TCP segment.
pub const MAX_LENGTH_DIGITS: usize = 5;

/// A parsed envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnvelopeHeader {
    /// Offset of the `+` of the marker.
    pub start: usize,
    /// Offset of the first data byte, just past the colon.
    pub body_start: usize,
    /// Number of data bytes announced by the modem.
    pub declared_len: usize,
}

impl EnvelopeHeader {
    /// Offset one past the last data byte.
    pub fn body_end(&self) -> usize {
        self.body_start + self.declared_len
    }

    /// Whether every announced data byte is within the first `buffered`
    /// bytes of the scanned region.
    pub fn is_complete(&self, buffered: usize) -> bool {
        buffered >= self.body_end()
    }
}

/// Result of looking for an envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Scan {
    /// No marker in the scanned bytes.
    NotFound,
    /// A marker whose length digits are not terminated yet.
    Incomplete {
        /// Offset of the marker.
        start: usize,
    },
    /// A complete header.
    Found(EnvelopeHeader),
    /// A marker followed by something other than `<digits>:`.
    Invalid {
        /// Offset of the marker.
        start: usize,
        /// Offset just past the marker; scanning resumes here.
        resume: usize,
    },
}

/// Find and parse the first envelope header in `bytes`.
///
/// The declared length must be 1 to [`MAX_LENGTH_DIGITS`] decimal digits
/// and non-zero.
///
/// ```rust
/// use atmqtt::network::modem::envelope::{scan, Scan};
///
/// match scan(b"\r\n+IPD,4:\x20\x02\x00\x00") {
///     Scan::Found(header) => {
///         assert_eq!(header.start, 2);
///         assert_eq!(header.body_start, 9);
///         assert_eq!(header.declared_len, 4);
///     }
///     other => panic!("unexpected {:?}", other),
/// }
/// assert_eq!(scan(b"+IPD,1"), Scan::Incomplete { start: 0 });
/// ```
pub fn scan(bytes: &[u8]) -> Scan {
    let Some(start) = find(bytes, MARKER) else {
        return Scan::NotFound;
    };
    let digits_start = start + MARKER.len();
    let invalid = Scan::Invalid {
        start,
        resume: digits_start,
    };

    let mut declared_len = 0usize;
    for (i, &byte) in bytes[digits_start..].iter().enumerate() {
        match byte {
            b':' if i > 0 && declared_len > 0 => {
                return Scan::Found(EnvelopeHeader {
                    start,
                    body_start: digits_start + i + 1,
                    declared_len,
                });
            }
            b'0'..=b'9' if i < MAX_LENGTH_DIGITS => {
                declared_len = declared_len * 10 + (byte - b'0') as usize;
            }
            _ => return invalid,
        }
    }
    Scan::Incomplete { start }
}
