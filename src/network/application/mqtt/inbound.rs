//! Reassembly of PUBLISH packets from the modem's byte stream.
//!
//! Once the byte-arrival interrupt is armed, every byte the modem prints lands
//! in a [`Reassembler`], one at a time. The main loop calls
//! [`Reassembler::poll`], which looks for a complete `+IPD,<n>:` envelope,
//! decodes the PUBLISH inside it and removes the consumed bytes.
//!
//! ```rust
//! use atmqtt::network::application::mqtt::inbound::{Poll, Reassembler};
//!
//! let mut rx: Reassembler<64> = Reassembler::new();
//! rx.extend(b"+IPD,15:\x30\x0d\x00\x05topicA1");
//! assert!(matches!(rx.poll(), Poll::AwaitingBody { declared: 15, buffered: 11 }));
//!
//! rx.extend(b"2345");
//! match rx.poll() {
//!     Poll::Message(message) => {
//!         assert_eq!(message.topic.as_str(), "topic");
//!         assert_eq!(&message.payload[..], b"A12345");
//!     }
//!     other => panic!("unexpected {:?}", other),
//! }
//! assert!(rx.is_empty());
//! ```

use crate::config::{MAX_PAYLOAD_LEN, MAX_TOPIC_LEN, RX_BUFFER_SIZE};
use crate::network::application::mqtt::packet::{PUBLISH, decode_remaining_length};
use crate::network::error::Error;
use crate::network::modem::envelope::{self, MARKER, MAX_LENGTH_DIGITS, Scan};
use core::fmt;
use heapless::{String, Vec};

/// Longest possible envelope header: marker, length digits and colon.
const MAX_HEADER_LEN: usize = MARKER.len() + MAX_LENGTH_DIGITS + 1;

/// A decoded inbound PUBLISH.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct InboundMessage {
    /// The topic the message was published on.
    pub topic: String<MAX_TOPIC_LEN>,
    /// The message payload.
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
}

impl InboundMessage {
    /// The payload as text, when it is valid UTF-8.
    pub fn payload_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.payload).ok()
    }
}

/// Why an envelope was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscardReason {
    /// The envelope did not start with a QoS 0 PUBLISH header; carries the
    /// byte found instead.
    NotPublish(u8),
    /// `+IPD,` was not followed by `<digits>:`.
    BadEnvelope,
    /// The declared length can never fit in the buffer.
    EnvelopeTooLarge,
    /// The remaining-length field ran past four bytes.
    RemainingLength,
    /// The envelope ended before the packet did.
    Truncated,
    /// The topic length exceeds the topic bound; carries the claimed length.
    TopicTooLong(usize),
    /// The remaining length is too short for the topic it carries.
    LengthMismatch,
    /// The payload exceeds the payload bound; carries the implied length.
    PayloadTooLong(usize),
    /// The topic is not UTF-8.
    InvalidTopic,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::NotPublish(byte) => write!(f, "not a PUBLISH (0x{:02X})", byte),
            DiscardReason::BadEnvelope => f.write_str("bad +IPD header"),
            DiscardReason::EnvelopeTooLarge => f.write_str("envelope larger than buffer"),
            DiscardReason::RemainingLength => f.write_str("bad remaining length"),
            DiscardReason::Truncated => f.write_str("truncated packet"),
            DiscardReason::TopicTooLong(len) => write!(f, "topic too long ({} bytes)", len),
            DiscardReason::LengthMismatch => f.write_str("remaining length shorter than topic"),
            DiscardReason::PayloadTooLong(len) => write!(f, "payload too long ({} bytes)", len),
            DiscardReason::InvalidTopic => f.write_str("topic is not UTF-8"),
        }
    }
}

impl From<DiscardReason> for Error {
    fn from(_: DiscardReason) -> Self {
        Error::MalformedFrame
    }
}

/// What [`Reassembler::poll`] found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    /// No envelope marker buffered.
    Idle,
    /// A marker whose length is not terminated yet.
    AwaitingHeader,
    /// A complete header whose data has not fully arrived.
    AwaitingBody {
        /// Data bytes the modem announced.
        declared: usize,
        /// Data bytes buffered so far.
        buffered: usize,
    },
    /// A PUBLISH was decoded and its envelope consumed.
    Message(InboundMessage),
    /// An envelope was consumed without producing a message.
    Discarded(DiscardReason),
}

/// Fixed-capacity inbound byte buffer with envelope detection.
///
/// `index` is the number of buffered bytes and stays below `N`. A push that
/// would make it reach `N` wraps it to zero instead, dropping everything
/// buffered; [`overflows`](Reassembler::overflows) counts those events.
/// `N` must be at least one, which is checked at compile time:
///
/// ```compile_fail
/// use atmqtt::network::application::mqtt::Reassembler;
///
/// let rx: Reassembler<0> = Reassembler::new();
/// ```
#[derive(Debug, Clone)]
pub struct Reassembler<const N: usize = RX_BUFFER_SIZE> {
    buffer: [u8; N],
    index: usize,
    overflows: u32,
}

impl<const N: usize> Default for Reassembler<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Reassembler<N> {
    /// An empty buffer.
    pub const fn new() -> Self {
        const { assert!(N > 0, "a reassembler needs room for at least one byte") };
        Self {
            buffer: [0; N],
            index: 0,
            overflows: 0,
        }
    }

    /// Append one byte.
    pub fn push(&mut self, byte: u8) {
        self.buffer[self.index] = byte;
        self.index += 1;
        if self.index >= N {
            self.index = 0;
            self.overflows = self.overflows.wrapping_add(1);
        }
    }

    /// Append every byte of `bytes` in order.
    pub fn extend(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push(byte);
        }
    }

    /// The buffered bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.index]
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.index
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.index == 0
    }

    /// Buffer capacity.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// How many times the write cursor wrapped.
    pub fn overflows(&self) -> u32 {
        self.overflows
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.index = 0;
    }

    /// Look for one complete envelope and decode it.
    ///
    /// Bytes that cannot belong to an envelope are dropped: without a marker
    /// only a possible partial marker at the end is kept. While an envelope
    /// is incomplete the buffer is left as it is, unless the envelope (or a
    /// header still being received) only fits once the bytes before its
    /// marker are dropped.
    /// Once an envelope is complete everything up to its end is consumed,
    /// whether or not it held a valid PUBLISH, and the bytes after it move
    /// to the front.
    pub fn poll(&mut self) -> Poll {
        let buffered = self.index;
        // The cursor never reaches N, so at most N - 1 bytes fit.
        let limit = N - 1;
        let header = match envelope::scan(&self.buffer[..buffered]) {
            Scan::NotFound => {
                self.consume(buffered.saturating_sub(MARKER.len() - 1));
                return Poll::Idle;
            }
            Scan::Incomplete { start } => {
                if start + MAX_HEADER_LEN > limit {
                    self.consume(start);
                }
                return Poll::AwaitingHeader;
            }
            Scan::Invalid { resume, .. } => {
                self.consume(resume);
                return Poll::Discarded(DiscardReason::BadEnvelope);
            }
            Scan::Found(header) => header,
        };

        if header.body_end() - header.start > limit {
            self.consume(header.body_start);
            return Poll::Discarded(DiscardReason::EnvelopeTooLarge);
        }

        if !header.is_complete(buffered) {
            if header.body_end() > limit {
                self.consume(header.start);
            }
            return Poll::AwaitingBody {
                declared: header.declared_len,
                buffered: buffered - header.body_start,
            };
        }

        let decoded = decode_publish(&self.buffer[header.body_start..header.body_end()]);
        self.consume(header.body_end());
        match decoded {
            Ok(message) => Poll::Message(message),
            Err(reason) => Poll::Discarded(reason),
        }
    }

    fn consume(&mut self, count: usize) {
        let count = count.min(self.index);
        self.buffer.copy_within(count..self.index, 0);
        self.index -= count;
    }
}

/// Decode the QoS 0 PUBLISH at the start of an envelope body.
///
/// Bytes after the packet are ignored.
pub fn decode_publish(body: &[u8]) -> Result<InboundMessage, DiscardReason> {
    let (&header, rest) = body.split_first().ok_or(DiscardReason::Truncated)?;
    if header != PUBLISH {
        return Err(DiscardReason::NotPublish(header));
    }

    let (remaining, used) = decode_remaining_length(rest)
        .map_err(|_| DiscardReason::RemainingLength)?
        .ok_or(DiscardReason::Truncated)?;
    let packet = &rest[used..];

    let [hi, lo, ..] = *packet else {
        return Err(DiscardReason::Truncated);
    };
    let topic_len = u16::from_be_bytes([hi, lo]) as usize;
    if topic_len > MAX_TOPIC_LEN {
        return Err(DiscardReason::TopicTooLong(topic_len));
    }

    let payload_len = remaining
        .checked_sub(2 + topic_len)
        .ok_or(DiscardReason::LengthMismatch)?;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(DiscardReason::PayloadTooLong(payload_len));
    }
    if packet.len() < remaining {
        return Err(DiscardReason::Truncated);
    }

    let topic = core::str::from_utf8(&packet[2..2 + topic_len])
        .map_err(|_| DiscardReason::InvalidTopic)?;
    let payload = &packet[2 + topic_len..remaining];

    Ok(InboundMessage {
        topic: String::try_from(topic).map_err(|_| DiscardReason::TopicTooLong(topic_len))?,
        payload: Vec::from_slice(payload)
            .map_err(|_| DiscardReason::PayloadTooLong(payload_len))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_wraps_before_capacity() {
        let mut rx: Reassembler<4> = Reassembler::new();
        rx.extend(b"abc");
        assert_eq!(rx.len(), 3);
        assert_eq!(rx.overflows(), 0);
        rx.push(b'd');
        assert_eq!(rx.len(), 0);
        assert_eq!(rx.overflows(), 1);
        rx.push(b'e');
        assert_eq!(rx.as_bytes(), b"e");
    }

    #[test]
    fn test_pending_body_leaves_buffer_untouched() {
        let mut rx: Reassembler<64> = Reassembler::new();
        rx.extend(b"+IPD,10:\x30\x08\x00\x01t\x01");
        let before: Vec<u8, 64> = Vec::from_slice(rx.as_bytes()).unwrap();
        assert_eq!(
            rx.poll(),
            Poll::AwaitingBody {
                declared: 10,
                buffered: 6
            }
        );
        assert_eq!(rx.as_bytes(), before.as_slice());

        rx.extend(b"\x02\x03\x04\x05");
        match rx.poll() {
            Poll::Message(message) => {
                assert_eq!(message.topic.as_str(), "t");
                assert_eq!(&message.payload[..], &[1, 2, 3, 4, 5]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_noise_before_marker_is_consumed() {
        let mut rx: Reassembler<64> = Reassembler::new();
        rx.extend(b"SEND OK\r\n\r\n+IPD,6:\x30\x04\x00\x01aZ\r\n");
        assert!(matches!(rx.poll(), Poll::Message(_)));
        assert_eq!(rx.as_bytes(), b"\r\n");
    }

    #[test]
    fn test_bad_header_skips_marker() {
        let mut rx: Reassembler<64> = Reassembler::new();
        rx.extend(b"+IPD,x:+IPD,6:\x30\x04\x00\x01aZ");
        assert_eq!(rx.poll(), Poll::Discarded(DiscardReason::BadEnvelope));
        assert!(matches!(rx.poll(), Poll::Message(_)));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_envelope_too_large_for_buffer() {
        let mut rx: Reassembler<32> = Reassembler::new();
        rx.extend(b"+IPD,40:\x30");
        assert_eq!(rx.poll(), Poll::Discarded(DiscardReason::EnvelopeTooLarge));
        assert_eq!(rx.as_bytes(), b"\x30");
    }

    #[test]
    fn test_pending_envelope_moves_to_front_when_needed() {
        let mut rx: Reassembler<32> = Reassembler::new();
        rx.extend(b"noise noise noise noise +IPD,6:");
        assert!(matches!(rx.poll(), Poll::AwaitingBody { declared: 6, buffered: 0 }));
        assert_eq!(rx.as_bytes(), b"+IPD,6:");
        rx.extend(b"\x30\x04\x00\x01aZ");
        assert!(matches!(rx.poll(), Poll::Message(_)));
    }

    #[test]
    fn test_noise_without_marker_is_dropped() {
        let mut rx: Reassembler<32> = Reassembler::new();
        rx.extend(b"WIFI GOT IP\r\n+IP");
        assert_eq!(rx.poll(), Poll::Idle);
        assert_eq!(rx.as_bytes(), b"\n+IP");

        rx.extend(b"D,6:\x30\x04\x00\x01aZ");
        assert!(matches!(rx.poll(), Poll::Message(_)));
    }

    #[test]
    fn test_pending_header_moves_to_front_near_capacity() {
        let mut rx: Reassembler<32> = Reassembler::new();
        rx.extend(b"noise noise noise noise +IPD,");
        assert_eq!(rx.poll(), Poll::AwaitingHeader);
        assert_eq!(rx.as_bytes(), b"+IPD,");

        rx.extend(b"6:\x30\x04\x00\x01aZ");
        assert!(matches!(rx.poll(), Poll::Message(_)));
        assert_eq!(rx.overflows(), 0);
    }

    #[test]
    fn test_pending_header_stays_put_with_room() {
        let mut rx: Reassembler<64> = Reassembler::new();
        rx.extend(b"SEND OK\r\n+IPD,1");
        assert_eq!(rx.poll(), Poll::AwaitingHeader);
        assert_eq!(rx.as_bytes(), b"SEND OK\r\n+IPD,1");
    }

    #[test]
    fn test_single_byte_capacity() {
        let mut rx: Reassembler<1> = Reassembler::new();
        rx.push(b'+');
        assert!(rx.is_empty());
        assert_eq!(rx.overflows(), 1);
        assert_eq!(rx.poll(), Poll::Idle);
    }

    #[test]
    fn test_decode_rejections() {
        assert_eq!(decode_publish(b""), Err(DiscardReason::Truncated));
        assert_eq!(
            decode_publish(b"\x90\x03\x00\x01\x00"),
            Err(DiscardReason::NotPublish(0x90))
        );
        assert_eq!(
            decode_publish(b"\x30\x80\x80\x80\x80\x01"),
            Err(DiscardReason::RemainingLength)
        );
        assert_eq!(
            decode_publish(b"\x30\x05\x00\xc8abc"),
            Err(DiscardReason::TopicTooLong(200))
        );
        assert_eq!(
            decode_publish(b"\x30\x03\x00\x05topic"),
            Err(DiscardReason::LengthMismatch)
        );
        assert_eq!(
            decode_publish(b"\x30\x09\x00\x05top"),
            Err(DiscardReason::Truncated)
        );
        assert_eq!(
            decode_publish(b"\x30\x04\x00\x02\xff\xfe"),
            Err(DiscardReason::InvalidTopic)
        );
    }

    #[test]
    fn test_decode_payload_bound() {
        let mut body: Vec<u8, 200> = Vec::new();
        // remaining = 2 + 1 + 129
        body.extend_from_slice(&[0x30, 0x84, 0x01, 0x00, 0x01, b't']).unwrap();
        body.extend_from_slice(&[0u8; 129]).unwrap();
        assert_eq!(
            decode_publish(&body),
            Err(DiscardReason::PayloadTooLong(129))
        );
    }

    #[test]
    fn test_discard_reason_is_malformed_frame() {
        assert_eq!(Error::from(DiscardReason::Truncated), Error::MalformedFrame);
    }
}
