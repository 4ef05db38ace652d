//! MQTT 3.1.1 control packet encoding for the modem's raw send cycle.
//!
//! Packets are built directly into a fixed-capacity [`Packet`] buffer and
//! handed to [`Modem::send_data`](crate::network::modem::Modem::send_data)
//! unchanged. Nothing here performs I/O.
//!
//! The remaining-length field uses MQTT's variable-length integer: seven
//! value bits per byte, bit 7 set when another byte follows, at most four
//! bytes, so at most 268,435,455.
//!
//! ```rust
//! use atmqtt::network::application::mqtt::packet::{build_publish, PublishFlags};
//!
//! let packet = build_publish("stm32/test123", b"HELL", PublishFlags::default()).unwrap();
//! assert_eq!(&packet[..4], &[0x30, 0x13, 0x00, 0x0D]);
//! assert_eq!(&packet[packet.len() - 4..], b"HELL");
//! ```

use crate::config::{
    MAX_CLIENT_ID_LEN, MAX_PACKET_LEN, MAX_PAYLOAD_LEN, MAX_REMAINING_LENGTH, MAX_TOPIC_LEN,
};
use crate::network::error::Error;
use heapless::Vec;

// MQTT Control Packet types - these are the fixed header packet type values
/// MQTT CONNECT packet type identifier.
pub const CONNECT: u8 = 0x10;
/// MQTT CONNACK packet type identifier.
pub const CONNACK: u8 = 0x20;
/// MQTT PUBLISH packet type identifier, no flags set.
pub const PUBLISH: u8 = 0x30;
/// MQTT SUBSCRIBE packet type identifier with its mandatory `0010` flags.
pub const SUBSCRIBE: u8 = 0x82;

/// MQTT protocol name carried in CONNECT.
const PROTOCOL_NAME: &[u8] = b"MQTT";
/// MQTT protocol level for version 3.1.1.
const PROTOCOL_LEVEL: u8 = 4;
/// Clean-session bit of the CONNECT flags byte.
const CLEAN_SESSION: u8 = 0x02;

/// Length of a CONNACK packet on the wire.
pub const CONNACK_LEN: usize = 4;

/// Maximum number of bytes in a remaining-length field.
pub const MAX_REMAINING_LENGTH_BYTES: usize = 4;

/// A fully encoded control packet.
pub type Packet = Vec<u8, MAX_PACKET_LEN>;

/// Quality of Service levels for MQTT messages.
///
/// Only [`QoS::AtMostOnce`] has delivery semantics in this crate; the other
/// levels are carried in header bits and SUBSCRIBE requests as given.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QoS {
    /// At most once delivery.
    #[default]
    AtMostOnce = 0,
    /// At least once delivery.
    AtLeastOnce = 1,
    /// Exactly once delivery.
    ExactlyOnce = 2,
}

/// Low-nibble flags of a PUBLISH fixed header.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct PublishFlags {
    /// Delivery level, bits 1-2.
    pub qos: QoS,
    /// Retain flag, bit 0.
    pub retain: bool,
    /// Duplicate delivery flag, bit 3.
    pub dup: bool,
}

impl PublishFlags {
    /// Pack the flags into the low nibble of the fixed header.
    pub const fn bits(&self) -> u8 {
        ((self.dup as u8) << 3) | ((self.qos as u8) << 1) | (self.retain as u8)
    }
}

/// Append the variable-length encoding of `len` to `buf`.
///
/// Fails with [`Error::PayloadTooLarge`] when `len` needs more than four
/// bytes or `buf` runs out of room.
pub fn encode_remaining_length<const N: usize>(
    buf: &mut Vec<u8, N>,
    mut len: usize,
) -> Result<(), Error> {
    if len > MAX_REMAINING_LENGTH {
        return Err(Error::PayloadTooLarge);
    }
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        buf.push(byte).map_err(|_| Error::PayloadTooLarge)?;
        if len == 0 {
            break;
        }
    }
    Ok(())
}

/// Decode a remaining-length field from the start of `bytes`.
///
/// * `Ok(Some((value, used)))` - the field is complete and spans `used` bytes
/// * `Ok(None)` - `bytes` ends before the field does
/// * `Err(Error::MalformedFrame)` - a fourth byte still has its continuation bit
pub fn decode_remaining_length(bytes: &[u8]) -> Result<Option<(usize, usize)>, Error> {
    let mut value = 0usize;
    for (i, &byte) in bytes.iter().take(MAX_REMAINING_LENGTH_BYTES).enumerate() {
        value |= ((byte & 0x7F) as usize) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }
    if bytes.len() >= MAX_REMAINING_LENGTH_BYTES {
        Err(Error::MalformedFrame)
    } else {
        Ok(None)
    }
}

/// Number of bytes `len` occupies once encoded.
pub const fn remaining_length_len(len: usize) -> usize {
    if len < 128 {
        1
    } else if len < 16_384 {
        2
    } else if len < 2_097_152 {
        3
    } else {
        4
    }
}

fn put(packet: &mut Packet, bytes: &[u8]) -> Result<(), Error> {
    packet
        .extend_from_slice(bytes)
        .map_err(|_| Error::PayloadTooLarge)
}

fn put_prefixed(packet: &mut Packet, bytes: &[u8]) -> Result<(), Error> {
    put(packet, &(bytes.len() as u16).to_be_bytes())?;
    put(packet, bytes)
}

fn start(header: u8, remaining: usize) -> Result<Packet, Error> {
    let mut packet = Packet::new();
    packet.push(header).map_err(|_| Error::PayloadTooLarge)?;
    encode_remaining_length(&mut packet, remaining)?;
    Ok(packet)
}

/// Build a CONNECT packet.
///
/// # Errors
///
/// * [`Error::PayloadTooLarge`] - `client_id` is longer than [`MAX_CLIENT_ID_LEN`]
///
/// # Examples
///
/// ```rust
/// use atmqtt::network::application::mqtt::packet::build_connect;
///
/// let packet = build_connect("STM32", 100, true).unwrap();
/// assert_eq!(
///     packet.as_slice(),
///     &[0x10, 0x11, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x64,
///       0x00, 0x05, b'S', b'T', b'M', b'3', b'2']
/// );
/// ```
pub fn build_connect(
    client_id: &str,
    keep_alive_seconds: u16,
    clean_session: bool,
) -> Result<Packet, Error> {
    let id = client_id.as_bytes();
    if id.len() > MAX_CLIENT_ID_LEN {
        return Err(Error::PayloadTooLarge);
    }

    // Variable header: name, level, flags, keep-alive; payload: client id.
    let remaining = 2 + PROTOCOL_NAME.len() + 1 + 1 + 2 + 2 + id.len();
    let mut packet = start(CONNECT, remaining)?;

    put_prefixed(&mut packet, PROTOCOL_NAME)?;
    let flags = if clean_session { CLEAN_SESSION } else { 0 };
    put(&mut packet, &[PROTOCOL_LEVEL, flags])?;
    put(&mut packet, &keep_alive_seconds.to_be_bytes())?;
    put_prefixed(&mut packet, id)?;

    Ok(packet)
}

/// Build a SUBSCRIBE packet for a single topic filter.
///
/// # Errors
///
/// * [`Error::PayloadTooLarge`] - `topic` is longer than [`MAX_TOPIC_LEN`]
pub fn build_subscribe(packet_id: u16, topic: &str, qos: QoS) -> Result<Packet, Error> {
    let topic = topic.as_bytes();
    if topic.len() > MAX_TOPIC_LEN {
        return Err(Error::PayloadTooLarge);
    }

    let remaining = 2 + 2 + topic.len() + 1;
    let mut packet = start(SUBSCRIBE, remaining)?;

    put(&mut packet, &packet_id.to_be_bytes())?;
    put_prefixed(&mut packet, topic)?;
    put(&mut packet, &[qos as u8])?;

    Ok(packet)
}

/// Build a PUBLISH packet.
///
/// The variable header carries only the topic; no packet identifier is
/// written whatever the QoS bits say.
///
/// # Errors
///
/// * [`Error::PayloadTooLarge`] - `topic` exceeds [`MAX_TOPIC_LEN`] or
///   `payload` exceeds [`MAX_PAYLOAD_LEN`]
pub fn build_publish(topic: &str, payload: &[u8], flags: PublishFlags) -> Result<Packet, Error> {
    let topic = topic.as_bytes();
    if topic.len() > MAX_TOPIC_LEN || payload.len() > MAX_PAYLOAD_LEN {
        return Err(Error::PayloadTooLarge);
    }

    let remaining = 2 + topic.len() + payload.len();
    let mut packet = start(PUBLISH | flags.bits(), remaining)?;

    put_prefixed(&mut packet, topic)?;
    put(&mut packet, payload)?;

    Ok(packet)
}

/// A decoded CONNACK.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Connack {
    /// Session-present flag from the acknowledge flags byte.
    pub session_present: bool,
    /// Connect return code; zero means accepted.
    pub return_code: u8,
}

impl Connack {
    /// Parse the four CONNACK bytes `0x20 0x02 <flags> <return code>`.
    ///
    /// A wrong header is [`Error::MalformedFrame`]; the return code is not
    /// judged here, see [`Connack::accept`].
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        match bytes {
            [CONNACK, 0x02, flags, code] => Ok(Self {
                session_present: flags & 0x01 != 0,
                return_code: *code,
            }),
            _ => Err(Error::MalformedFrame),
        }
    }

    /// Whether the broker accepted the connection.
    pub fn is_accepted(&self) -> bool {
        self.return_code == 0
    }

    /// Turn a refusal into [`Error::Rejected`].
    pub fn accept(self) -> Result<Self, Error> {
        if self.is_accepted() {
            Ok(self)
        } else {
            Err(Error::Rejected(self.return_code))
        }
    }

    /// The MQTT 3.1.1 meaning of the return code.
    pub fn reason(&self) -> &'static str {
        match self.return_code {
            0 => "accepted",
            1 => "unacceptable protocol version",
            2 => "identifier rejected",
            3 => "server unavailable",
            4 => "bad user name or password",
            5 => "not authorized",
            _ => "unknown return code",
        }
    }
}
