//! Injected configuration and the shared size bounds.
//!
//! Network credentials, the broker address and the topic are supplied by the
//! application, either built in code (usually as a `const`) or parsed from a
//! JSON document with [`Config::from_json`].
//!
//! ```rust
//! use atmqtt::config::{Config, ConnackPolicy};
//!
//! let json = r#"{
//!     "ssid": "workshop",
//!     "passphrase": "hunter22",
//!     "broker_host": "192.168.1.104",
//!     "broker_port": 1883,
//!     "topic": "stm32/test123",
//!     "client_id": "STM32",
//!     "connack_policy": "permissive"
//! }"#;
//!
//! let config = Config::from_json(json).unwrap();
//! assert_eq!(config.broker_port, 1883);
//! assert_eq!(config.connack_policy, ConnackPolicy::Permissive);
//! assert_eq!(config.timeouts.join_ms, 20_000);
//! ```

use crate::network::error::Error;
use serde::Deserialize;

/// Maximum topic length, in bytes, accepted by the builder and the decoder.
pub const MAX_TOPIC_LEN: usize = 64;

/// Maximum PUBLISH payload, in bytes, accepted by the builder and the decoder.
pub const MAX_PAYLOAD_LEN: usize = 128;

/// Maximum client identifier length, in bytes.
pub const MAX_CLIENT_ID_LEN: usize = 64;

/// Largest value a four byte remaining-length field can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Capacity of the buffer every outbound packet is built into.
///
/// Sized for the largest PUBLISH: fixed header, four varint bytes, topic
/// length prefix, topic and payload.
pub const MAX_PACKET_LEN: usize = 1 + 4 + 2 + MAX_TOPIC_LEN + MAX_PAYLOAD_LEN;

/// Capacity of the interrupt-fed inbound buffer.
pub const RX_BUFFER_SIZE: usize = 256;

/// Capacity of the per-transaction response buffer.
pub const RESPONSE_BUFFER_SIZE: usize = 512;

/// Capacity of a formatted AT command line. The CRLF is sent separately.
pub const COMMAND_BUFFER_SIZE: usize = 128;

/// Capacity of one diagnostics line; longer lines are truncated.
pub const DIAGNOSTIC_LINE_SIZE: usize = 640;

/// How CONNACK content is judged during bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnackPolicy {
    /// The CONNACK header must be `0x20 0x02` and the return code zero.
    #[default]
    Enforce,
    /// Any CONNACK, or none at all, is accepted once the broker's bytes have
    /// been waited for. What was received is still reported.
    Permissive,
}

/// Time budgets, in milliseconds, for every bootstrap step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// `AT` liveness check.
    pub at_ms: u32,
    /// `AT+CWMODE=1`.
    pub mode_ms: u32,
    /// `AT+CWJAP`, joining the access point.
    pub join_ms: u32,
    /// `AT+CIPMUX=0`.
    pub mux_ms: u32,
    /// `AT+CIPSTART`, opening the TCP session.
    pub session_ms: u32,
    /// The `>` prompt after `AT+CIPSEND`.
    pub prompt_ms: u32,
    /// `SEND OK` after the raw packet bytes.
    pub send_ok_ms: u32,
    /// The `+IPD,4:` CONNACK envelope.
    pub connack_ms: u32,
    /// `ready` after `AT+RESTORE`.
    pub restore_ms: u32,
    /// Per-byte receive slice inside every wait loop.
    pub byte_ms: u32,
    /// Quiet period that ends the initial RX drain.
    pub drain_ms: u32,
}

impl Timeouts {
    /// Budgets that work with stock ESP8266 AT firmware.
    pub const fn new() -> Self {
        Self {
            at_ms: 1_000,
            mode_ms: 2_000,
            join_ms: 20_000,
            mux_ms: 2_000,
            session_ms: 10_000,
            prompt_ms: 5_000,
            send_ok_ms: 5_000,
            connack_ms: 10_000,
            restore_ms: 5_000,
            byte_ms: 50,
            drain_ms: 10,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::new()
    }
}

fn default_keep_alive() -> u16 {
    DEFAULT_KEEP_ALIVE_SECONDS
}

fn default_clean_session() -> bool {
    true
}

/// Keep-alive announced in CONNECT when none is configured.
pub const DEFAULT_KEEP_ALIVE_SECONDS: u16 = 100;

/// Everything the bootstrap and the client need to reach the broker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config<'a> {
    /// Access point name passed to `AT+CWJAP`.
    #[serde(borrow)]
    pub ssid: &'a str,
    /// Access point passphrase passed to `AT+CWJAP`.
    #[serde(borrow)]
    pub passphrase: &'a str,
    /// Broker host name or dotted address passed to `AT+CIPSTART`.
    #[serde(borrow)]
    pub broker_host: &'a str,
    /// Broker TCP port.
    pub broker_port: u16,
    /// Topic subscribed to and published on.
    #[serde(borrow)]
    pub topic: &'a str,
    /// MQTT client identifier.
    #[serde(borrow)]
    pub client_id: &'a str,
    /// Keep-alive announced in CONNECT.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_seconds: u16,
    /// Clean-session flag announced in CONNECT.
    #[serde(default = "default_clean_session")]
    pub clean_session: bool,
    /// How CONNACK content is judged.
    #[serde(default)]
    pub connack_policy: ConnackPolicy,
    /// Issue `AT+RESTORE` before the first command.
    #[serde(default)]
    pub restore_on_boot: bool,
    /// Step budgets.
    #[serde(default)]
    pub timeouts: Timeouts,
}

impl<'a> Config<'a> {
    /// Build a configuration with default keep-alive, clean session, strict
    /// CONNACK checking and the reference timeouts.
    pub const fn new(
        ssid: &'a str,
        passphrase: &'a str,
        broker_host: &'a str,
        broker_port: u16,
        topic: &'a str,
        client_id: &'a str,
    ) -> Self {
        Self {
            ssid,
            passphrase,
            broker_host,
            broker_port,
            topic,
            client_id,
            keep_alive_seconds: DEFAULT_KEEP_ALIVE_SECONDS,
            clean_session: true,
            connack_policy: ConnackPolicy::Enforce,
            restore_on_boot: false,
            timeouts: Timeouts::new(),
        }
    }

    /// Parse a JSON document and validate it.
    ///
    /// Strings are borrowed from `json`, so escape sequences inside them are
    /// not supported.
    pub fn from_json(json: &'a str) -> Result<Self, Error> {
        let (config, _) =
            serde_json_core::from_str::<Config<'a>>(json).map_err(|_| Error::InvalidConfig)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every field can be expressed in the AT commands and MQTT
    /// packets it ends up in.
    ///
    /// `,`, `"` and `\` in the SSID and passphrase are escaped when
    /// `AT+CWJAP` is formatted; line breaks cannot be. The broker host is
    /// sent as is and must not contain any of them.
    pub fn validate(&self) -> Result<(), Error> {
        let line_break = |s: &str| s.contains(['\r', '\n']);
        if line_break(self.ssid) || line_break(self.passphrase) {
            return Err(Error::InvalidConfig);
        }
        if self.broker_host.contains(['"', ',', '\\', '\r', '\n']) {
            return Err(Error::InvalidConfig);
        }
        if self.ssid.is_empty() || self.broker_host.is_empty() || self.broker_port == 0 {
            return Err(Error::InvalidConfig);
        }
        if self.topic.is_empty() || self.topic.len() > MAX_TOPIC_LEN {
            return Err(Error::InvalidConfig);
        }
        if self.client_id.len() > MAX_CLIENT_ID_LEN {
            return Err(Error::InvalidConfig);
        }
        if self.timeouts.byte_ms == 0 {
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Config<'static> = Config::new(
        "workshop",
        "hunter22",
        "broker.local",
        1883,
        "stm32/test123",
        "STM32",
    );

    #[test]
    fn test_default_config() {
        assert_eq!(BASE.keep_alive_seconds, 100);
        assert!(BASE.clean_session);
        assert_eq!(BASE.connack_policy, ConnackPolicy::Enforce);
        assert_eq!(BASE.timeouts.session_ms, 10_000);
        assert!(BASE.validate().is_ok());
    }

    #[test]
    fn test_from_json_minimal() {
        let json = r#"{"ssid":"a","passphrase":"b","broker_host":"10.0.0.2","broker_port":1884,"topic":"t/1","client_id":"dev"}"#;
        let config = Config::from_json(json).unwrap();
        assert_eq!(config.broker_host, "10.0.0.2");
        assert_eq!(config.broker_port, 1884);
        assert_eq!(config.keep_alive_seconds, DEFAULT_KEEP_ALIVE_SECONDS);
        assert_eq!(config.timeouts, Timeouts::new());
    }

    #[test]
    fn test_from_json_partial_timeouts() {
        let json = r#"{"ssid":"a","passphrase":"b","broker_host":"h","broker_port":1,"topic":"t","client_id":"c","timeouts":{"join_ms":30000}}"#;
        let config = Config::from_json(json).unwrap();
        assert_eq!(config.timeouts.join_ms, 30_000);
        assert_eq!(config.timeouts.at_ms, 1_000);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert_eq!(Config::from_json("{\"ssid\":"), Err(Error::InvalidConfig));
    }

    #[test]
    fn test_validate_credentials_and_host() {
        let mut config = BASE.clone();
        config.passphrase = "pa\"s,s\\";
        assert!(config.validate().is_ok());

        config.ssid = "line\r\nbreak";
        assert_eq!(config.validate(), Err(Error::InvalidConfig));

        config.ssid = "workshop";
        config.broker_host = "broker,local";
        assert_eq!(config.validate(), Err(Error::InvalidConfig));
        config.broker_host = "broker\"local";
        assert_eq!(config.validate(), Err(Error::InvalidConfig));
    }

    #[test]
    fn test_validate_rejects_long_topic() {
        let bytes = [b'x'; MAX_TOPIC_LEN + 1];
        let mut config: Config<'_> = BASE.clone();
        config.topic = core::str::from_utf8(&bytes).unwrap();
        assert_eq!(config.validate(), Err(Error::InvalidConfig));
    }
}
