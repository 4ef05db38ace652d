//! Power-on to MQTT session.
//!
//! [`Bootstrap`] walks the modem through a fixed chain of steps. Each step is
//! one AT transaction (or the CONNECT/CONNACK exchange) and each has its own
//! time budget from [`Timeouts`](crate::config::Timeouts). There is no retry:
//! the first failing step halts the chain for good and every later call
//! returns the same [`Fatal`].
//!
//! ```text
//! Idle -> AtReady -> ModeSet -> NetworkJoined -> SingleConnection
//!      -> SessionOpened -> MqttSent -> Connected
//!
//! any failure -> Halted
//! ```

use super::transaction::Modem;
use crate::config::{COMMAND_BUFFER_SIZE, Config, ConnackPolicy};
use crate::network::application::mqtt::packet::{CONNACK_LEN, Connack, build_connect};
use crate::network::error::Error;
use crate::network::{Clock, Deadline, SerialLink};
use crate::system::diagnostics::{DiagnosticsSink, HexDump};
use core::fmt::{self, Write};
use heapless::String;

/// Bootstrap progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Nothing sent yet.
    Idle,
    /// The modem answered `AT`.
    AtReady,
    /// Station mode set.
    ModeSet,
    /// Joined the access point and got an address.
    NetworkJoined,
    /// Single-connection mode set.
    SingleConnection,
    /// TCP session to the broker open.
    SessionOpened,
    /// CONNECT handed to the modem and acknowledged with `SEND OK`.
    MqttSent,
    /// CONNACK received and accepted.
    Connected,
    /// A step failed. Terminal.
    Halted,
}

impl State {
    /// The state a successful step from `self` leads to.
    pub const fn next(self) -> State {
        match self {
            State::Idle => State::AtReady,
            State::AtReady => State::ModeSet,
            State::ModeSet => State::NetworkJoined,
            State::NetworkJoined => State::SingleConnection,
            State::SingleConnection => State::SessionOpened,
            State::SessionOpened => State::MqttSent,
            State::MqttSent | State::Connected => State::Connected,
            State::Halted => State::Halted,
        }
    }

    /// Whether no further step can change the state.
    pub const fn is_terminal(self) -> bool {
        matches!(self, State::Connected | State::Halted)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Idle => "idle",
            State::AtReady => "at-ready",
            State::ModeSet => "mode-set",
            State::NetworkJoined => "network-joined",
            State::SingleConnection => "single-connection",
            State::SessionOpened => "session-opened",
            State::MqttSent => "mqtt-sent",
            State::Connected => "connected",
            State::Halted => "halted",
        })
    }
}

/// A bootstrap failure: the step that failed and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fatal {
    /// The state the failing step started from.
    pub state: State,
    /// What went wrong.
    pub error: Error,
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in state {}", self.error, self.state)
    }
}

impl From<Fatal> for Error {
    fn from(fatal: Fatal) -> Self {
        fatal.error
    }
}

/// The connection bootstrap state machine.
#[derive(Debug)]
pub struct Bootstrap<'a> {
    config: &'a Config<'a>,
    state: State,
    fatal: Option<Fatal>,
    connack: Option<Connack>,
}

impl<'a> Bootstrap<'a> {
    /// A bootstrap in [`State::Idle`].
    pub fn new(config: &'a Config<'a>) -> Self {
        Self {
            config,
            state: State::Idle,
            fatal: None,
            connack: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The failure that halted the chain, if any.
    pub fn fatal(&self) -> Option<Fatal> {
        self.fatal
    }

    /// The CONNACK seen by the last step, if it could be parsed.
    pub fn connack(&self) -> Option<Connack> {
        self.connack
    }

    /// Run steps until [`State::Connected`] or the first failure.
    ///
    /// Reports the total time spent to the diagnostics sink on success.
    pub fn run<L, C, D>(&mut self, modem: &mut Modem<L, C, D>) -> Result<(), Fatal>
    where
        L: SerialLink,
        C: Clock,
        D: DiagnosticsSink,
    {
        let started = modem.clock().now_ms();
        while self.step(modem)? != State::Connected {}
        let elapsed = modem.clock().now_ms().wrapping_sub(started);
        modem.trace(format_args!("[boot] connected in {} ms", elapsed));
        Ok(())
    }

    /// Perform the single step out of the current state.
    ///
    /// Returns the new state. In [`State::Connected`] nothing is sent and
    /// the state is returned as is. Once halted, the stored [`Fatal`] is
    /// returned without touching the modem.
    pub fn step<L, C, D>(&mut self, modem: &mut Modem<L, C, D>) -> Result<State, Fatal>
    where
        L: SerialLink,
        C: Clock,
        D: DiagnosticsSink,
    {
        if let Some(fatal) = self.fatal {
            return Err(fatal);
        }

        let from = self.state;
        let timeouts = self.config.timeouts;
        let result = match from {
            State::Idle => self.wake(modem),
            State::AtReady => modem.send_at("AT+CWMODE=1", "OK", timeouts.mode_ms).map(drop),
            State::ModeSet => self.join(modem),
            State::NetworkJoined => modem.send_at("AT+CIPMUX=0", "OK", timeouts.mux_ms).map(drop),
            State::SingleConnection => self.open_session(modem),
            State::SessionOpened => self.send_connect(modem),
            State::MqttSent => self.await_connack(modem),
            State::Connected | State::Halted => return Ok(from),
        };

        match result {
            Ok(()) => {
                self.state = from.next();
                info!("bootstrap: {}", self.state);
                modem.trace(format_args!("[boot] {}", self.state));
                Ok(self.state)
            }
            Err(error) => {
                let fatal = Fatal { state: from, error };
                error!("bootstrap halted: {}", fatal);
                modem.trace(format_args!("[boot] fatal: {}", fatal));
                self.state = State::Halted;
                self.fatal = Some(fatal);
                Err(fatal)
            }
        }
    }

    fn wake<L, C, D>(&mut self, modem: &mut Modem<L, C, D>) -> Result<(), Error>
    where
        L: SerialLink,
        C: Clock,
        D: DiagnosticsSink,
    {
        self.config.validate()?;
        let timeouts = self.config.timeouts;
        modem.set_byte_timeout(timeouts.byte_ms);

        if self.config.restore_on_boot {
            modem.restore(timeouts.restore_ms)?;
        }
        modem.drain(timeouts.drain_ms);
        modem.send_at("AT", "OK", timeouts.at_ms).map(drop)
    }

    fn join<L, C, D>(&mut self, modem: &mut Modem<L, C, D>) -> Result<(), Error>
    where
        L: SerialLink,
        C: Clock,
        D: DiagnosticsSink,
    {
        let command = format_command(format_args!(
            "AT+CWJAP=\"{}\",\"{}\"",
            AtEscaped(self.config.ssid),
            AtEscaped(self.config.passphrase)
        ))?;
        modem
            .send_at(&command, "WIFI GOT IP", self.config.timeouts.join_ms)
            .map(drop)
    }

    fn open_session<L, C, D>(&mut self, modem: &mut Modem<L, C, D>) -> Result<(), Error>
    where
        L: SerialLink,
        C: Clock,
        D: DiagnosticsSink,
    {
        let command = format_command(format_args!(
            "AT+CIPSTART=\"TCP\",\"{}\",{}",
            self.config.broker_host, self.config.broker_port
        ))?;
        modem
            .send_at(&command, "CONNECT", self.config.timeouts.session_ms)
            .map(drop)
    }

    fn send_connect<L, C, D>(&mut self, modem: &mut Modem<L, C, D>) -> Result<(), Error>
    where
        L: SerialLink,
        C: Clock,
        D: DiagnosticsSink,
    {
        let config = self.config;
        let packet = build_connect(
            config.client_id,
            config.keep_alive_seconds,
            config.clean_session,
        )?;
        modem.trace(format_args!("[boot] CONNECT: {}", HexDump(&packet)));
        modem.send_data(&packet, config.timeouts.prompt_ms, None)?;

        let exchange = modem.wait_for("SEND OK", config.timeouts.send_ok_ms);
        modem.trace(format_args!(
            "[boot] pre-CONNACK: {}",
            HexDump(exchange.response.as_bytes())
        ));
        exchange.into_result().map(drop)
    }

    fn await_connack<L, C, D>(&mut self, modem: &mut Modem<L, C, D>) -> Result<(), Error>
    where
        L: SerialLink,
        C: Clock,
        D: DiagnosticsSink,
    {
        let timeout_ms = self.config.timeouts.connack_ms;
        let deadline = Deadline::start(modem.clock(), timeout_ms);

        let mut bytes = [0u8; CONNACK_LEN];
        let envelope = modem.wait_for("+IPD,4:", timeout_ms);
        let received = if envelope.is_ok() {
            let remaining = deadline.remaining(modem.clock());
            modem.read_exact(&mut bytes, remaining)
        } else {
            0
        };
        modem.trace(format_args!(
            "[boot] CONNACK: {}",
            HexDump(&bytes[..received])
        ));

        let parsed = if received == CONNACK_LEN {
            Connack::parse(&bytes)
        } else {
            Err(Error::Timeout)
        };
        if let Ok(connack) = parsed {
            self.connack = Some(connack);
            if !connack.is_accepted() {
                modem.trace(format_args!(
                    "[boot] CONNACK return code {} ({})",
                    connack.return_code,
                    connack.reason()
                ));
            }
        }

        match (parsed.and_then(Connack::accept), self.config.connack_policy) {
            (Ok(_), _) => Ok(()),
            (Err(error), ConnackPolicy::Enforce) => Err(error),
            (Err(error), ConnackPolicy::Permissive) => {
                modem.trace(format_args!("[boot] ignoring CONNACK problem: {}", error));
                Ok(())
            }
        }
    }
}

/// Renders a string argument with `,`, `"` and `\` backslash-escaped, as
/// the AT firmware expects inside quoted parameters.
struct AtEscaped<'a>(&'a str);

impl fmt::Display for AtEscaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            if matches!(c, ',' | '"' | '\\') {
                f.write_char('\\')?;
            }
            f.write_char(c)?;
        }
        Ok(())
    }
}

fn format_command(args: fmt::Arguments<'_>) -> Result<String<COMMAND_BUFFER_SIZE>, Error> {
    let mut command = String::new();
    fmt::write(&mut command, args).map_err(|_| Error::InvalidConfig)?;
    Ok(command)
}
