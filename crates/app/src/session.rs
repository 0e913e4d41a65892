//! Command session — correlates one outstanding AT command with its reply.
//!
//! The probe protocol has no message IDs: a command is written, and the
//! next complete reply on the notification channel is its answer. The
//! session therefore allows a single pending command at a time.
//!
//! ```text
//!            issue()                     reply / timeout / disconnect
//!   Idle ───────────────▶ Awaiting ─────────────────────────────────▶ Idle
//! ```
//!
//! All inputs carry an explicit `now` so the state machine can be tested
//! without a runtime; [`SessionDriver`](crate::driver::SessionDriver) owns
//! the real timer.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use soilprobe_domain::command::{AtCommand, ResponseKind};
use soilprobe_domain::error::{FrameError, ProbeError};
use soilprobe_domain::frame::{FrameBuffer, RawMessage};
use soilprobe_domain::parser::RecoveryParser;
use soilprobe_domain::pipeline;
use soilprobe_domain::reading::{RawReading, ReadingSet};
use soilprobe_domain::sensor::SensorRegistry;

use crate::config::SessionConfig;
use crate::ports::TransportError;

/// Successful outcome of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Calibrated values of a measurement command.
    Readings(ReadingSet),
    /// Parsed fields of a query command.
    Fields(RawReading),
    /// Reply body of an acknowledged command.
    Ack(String),
}

/// Why a command did not produce a [`Reply`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The link is down; nothing was written.
    #[error("probe not connected")]
    NotConnected,

    /// Another command is still awaiting its reply; nothing was written.
    #[error("a command is already awaiting its reply")]
    Busy,

    /// No complete reply arrived before the deadline.
    #[error("no reply within {after:?}")]
    Timeout {
        /// Configured deadline.
        after: Duration,
    },

    /// The link dropped while the command was pending.
    #[error("probe disconnected while awaiting reply")]
    Disconnected,

    /// A reply arrived but could not be turned into a result.
    #[error("failed to decode reply")]
    Probe(#[from] ProbeError),

    /// The reply overflowed the frame buffer.
    #[error("failed to frame reply")]
    Framing(#[from] FrameError),

    /// Writing the command failed.
    #[error("failed to write command")]
    Transport(#[from] TransportError),

    /// The reply kind did not match what the caller asked for.
    #[error("unexpected reply kind")]
    UnexpectedReply,

    /// The session driver is gone.
    #[error("session closed")]
    Closed,
}

/// Receives the final outcome of an issued command.
pub type ReplyReceiver = oneshot::Receiver<Result<Reply, SessionError>>;

/// A command accepted by [`CommandSession::issue`].
#[derive(Debug)]
pub struct Issued {
    /// Bytes to hand to the transport.
    pub wire: Vec<u8>,
    /// Resolves once the reply, a failure, or the deadline arrives.
    pub reply: ReplyReceiver,
}

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Ready for a command.
    Idle,
    /// Waiting for the reply to `command`.
    Awaiting {
        /// Display form of the pending command (`AT+MEA=?`).
        command: String,
        /// When the command times out.
        deadline: Instant,
    },
}

#[derive(Debug)]
struct PendingCommand {
    command: AtCommand,
    deadline: Instant,
    responder: oneshot::Sender<Result<Reply, SessionError>>,
}

/// Single-slot command/reply correlator.
#[derive(Debug)]
pub struct CommandSession {
    frames: FrameBuffer,
    parser: RecoveryParser,
    registry: SensorRegistry,
    timeout: Duration,
    connected: bool,
    pending: Option<PendingCommand>,
}

impl CommandSession {
    /// Create a disconnected, idle session.
    #[must_use]
    pub fn new(config: &SessionConfig, registry: SensorRegistry) -> Self {
        Self {
            frames: FrameBuffer::new(config.max_frame_bytes),
            parser: RecoveryParser::new(config.positional_order.clone()),
            registry,
            timeout: config.timeout(),
            connected: false,
            pending: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        match &self.pending {
            None => SessionState::Idle,
            Some(pending) => SessionState::Awaiting {
                command: pending.command.to_string(),
                deadline: pending.deadline,
            },
        }
    }

    /// Deadline of the pending command, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    /// Whether the session believes the link is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Mark the link as up.
    pub fn on_connected(&mut self) {
        tracing::debug!("probe link up");
        self.connected = true;
    }

    /// Mark the link as down, dropping partial replies and failing the
    /// pending command with [`SessionError::Disconnected`].
    pub fn on_disconnected(&mut self) {
        tracing::info!("probe link down");
        self.connected = false;
        self.frames.reset();
        self.resolve(Err(SessionError::Disconnected));
    }

    /// Accept a command for writing.
    ///
    /// The frame buffer is reset so leftovers from an abandoned reply
    /// cannot prefix the new one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] when the link is down and
    /// [`SessionError::Busy`] while another command is pending.
    pub fn issue(&mut self, command: AtCommand, now: Instant) -> Result<Issued, SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        if let Some(pending) = &self.pending {
            tracing::debug!(
                pending = %pending.command,
                rejected = %command,
                "command rejected, session busy"
            );
            return Err(SessionError::Busy);
        }

        self.frames.reset();

        let wire = command.encode();
        let (responder, reply) = oneshot::channel();
        let deadline = now + self.timeout;

        tracing::info!(command = %command, "sending command");
        self.pending = Some(PendingCommand {
            command,
            deadline,
            responder,
        });

        Ok(Issued { wire, reply })
    }

    /// Feed a transport fragment; resolves the pending command once its
    /// reply is complete.
    pub fn on_fragment(&mut self, fragment: &[u8]) {
        match self.frames.feed(fragment) {
            Ok(None) => {}
            Ok(Some(message)) => self.on_message(&message),
            Err(err) => {
                if self.pending.is_some() {
                    self.resolve(Err(SessionError::Framing(err)));
                } else {
                    tracing::warn!(%err, "framing failed with no command pending");
                }
            }
        }
    }

    /// Fail the pending command with [`SessionError::Timeout`] if its
    /// deadline has passed. Returns whether a command expired.
    pub fn expire(&mut self, now: Instant) -> bool {
        let expired = self.pending.as_ref().is_some_and(|p| now >= p.deadline);
        if expired {
            tracing::warn!(after = ?self.timeout, "command timed out");
            self.resolve(Err(SessionError::Timeout {
                after: self.timeout,
            }));
        }
        expired
    }

    /// Fail the pending command after its write was rejected.
    pub fn on_write_failed(&mut self, err: TransportError) {
        tracing::warn!(%err, "command write failed");
        self.resolve(Err(SessionError::Transport(err)));
    }

    fn on_message(&mut self, message: &RawMessage) {
        let Some(pending) = self.pending.as_ref() else {
            tracing::warn!(
                raw = %message.text().escape_debug(),
                "discarding reply with no command pending"
            );
            return;
        };

        let result = match pending.command.kind() {
            ResponseKind::Measurement => {
                pipeline::decode_measurement(message, &self.parser, &self.registry)
                    .map(Reply::Readings)
                    .map_err(SessionError::from)
            }
            ResponseKind::Query => self
                .parser
                .parse(message)
                .map(Reply::Fields)
                .map_err(|err| SessionError::Probe(err.into())),
            ResponseKind::Ack => Ok(Reply::Ack(message.body().to_owned())),
        };

        self.resolve(result);
    }

    fn resolve(&mut self, result: Result<Reply, SessionError>) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        match &result {
            Ok(_) => tracing::debug!(command = %pending.command, "command completed"),
            Err(err) => tracing::debug!(command = %pending.command, %err, "command failed"),
        }
        if pending.responder.send(result).is_err() {
            tracing::trace!(command = %pending.command, "caller stopped waiting");
        }
    }
}
