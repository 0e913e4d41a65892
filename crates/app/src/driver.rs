//! Runs a [`CommandSession`] on a single task.
//!
//! The task owns the session and the transport. Callers talk to it through
//! a cloneable [`ProbeClient`]; transport events arrive on a channel fed by
//! the adapter. Requests, events and the reply deadline are multiplexed
//! with `tokio::select!`, so session state is never shared across tasks.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use soilprobe_domain::command::AtCommand;
use soilprobe_domain::reading::{RawReading, ReadingSet};

use crate::ports::{Transport, TransportEvent};
use crate::session::{CommandSession, Reply, ReplyReceiver, SessionError};

const REQUEST_CAPACITY: usize = 8;

#[derive(Debug)]
struct Request {
    command: AtCommand,
    accepted: oneshot::Sender<Result<ReplyReceiver, SessionError>>,
}

/// Owns the session and transport for the lifetime of a probe link.
pub struct SessionDriver<T> {
    session: CommandSession,
    transport: T,
    requests: mpsc::Receiver<Request>,
    events: mpsc::Receiver<TransportEvent>,
}

impl<T: Transport + 'static> SessionDriver<T> {
    /// Spawn the driver task.
    ///
    /// The task stops once every [`ProbeClient`] clone is dropped.
    pub fn spawn(
        session: CommandSession,
        transport: T,
        events: mpsc::Receiver<TransportEvent>,
    ) -> (ProbeClient, JoinHandle<()>) {
        let (tx, requests) = mpsc::channel(REQUEST_CAPACITY);
        let driver = Self {
            session,
            transport,
            requests,
            events,
        };
        (ProbeClient { requests: tx }, tokio::spawn(driver.run()))
    }

    async fn run(mut self) {
        if self.transport.is_connected() && !self.session.is_connected() {
            self.session.on_connected();
        }

        let mut events_open = true;
        loop {
            let deadline = self.session.deadline();
            // Link traffic first: a reply already on the channel belongs to
            // the current command, not to the next request.
            tokio::select! {
                biased;

                event = self.events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        tracing::debug!("transport event channel closed");
                        events_open = false;
                        self.session.on_disconnected();
                    }
                },
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() =>
                {
                    self.session.expire(Instant::now());
                }
                request = self.requests.recv() => match request {
                    Some(request) => self.handle_request(request).await,
                    None => break,
                },
            }
        }

        tracing::debug!("session driver stopped");
    }

    async fn handle_request(&mut self, request: Request) {
        let Request { command, accepted } = request;

        let issued = match self.session.issue(command, Instant::now()) {
            Ok(issued) => issued,
            Err(err) => {
                let _ = accepted.send(Err(err));
                return;
            }
        };

        if let Err(err) = self.transport.write(&issued.wire).await {
            self.session.on_write_failed(err);
        }

        let _ = accepted.send(Ok(issued.reply));
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => self.session.on_connected(),
            TransportEvent::Fragment(bytes) => {
                tracing::trace!(len = bytes.len(), "fragment received");
                self.session.on_fragment(&bytes);
            }
            TransportEvent::Disconnected => self.session.on_disconnected(),
        }
    }
}

/// Handle for issuing commands to a running [`SessionDriver`].
#[derive(Debug, Clone)]
pub struct ProbeClient {
    requests: mpsc::Sender<Request>,
}

impl ProbeClient {
    /// Send any command and wait for its outcome.
    ///
    /// # Errors
    ///
    /// Any [`SessionError`]; [`SessionError::Closed`] when the driver task
    /// has stopped.
    pub async fn send(&self, command: AtCommand) -> Result<Reply, SessionError> {
        let (accepted, accepted_rx) = oneshot::channel();
        self.requests
            .send(Request { command, accepted })
            .await
            .map_err(|_| SessionError::Closed)?;

        let reply = accepted_rx.await.map_err(|_| SessionError::Closed)??;
        reply.await.map_err(|_| SessionError::Closed)?
    }

    /// Read and calibrate all sensor values.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn measure(&self) -> Result<ReadingSet, SessionError> {
        match self.send(AtCommand::measure()).await? {
            Reply::Readings(set) => Ok(set),
            _ => Err(SessionError::UnexpectedReply),
        }
    }

    /// Query device identification fields.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn device_info(&self) -> Result<RawReading, SessionError> {
        self.query(AtCommand::device_info()).await
    }

    /// Query the sensors attached to the probe.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn sensor_list(&self) -> Result<RawReading, SessionError> {
        self.query(AtCommand::sensor_list()).await
    }

    /// Write device parameters; returns the reply body.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn configure(&self, config: serde_json::Value) -> Result<String, SessionError> {
        self.ack(AtCommand::configure(config)).await
    }

    /// Reset the probe to factory settings.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn restore_factory(&self) -> Result<String, SessionError> {
        self.ack(AtCommand::restore_factory()).await
    }

    async fn query(&self, command: AtCommand) -> Result<RawReading, SessionError> {
        match self.send(command).await? {
            Reply::Fields(fields) => Ok(fields),
            _ => Err(SessionError::UnexpectedReply),
        }
    }

    async fn ack(&self, command: AtCommand) -> Result<String, SessionError> {
        match self.send(command).await? {
            Reply::Ack(body) => Ok(body),
            _ => Err(SessionError::UnexpectedReply),
        }
    }
}
