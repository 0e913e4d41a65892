//! Driver-level tests: a scripted in-memory transport stands in for the
//! BLE link, and time is paused so deadlines elapse instantly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use soilprobe_app::config::SessionConfig;
use soilprobe_app::driver::{ProbeClient, SessionDriver};
use soilprobe_app::ports::{Transport, TransportError, TransportEvent};
use soilprobe_app::session::{CommandSession, SessionError};
use soilprobe_domain::sensor::SensorRegistry;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Records every write and lets the test decide what the probe answers.
struct FakeTransport {
    connected: AtomicBool,
    fail_writes: AtomicBool,
    written: mpsc::UnboundedSender<Vec<u8>>,
}

impl Transport for FakeTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Write(Box::new(std::io::Error::other(
                "gatt write rejected",
            ))));
        }
        let _ = self.written.send(bytes.to_vec());
        Ok(())
    }
}

struct Harness {
    client: ProbeClient,
    transport: Arc<FakeTransport>,
    events: mpsc::Sender<TransportEvent>,
    written: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Harness {
    fn start() -> Self {
        let (written_tx, written) = mpsc::unbounded_channel();
        let transport = Arc::new(FakeTransport {
            connected: AtomicBool::new(true),
            fail_writes: AtomicBool::new(false),
            written: written_tx,
        });
        let (events, events_rx) = mpsc::channel(16);
        let session = CommandSession::new(&SessionConfig::default(), SensorRegistry::standard());
        let (client, _handle) = SessionDriver::spawn(session, Arc::clone(&transport), events_rx);
        Self {
            client,
            transport,
            events,
            written,
        }
    }

    async fn next_write(&mut self) -> String {
        let bytes = self.written.recv().await.expect("a command should be written");
        String::from_utf8(bytes).unwrap()
    }

    async fn reply(&self, fragments: &[&[u8]]) {
        for fragment in fragments {
            self.events
                .send(TransportEvent::Fragment(fragment.to_vec()))
                .await
                .unwrap();
        }
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn should_measure_from_fragmented_json_reply() {
    let mut harness = Harness::start();
    let client = harness.client.clone();
    let pending = tokio::spawn(async move { client.measure().await });

    assert_eq!(harness.next_write().await, "AT+MEA=?\r\n");
    harness
        .reply(&[
            b"{\"4102\":\"24300.0\",\"41",
            b"08\":\"O.00\",\"4110\":\"O.0\"}\r",
            b"\nok\r\n",
        ])
        .await;

    let set = pending.await.unwrap().unwrap();
    assert_eq!(set.values(), [Some(24.3), None, None]);
    assert_eq!(
        set.labels(),
        ["Soil moisture (%)", "Soil conductivity (μS/cm)", "Soil pH (pH)"]
    );
}

#[tokio::test(start_paused = true)]
async fn should_measure_from_mixed_separator_reply() {
    let mut harness = Harness::start();
    let client = harness.client.clone();
    let pending = tokio::spawn(async move { client.measure().await });

    harness.next_write().await;
    harness.reply(&[b"4102:24300.0,4104=87\r\nok\r\n"]).await;

    let set = pending.await.unwrap().unwrap();
    assert_eq!(set.get("4102").unwrap().value, Some(24.3));
    assert_eq!(set.get("4104").unwrap().value, Some(87.0));
}

#[tokio::test(start_paused = true)]
async fn should_return_device_info_fields() {
    let mut harness = Harness::start();
    let client = harness.client.clone();
    let pending = tokio::spawn(async move { client.device_info().await });

    assert_eq!(harness.next_write().await, "AT+INFO=?\r\n");
    harness
        .reply(&[b"{\"model\":\"SP-5\",\"fw\":\"2.1\"}\r\nOK\r\n"])
        .await;

    let fields = pending.await.unwrap().unwrap();
    assert_eq!(fields.get("model"), Some("SP-5"));
    assert_eq!(fields.get("fw"), Some("2.1"));
}

#[tokio::test(start_paused = true)]
async fn should_write_configuration_payload_and_return_ack() {
    let mut harness = Harness::start();
    let client = harness.client.clone();
    let pending =
        tokio::spawn(async move { client.configure(serde_json::json!({"interval": 60})).await });

    assert_eq!(harness.next_write().await, "AT+CONFIG={\"interval\":60}\r\n");
    harness.reply(&[b"\r\nok\r\n"]).await;

    assert_eq!(pending.await.unwrap().unwrap(), "");
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn should_time_out_then_accept_next_command() {
    let mut harness = Harness::start();
    let started = Instant::now();

    let client = harness.client.clone();
    let pending = tokio::spawn(async move { client.measure().await });
    harness.next_write().await;
    harness.reply(&[b"{\"4102\":\"243"]).await;

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::Timeout { .. }));
    assert!(started.elapsed() >= Duration::from_secs(5));

    let client = harness.client.clone();
    let pending = tokio::spawn(async move { client.measure().await });
    harness.next_write().await;
    harness.reply(&[b"4104=87\r\nok\r\n"]).await;
    assert_eq!(pending.await.unwrap().unwrap().values(), [Some(87.0)]);
}

#[tokio::test(start_paused = true)]
async fn should_discard_reply_arriving_after_timeout() {
    let mut harness = Harness::start();

    let client = harness.client.clone();
    let pending = tokio::spawn(async move { client.measure().await });
    harness.next_write().await;
    assert!(matches!(
        pending.await.unwrap(),
        Err(SessionError::Timeout { .. })
    ));

    harness.reply(&[b"4104=87\r\nok\r\n"]).await;

    let client = harness.client.clone();
    let pending = tokio::spawn(async move { client.measure().await });
    harness.next_write().await;
    harness.reply(&[b"4102=24300\r\nok\r\n"]).await;
    let set = pending.await.unwrap().unwrap();
    assert_eq!(set.labels(), ["Soil moisture (%)"]);
}

#[tokio::test(start_paused = true)]
async fn should_reject_second_command_while_first_is_pending() {
    let mut harness = Harness::start();

    let client = harness.client.clone();
    let first = tokio::spawn(async move { client.measure().await });
    harness.next_write().await;

    let err = harness.client.device_info().await.unwrap_err();
    assert!(matches!(err, SessionError::Busy));

    harness.reply(&[b"4104=87\r\nok\r\n"]).await;
    assert!(first.await.unwrap().is_ok());
    assert!(harness.written.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn should_fail_pending_command_on_disconnect() {
    let mut harness = Harness::start();

    let client = harness.client.clone();
    let pending = tokio::spawn(async move { client.measure().await });
    harness.next_write().await;
    harness
        .events
        .send(TransportEvent::Disconnected)
        .await
        .unwrap();

    assert!(matches!(
        pending.await.unwrap(),
        Err(SessionError::Disconnected)
    ));
    assert!(matches!(
        harness.client.measure().await,
        Err(SessionError::NotConnected)
    ));

    harness.events.send(TransportEvent::Connected).await.unwrap();
    let client = harness.client.clone();
    let pending = tokio::spawn(async move { client.measure().await });
    harness.next_write().await;
    harness.reply(&[b"4104=87\r\nok\r\n"]).await;
    assert!(pending.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn should_report_write_failure() {
    let harness = Harness::start();
    harness.transport.fail_writes.store(true, Ordering::SeqCst);

    let err = harness.client.measure().await.unwrap_err();
    assert!(matches!(err, SessionError::Transport(TransportError::Write(_))));

    harness.transport.fail_writes.store(false, Ordering::SeqCst);
    let err = harness.client.restore_factory().await.unwrap_err();
    assert!(matches!(err, SessionError::Timeout { .. }));
}

#[tokio::test(start_paused = true)]
async fn should_treat_closed_event_channel_as_disconnect() {
    let Harness {
        client,
        events,
        written: _written,
        transport: _transport,
    } = Harness::start();
    drop(events);

    assert!(matches!(
        client.measure().await,
        Err(SessionError::NotConnected)
    ));
}

#[tokio::test(start_paused = true)]
async fn should_surface_malformed_reply() {
    let mut harness = Harness::start();
    let client = harness.client.clone();
    let pending = tokio::spawn(async move { client.measure().await });

    harness.next_write().await;
    harness.reply(&[b"busy\r\nok\r\n"]).await;

    assert!(matches!(
        pending.await.unwrap(),
        Err(SessionError::Probe(_))
    ));
}
