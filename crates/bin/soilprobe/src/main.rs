//! # soilprobe — soil probe command-line client
//!
//! Composition root that wires the BLE adapter to the command session and
//! prints results.
//!
//! ## Responsibilities
//! - Parse configuration (CLI args, env vars, config file)
//! - Initialize tracing (stderr, so stdout carries only results)
//! - Scan for and connect to the probe
//! - Spawn the session driver and issue one command through it
//! - Render the outcome as text or JSON
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no protocol logic belongs here.

mod config;
mod render;

use std::io::Read as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::EnvFilter;

use soilprobe_app::driver::{ProbeClient, SessionDriver};
use soilprobe_app::session::CommandSession;
use soilprobe_domain::calibration;
use soilprobe_domain::error::FrameError;
use soilprobe_domain::frame::{FrameBuffer, RawMessage};
use soilprobe_domain::parser::RecoveryParser;
use soilprobe_domain::sensor::SensorRegistry;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "soilprobe")]
#[command(about = "Read calibrated measurements from a BLE soil probe")]
struct Cli {
    /// Path to the configuration file (defaults to ./soilprobe.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read and calibrate all sensor values
    Measure,
    /// Show device identification
    Info,
    /// List the sensors attached to the probe
    Sensors,
    /// Write device parameters (JSON object)
    Configure {
        /// Parameters, e.g. '{"interval":60}'
        payload: String,
    },
    /// Reset the probe to factory settings
    Restore,
    /// Decode a captured reply without a device ("-" reads stdin)
    Parse {
        /// File holding the raw reply bytes
        input: PathBuf,
    },
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("soilprobe=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_logging(&config.logging.filter);

    let registry = config.registry();

    match cli.command {
        Command::Parse { input } => parse_offline(&input, &config, &registry, cli.json),
        command => run_online(command, &config, registry, cli.json).await,
    }
}

/// Run a captured reply through framing, recovery parsing and calibration.
fn parse_offline(
    input: &std::path::Path,
    config: &Config,
    registry: &SensorRegistry,
    json: bool,
) -> anyhow::Result<()> {
    let bytes = if input.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?
    };

    let message = frame_capture(&bytes, config.session.max_frame_bytes)?;
    let parser = RecoveryParser::new(config.session.positional_order.clone());
    let (strategy, raw) = parser.parse_with_strategy(&message)?;
    tracing::info!(strategy = strategy.name(), "reply decoded");

    let set = calibration::calibrate(&raw, registry)?;
    if json {
        println!("{}", render::readings_json(&set, chrono::Utc::now())?);
    } else {
        print!("{}", render::readings_text(&set));
    }
    Ok(())
}

/// Frame a saved reply. Blank lines left after the terminator by an editor
/// are ignored; a capture without any terminator is decoded whole.
fn frame_capture(bytes: &[u8], max_frame_bytes: usize) -> Result<RawMessage, FrameError> {
    let mut capture = bytes.trim_ascii_end().to_vec();
    capture.extend_from_slice(b"\r\n");

    let mut frames = FrameBuffer::new(max_frame_bytes);
    match frames.feed(&capture)? {
        Some(message) => Ok(message),
        None => {
            tracing::debug!("capture has no terminator, decoding it whole");
            Ok(RawMessage::new(String::from_utf8_lossy(bytes)))
        }
    }
}

async fn run_online(
    command: Command,
    config: &Config,
    registry: SensorRegistry,
    json: bool,
) -> anyhow::Result<()> {
    let (transport, events) = soilprobe_adapter_ble::connect(&config.ble)
        .await
        .context("failed to connect to soil probe")?;
    let transport = Arc::new(transport);

    let session = CommandSession::new(&config.session, registry);
    let (client, driver) = SessionDriver::spawn(session, Arc::clone(&transport), events);

    let result = execute(&client, command, json).await;

    drop(client);
    if let Err(err) = driver.await {
        tracing::warn!(%err, "session driver panicked");
    }
    if let Ok(transport) = Arc::try_unwrap(transport) {
        transport.disconnect().await;
    }

    result
}

async fn execute(client: &ProbeClient, command: Command, json: bool) -> anyhow::Result<()> {
    let now = chrono::Utc::now();
    match command {
        Command::Measure => {
            let set = client.measure().await.context("measurement failed")?;
            if json {
                println!("{}", render::readings_json(&set, now)?);
            } else {
                print!("{}", render::readings_text(&set));
            }
        }
        Command::Info | Command::Sensors => {
            let fields = if matches!(command, Command::Info) {
                client.device_info().await
            } else {
                client.sensor_list().await
            }
            .context("query failed")?;
            if json {
                println!("{}", render::fields_json(&fields, now)?);
            } else {
                print!("{}", render::fields_text(&fields));
            }
        }
        Command::Configure { payload } => {
            let payload: serde_json::Value =
                serde_json::from_str(&payload).context("configure payload is not valid JSON")?;
            let reply = client
                .configure(payload)
                .await
                .context("configuration failed")?;
            print_ack(&reply, now, json)?;
        }
        Command::Restore => {
            let reply = client
                .restore_factory()
                .await
                .context("factory reset failed")?;
            print_ack(&reply, now, json)?;
        }
        Command::Parse { .. } => anyhow::bail!("parse runs offline, without a probe"),
    }
    Ok(())
}

fn print_ack(reply: &str, now: chrono::DateTime<chrono::Utc>, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", render::ack_json(reply, now)?);
    } else if reply.is_empty() {
        println!("ok");
    } else {
        println!("{reply}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use soilprobe_domain::frame::DEFAULT_MAX_FRAME_BYTES;

    #[test]
    fn should_frame_capture_saved_with_trailing_newline() {
        let message = frame_capture(b"24300.0,87\r\nok\r\n\n", DEFAULT_MAX_FRAME_BYTES).unwrap();
        assert_eq!(message.body(), "24300.0,87");
    }

    #[test]
    fn should_frame_capture_ending_exactly_at_terminator() {
        let message = frame_capture(b"4102:24300.0\r\nOK\r\n", DEFAULT_MAX_FRAME_BYTES).unwrap();
        assert_eq!(message.body(), "4102:24300.0");
    }

    #[test]
    fn should_decode_unterminated_capture_whole() {
        let message = frame_capture(b"4102:24300.0\n", DEFAULT_MAX_FRAME_BYTES).unwrap();
        assert_eq!(message.text(), "4102:24300.0\n");
        assert_eq!(message.body(), "4102:24300.0");
    }

    #[test]
    fn should_reject_capture_longer_than_frame_limit() {
        let err = frame_capture(&[b'9'; 64], 16).unwrap_err();
        assert!(matches!(err, FrameError::Overflow { .. }));
    }
}
