//! # soilprobe-app
//!
//! Application layer — the command session and **port definitions**
//! (traits).
//!
//! ## Responsibilities
//! - Define the [`Transport`](ports::Transport) port adapters implement
//!   (BLE, in-memory fakes, …)
//! - Correlate one outstanding AT command with its reply
//!   ([`session::CommandSession`]): `Busy`/`NotConnected` rejection,
//!   deadlines, stale-reply discarding
//! - Run the session on a single task ([`driver::SessionDriver`]) and hand
//!   callers a cloneable [`driver::ProbeClient`]
//!
//! ## Dependency rule
//! Depends on `soilprobe-domain` only (plus `tokio` for channels and
//! timers). Never imports adapter crates.

pub mod config;
pub mod driver;
pub mod ports;
pub mod session;
