//! # soilprobe-domain
//!
//! Pure domain model for talking to AT-command soil sensors.
//!
//! ## Responsibilities
//! - Frame transport fragments into complete device replies ([`frame`])
//! - Encode AT commands for the wire ([`command`])
//! - Recover key/value pairs from malformed replies ([`parser`])
//! - Describe the known sensor parameters ([`sensor`])
//! - Turn raw values into calibrated, labeled readings ([`calibration`])
//! - Chain parser and calibration for measurement replies ([`pipeline`])
//!
//! ## Dependency rule
//! This crate has **no internal dependencies** and performs no IO.
//! Transport and session concerns live in the `app` crate (ports).

pub mod error;

pub mod calibration;
pub mod command;
pub mod frame;
pub mod parser;
pub mod pipeline;
pub mod reading;
pub mod sensor;
