//! InfluxDB 1.x client layer.
//!
//! Implements the export pipeline's query-executor capability against the
//! InfluxDB 1.x HTTP API.

pub mod client;

pub use client::InfluxClient;
