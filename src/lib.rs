//! Concurrent load generator for the ticket booking service.
//!
//! Drives a fixed pool of virtual users against either the `/book/safe` or
//! `/book/unsafe` endpoint and tallies how many bookings were accepted,
//! rejected or answered with something unexpected.

pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod session;
pub mod telemetry;
