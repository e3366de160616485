//! Core helpers shared by the calproxy crates: tracing setup and time parsing.

pub mod time;
pub mod tracing;

pub use time::{TimeParseError, parse_iso8601};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
