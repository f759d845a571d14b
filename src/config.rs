//! # Host Configuration
//!
//! Optional TOML file passed with `--config`. Every section and key has a
//! default, so an empty file (or no file) is a valid configuration.
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud = 115200
//! write_timeout_ms = 1000
//!
//! [planner]
//! verbose = false
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Command-line flags override the file.

// src/config.rs - Single configuration file
pub use winder_shared::config::*;
