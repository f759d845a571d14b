// src/communication/mod.rs - Talking to the winder controller

pub mod marlin;
pub mod serial;

pub use marlin::{MarlinPort, PauseState, PortError, PortOptions, PortStats};
pub use serial::{SerialPortInterface, available_ports};
