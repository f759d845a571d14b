//! Host software for a three-axis filament winder.
//!
//! - [`planner`] turns a wind definition into G-code.
//! - [`communication`] streams that G-code to a Marlin controller.

pub mod communication;
pub mod config;
pub mod planner;

pub use communication::{MarlinPort, PauseState, PortError, PortOptions, SerialPortInterface};
pub use planner::{DomainError, WindPlan, WinderMachine, plan_wind};
