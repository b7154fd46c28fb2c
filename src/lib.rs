//! YXC GW - bridges a Yamaha YXC network receiver into a control hub.
//!
//! The binary wires these modules together; tests drive them directly.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod drivers;
pub mod hub;
pub mod paths;
pub mod settings;
