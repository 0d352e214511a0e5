//! Exclusive sharing of Bluetooth audio devices between the hosts of a LAN.
//!
//! Every host keeps a registry of endpoints and who owns them, broadcasts it
//! over UDP whenever ownership changes and reconciles what its peers send.
//! A host that sees another host claim one of its endpoints disconnects.

pub mod config;
pub mod daemon;
pub mod device;
pub mod error;
pub mod network;
pub mod registry;
pub mod sync;
pub mod ui;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use error::{Error, Result};
