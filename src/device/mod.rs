//! External collaborators: the Bluetooth device controller and the audio
//! router. Both are traits so the ownership core never shells out directly.

mod bluetoothctl;
mod discovery;
mod pactl;

use std::str::FromStr;

use async_trait::async_trait;
use tracing::debug;

use crate::error::DeviceError;

pub use bluetoothctl::BluetoothCtl;
pub use discovery::{DiscoveredEndpoint, discover_endpoints};
pub use pactl::Pactl;

/// A device known to the local Bluetooth stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedDevice {
    pub address: String,
    pub display_name: String,
    pub audio_capable: bool,
    pub connected: bool,
}

#[async_trait]
pub trait DeviceController: Send + Sync {
    async fn connect(&self, address: &str) -> Result<(), DeviceError>;
    async fn disconnect(&self, address: &str) -> Result<(), DeviceError>;
    async fn power_on(&self) -> Result<(), DeviceError>;
    async fn list_paired_devices(&self) -> Result<Vec<PairedDevice>, DeviceError>;
}

#[async_trait]
pub trait AudioRouter: Send + Sync {
    /// Makes the first sink whose name contains `criterion` the default output.
    async fn set_default_sink(&self, criterion: &str) -> Result<(), DeviceError>;
    async fn set_profile(&self, card_match: &str, profile: AudioProfile)
    -> Result<(), DeviceError>;
}

/// Bluetooth audio card profiles offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioProfile {
    /// A2DP, playback only
    HighQuality,
    /// HSP/HFP, playback plus microphone
    Headset,
}

impl AudioProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioProfile::HighQuality => "a2dp-sink",
            AudioProfile::Headset => "headset-head-unit",
        }
    }
}

impl std::fmt::Display for AudioProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AudioProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hq" | "a2dp" | "a2dp-sink" => Ok(AudioProfile::HighQuality),
            "headset" | "hsp" | "headset-head-unit" => Ok(AudioProfile::Headset),
            other => Err(format!("unknown audio profile `{}` (use hq or headset)", other)),
        }
    }
}

/// Runs a command to completion and returns its stdout, failing on a non-zero exit.
pub(crate) async fn run(program: &str, args: &[&str]) -> Result<String, DeviceError> {
    debug!(program, ?args, "running");
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|source| DeviceError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    debug!(program, status = %output.status, stdout = %stdout.trim_end(), "finished");

    if !output.status.success() {
        return Err(DeviceError::Failed {
            program: program.to_string(),
            args: args.join(" "),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(stdout)
}
