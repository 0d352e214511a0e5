//! `bluetoothctl` adapter. Each operation is one non-interactive invocation;
//! the exit status decides success.

use async_trait::async_trait;
use tracing::warn;

use super::{DeviceController, PairedDevice, run};
use crate::error::DeviceError;

pub struct BluetoothCtl {
    program: String,
}

impl BluetoothCtl {
    pub fn new() -> Self {
        Self {
            program: "bluetoothctl".to_string(),
        }
    }

    /// Parse `bluetoothctl devices` output: `Device <mac> <name with spaces>`.
    fn parse_devices(output: &str) -> Vec<(String, String)> {
        output
            .lines()
            .filter_map(|line| {
                let mut parts = line.trim().splitn(3, ' ');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some("Device"), Some(mac), Some(name)) if !name.trim().is_empty() => {
                        Some((mac.to_string(), name.trim().to_string()))
                    }
                    _ => None,
                }
            })
            .collect()
    }

    /// Returns `(audio_capable, connected)` from `bluetoothctl info <mac>` output.
    fn parse_info(output: &str) -> (bool, bool) {
        let audio = output.lines().any(|line| line.contains("Audio"));
        let connected = output
            .lines()
            .any(|line| line.trim() == "Connected: yes");
        (audio, connected)
    }
}

impl Default for BluetoothCtl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceController for BluetoothCtl {
    async fn connect(&self, address: &str) -> Result<(), DeviceError> {
        run(&self.program, &["connect", address]).await.map(|_| ())
    }

    async fn disconnect(&self, address: &str) -> Result<(), DeviceError> {
        run(&self.program, &["disconnect", address]).await.map(|_| ())
    }

    async fn power_on(&self) -> Result<(), DeviceError> {
        run(&self.program, &["power", "on"]).await.map(|_| ())
    }

    async fn list_paired_devices(&self) -> Result<Vec<PairedDevice>, DeviceError> {
        let listing = run(&self.program, &["devices"]).await?;
        let mut devices = Vec::new();
        for (address, display_name) in Self::parse_devices(&listing) {
            // a stale pairing fails `info`; the rest are still usable
            let info = match run(&self.program, &["info", &address]).await {
                Ok(info) => info,
                Err(e) => {
                    warn!(address, error = %e, "skipping paired device");
                    continue;
                }
            };
            let (audio_capable, connected) = Self::parse_info(&info);
            devices.push(PairedDevice {
                address,
                display_name,
                audio_capable,
                connected,
            });
        }
        Ok(devices)
    }
}
