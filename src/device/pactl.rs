//! PulseAudio/PipeWire routing through `pactl`. Sinks appear a moment after a
//! Bluetooth connect, so lookups poll for a bounded number of attempts.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use super::{AudioProfile, AudioRouter, run};
use crate::error::DeviceError;

#[derive(Debug, Deserialize)]
struct ShortEntry {
    name: String,
}

pub struct Pactl {
    program: String,
    attempts: u32,
    delay: Duration,
}

impl Pactl {
    pub fn new() -> Self {
        Self {
            program: "pactl".to_string(),
            attempts: 20,
            delay: Duration::from_millis(200),
        }
    }

    /// First entry name in `pactl -f json list short ...` output containing `criterion`.
    fn match_entry(json: &str, criterion: &str) -> Result<Option<String>, DeviceError> {
        let entries: Vec<ShortEntry> =
            serde_json::from_str(json).map_err(|e| DeviceError::Parse(e.to_string()))?;
        Ok(entries
            .into_iter()
            .map(|entry| entry.name)
            .find(|name| name.contains(criterion)))
    }

    /// `kind` is `sinks` or `cards`.
    async fn find(&self, criterion: &str, kind: &str) -> Result<String, DeviceError> {
        for attempt in 1..=self.attempts {
            match run(&self.program, &["-f", "json", "list", "short", kind]).await {
                Ok(json) => match Self::match_entry(&json, criterion) {
                    Ok(Some(name)) => return Ok(name),
                    Ok(None) => {}
                    Err(e) => warn!(attempt, error = %e, "failed to parse pactl output"),
                },
                Err(e) => warn!(attempt, error = %e, "failed to list {}", kind),
            }
            tokio::time::sleep(self.delay).await;
        }
        Err(DeviceError::NotFound(criterion.to_string()))
    }
}

impl Default for Pactl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioRouter for Pactl {
    async fn set_default_sink(&self, criterion: &str) -> Result<(), DeviceError> {
        let sink = self.find(criterion, "sinks").await?;
        run(&self.program, &["set-default-sink", &sink]).await?;
        info!(sink, "default audio output set");
        Ok(())
    }

    async fn set_profile(
        &self,
        card_match: &str,
        profile: AudioProfile,
    ) -> Result<(), DeviceError> {
        let card = self.find(card_match, "cards").await?;
        run(&self.program, &["set-card-profile", &card, profile.as_str()]).await?;
        info!(card, %profile, "audio profile set");
        Ok(())
    }
}
