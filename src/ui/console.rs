//! Headless presenter. Keeps the menu state in memory, logs changes and reads
//! commands from stdin in place of tray clicks.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{Command, Presenter, UiHandle};

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    checked: bool,
    enabled: bool,
}

#[derive(Debug, Default)]
pub struct ConsolePresenter {
    next: AtomicU64,
    entries: Mutex<BTreeMap<u64, Entry>>,
}

impl ConsolePresenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entry(&self, handle: UiHandle, apply: impl FnOnce(&mut Entry)) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get_mut(&handle.0) {
            apply(entry);
        }
    }

    /// One line per endpoint: `[x] Name` when checked, `(busy)` while disabled.
    pub fn render(&self) -> String {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut rows: Vec<&Entry> = entries.values().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows.iter()
            .map(|entry| {
                format!(
                    "[{}] {}{}",
                    if entry.checked { "x" } else { " " },
                    entry.name,
                    if entry.enabled { "" } else { " (busy)" }
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Presenter for ConsolePresenter {
    fn register_endpoint(&self, name: &str) -> UiHandle {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id,
                Entry {
                    name: name.to_string(),
                    checked: false,
                    enabled: true,
                },
            );
        info!(endpoint = name, "endpoint available");
        UiHandle(id)
    }

    fn set_checked(&self, handle: UiHandle, checked: bool) {
        self.with_entry(handle, |entry| {
            if entry.checked != checked {
                info!(endpoint = %entry.name, checked, "endpoint toggled");
            }
            entry.checked = checked;
        });
    }

    fn set_enabled(&self, handle: UiHandle, enabled: bool) {
        self.with_entry(handle, |entry| entry.enabled = enabled);
    }
}

/// Forwards parsed stdin lines until EOF or the receiver goes away.
pub async fn read_commands(commands: mpsc::Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match line.parse::<Command>() {
                Ok(command) => {
                    if commands.send(command).await.is_err() {
                        return;
                    }
                }
                Err(e) => warn!("{}", e),
            },
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "failed to read console input");
                return;
            }
        }
    }
}
