//! Presentation capability. The core only registers endpoints and flips their
//! checked/enabled state; rendering belongs to the implementor.

pub mod console;

use std::str::FromStr;

use crate::device::AudioProfile;

/// Opaque reference to an endpoint's presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UiHandle(pub u64);

pub trait Presenter: Send + Sync {
    fn register_endpoint(&self, name: &str) -> UiHandle;
    fn set_checked(&self, handle: UiHandle, checked: bool);
    fn set_enabled(&self, handle: UiHandle, enabled: bool);
}

/// User input accepted by the console front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Toggle(String),
    Claim(String),
    Release(String),
    Profile(AudioProfile),
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };

        let named = |build: fn(String) -> Command| {
            if arg.is_empty() {
                Err(format!("`{}` needs an endpoint name", verb))
            } else {
                Ok(build(arg.to_string()))
            }
        };

        match verb.to_lowercase().as_str() {
            "list" | "ls" => Ok(Command::List),
            "toggle" => named(Command::Toggle),
            "claim" | "connect" => named(Command::Claim),
            "release" | "disconnect" => named(Command::Release),
            "profile" => arg.parse().map(Command::Profile),
            "quit" | "exit" => Ok(Command::Quit),
            "" => Err("empty command".to_string()),
            other => Err(format!("unknown command `{}`", other)),
        }
    }
}
