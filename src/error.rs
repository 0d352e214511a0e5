//! Error types. Actuation, wire decoding and transport failures are kept apart
//! so callers can tell a recoverable per-datagram problem from a fatal one.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::sync::Operation;

/// Failure reported by an external device or audio collaborator.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{program} {args}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        args: String,
        status: String,
        stderr: String,
    },
    #[error("no entry matching `{0}`")]
    NotFound(String),
    #[error("unexpected output: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("datagram is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot contains an endpoint with an empty name")]
    EmptyName,
    #[error("unrecognised message: {0:?}")]
    Unrecognised(String),
    #[error("endpoint `{name}` does not fit in a {limit} byte datagram")]
    Oversize { name: String, limit: usize },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("send to {target} failed: {source}")]
    Send {
        target: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("receive failed: {0}")]
    Recv(#[source] io::Error),
    #[error(transparent)]
    Wire(#[from] WireError),
}

#[derive(Debug, Error)]
pub enum ActuationError {
    #[error("{operation} {address} failed after {attempts} attempts: {last}")]
    Exhausted {
        operation: Operation,
        address: String,
        attempts: u32,
        #[source]
        last: DeviceError,
    },
    #[error("endpoint `{0}` has no known addresses")]
    NoAddresses(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Actuation(#[from] ActuationError),
    #[error("failed to read seed file {path}: {source}")]
    Seed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unknown endpoint `{0}`")]
    UnknownEndpoint(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
