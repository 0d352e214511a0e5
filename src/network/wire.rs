//! Wire format. Every datagram is UTF-8 and is one of:
//! - the ping sentinel, matched byte for byte before anything else;
//! - a JSON object mapping endpoint name to `{addresses, exclusionGroup, owner}`;
//! - a claim intent `host,address`.

use crate::error::WireError;
use crate::registry::Snapshot;

pub const PING: &[u8] = b"bluebao:ping";

/// Default size ceiling for one encoded datagram.
pub const DEFAULT_MAX_DATAGRAM: usize = 8192;

/// "`host` wants `address`"; any other host owning that address lets go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimIntent {
    pub host: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Ping,
    Snapshot(Snapshot),
    Intent(ClaimIntent),
}

impl Message {
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes == PING {
            return Ok(Message::Ping);
        }

        let text = std::str::from_utf8(bytes)?.trim();
        if text.starts_with('{') {
            let snapshot: Snapshot = serde_json::from_str(text)?;
            if snapshot.keys().any(|name| name.is_empty()) {
                return Err(WireError::EmptyName);
            }
            return Ok(Message::Snapshot(snapshot));
        }

        if let Some((host, address)) = text.split_once(',')
            && !host.is_empty()
            && !address.is_empty()
            && !address.contains(',')
        {
            return Ok(Message::Intent(ClaimIntent {
                host: host.to_string(),
                address: address.to_string(),
            }));
        }

        Err(WireError::Unrecognised(text.chars().take(64).collect()))
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        match self {
            Message::Ping => Ok(PING.to_vec()),
            Message::Snapshot(snapshot) => Ok(serde_json::to_vec(snapshot)?),
            Message::Intent(intent) => Ok(format!("{},{}", intent.host, intent.address).into_bytes()),
        }
    }
}

/// Encodes `snapshot` as one or more partial snapshots, each at most `limit` bytes.
pub fn encode_snapshot(snapshot: &Snapshot, limit: usize) -> Result<Vec<Vec<u8>>, WireError> {
    let whole = serde_json::to_vec(snapshot)?;
    if whole.len() <= limit {
        return Ok(vec![whole]);
    }

    let mut datagrams = Vec::new();
    let mut current = Snapshot::new();
    let mut current_bytes = Vec::new();

    for (name, record) in snapshot {
        current.insert(name.clone(), record.clone());
        let candidate = serde_json::to_vec(&current)?;
        if candidate.len() <= limit {
            current_bytes = candidate;
            continue;
        }

        current.remove(name);
        if current.is_empty() {
            return Err(WireError::Oversize {
                name: name.clone(),
                limit,
            });
        }
        datagrams.push(std::mem::take(&mut current_bytes));

        current = Snapshot::from([(name.clone(), record.clone())]);
        current_bytes = serde_json::to_vec(&current)?;
        if current_bytes.len() > limit {
            return Err(WireError::Oversize {
                name: name.clone(),
                limit,
            });
        }
    }

    if !current.is_empty() {
        datagrams.push(current_bytes);
    }
    Ok(datagrams)
}
