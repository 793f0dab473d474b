use serde::{Deserialize, Serialize};
use std::io;
use std::net::SocketAddr;

/// One direction-of-arrival sample as it travels through the relay.
///
/// Immutable once built; subscribers each receive their own clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(rename = "ts")]
    timestamp: String,
    #[serde(rename = "doa")]
    angle: f64,
}

impl Measurement {
    pub fn new(timestamp: impl Into<String>, angle: f64) -> Self {
        Self {
            timestamp: timestamp.into(),
            angle,
        }
    }

    /// Producer-assigned timestamp, carried verbatim.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Bearing in degrees, not normalised.
    pub fn angle(&self) -> f64 {
        self.angle
    }
}

/// Common error type for the relay and producer components.
#[derive(thiserror::Error, Debug)]
pub enum DoaError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("tls setup failed: {0}")]
    Tls(String),
    #[error("forwarder is shut down")]
    ForwarderClosed,
    #[error("forwarder drain timed out with {pending} item(s) pending")]
    DrainTimeout { pending: usize },
}

pub type DoaResult<T> = Result<T, DoaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_serializes_with_wire_field_names() {
        let m = Measurement::new("t0", 12.5);
        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["ts"], "t0");
        assert_eq!(value["doa"], 12.5);
    }
}
