use std::fmt;

use crate::device::endpoint::Endpoint;
use crate::error::LinkError;
use crate::proximity::ProximityState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Error => "Connection error",
        };

        write!(f, "{}", result)
    }
}

/// A single distance measurement (centimeters) as sent by the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub distance: f64,
}

/// What observers of the connection manager receive on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub connection_state: ConnectionState,
    pub endpoint: Endpoint,
    pub reading: Option<Reading>,
    pub proximity: ProximityState,
}

/// Identifies one connection attempt. Every attempt gets a new, higher id, so that events from a
/// connection that has since been replaced can be recognized and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug)]
pub enum LinkEvent {
    Opened,
    Frame(Frame),
    // the remote end closed the stream
    Closed,
    Failed(LinkError),
}
