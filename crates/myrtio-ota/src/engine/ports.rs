//! Interfaces the engine drives and the events it receives back.

use core::net::{IpAddr, SocketAddr};

use embassy_time::Duration;

use super::SessionId;
use crate::error::OtaError;

/// Outcome of starting a host name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Literal or cached address, available right away
    Ready(IpAddr),
    /// Result arrives later through [`TransportEvents::on_resolved`]
    Pending,
    Failed,
}

/// Transport used to download the image.
///
/// Every call is tagged with the session that owns the connection, events
/// are reported back with the same tag.
pub trait Network {
    /// Allocates the connection handle for a new session.
    fn open(&mut self, session: SessionId) -> Result<(), OtaError>;
    fn resolve(&mut self, session: SessionId, host: &str) -> Resolution;
    fn connect(&mut self, session: SessionId, remote: SocketAddr) -> Result<(), OtaError>;
    fn send(&mut self, session: SessionId, data: &[u8]) -> Result<(), OtaError>;
    /// Whether more data can still arrive on the connection.
    fn is_readable(&self, session: SessionId) -> bool;
    /// Closes the connection and frees its handle. Must be idempotent.
    fn disconnect(&mut self, session: SessionId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Connect,
    Receive,
}

/// One-shot timer, at most one deadline armed at a time.
pub trait TimerPort {
    /// Replaces any armed deadline.
    fn arm(&mut self, session: SessionId, kind: TimeoutKind, after: Duration);
    /// Idempotent.
    fn disarm(&mut self);
}

/// Persisted progress of the update, survives a warm reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpgradeFlag {
    Idle = 0,
    Started = 1,
    Finished = 2,
}

impl UpgradeFlag {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::Started),
            2 => Some(Self::Finished),
            _ => None,
        }
    }
}

pub trait UpgradeFlagStore {
    fn load(&mut self) -> UpgradeFlag;
    fn store(&mut self, flag: UpgradeFlag) -> Result<(), OtaError>;
}

/// Events delivered by the network and timer drivers.
pub trait TransportEvents {
    /// Host lookup finished, `None` when the name could not be resolved.
    fn on_resolved(&mut self, session: SessionId, address: Option<IpAddr>);
    fn on_connected(&mut self, session: SessionId);
    fn on_data(&mut self, session: SessionId, data: &[u8]);
    /// Peer closed the connection or the handle went away.
    fn on_disconnected(&mut self, session: SessionId);
    fn on_timeout(&mut self, session: SessionId, kind: TimeoutKind);
    /// Connect or send failed inside the transport.
    fn on_error(&mut self, session: SessionId);
}
