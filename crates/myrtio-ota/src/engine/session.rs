use core::net::SocketAddr;

use super::{OtaState, SessionId, UpdateCallback};
use crate::error::OtaError;
use crate::flash::FlashWriteStream;
use crate::http::HeaderAccumulator;

/// State of the one update in flight.
pub(super) struct UpgradeSession {
    pub(super) id: SessionId,
    pub(super) callback: UpdateCallback,
    /// Cleared once the transport is closed, later disconnect events for
    /// this session are ignored
    pub(super) transport_open: bool,
    pub(super) remote: Option<SocketAddr>,
    pub(super) state: OtaState,
    pub(super) stream: FlashWriteStream,
    pub(super) header: HeaderAccumulator,
    pub(super) slot: u8,
    pub(super) capacity: u32,
    pub(super) received: u32,
    /// Zero until the response header is parsed
    pub(super) expected: u32,
    pub(super) error: Option<OtaError>,
}

impl UpgradeSession {
    pub(super) fn new(
        id: SessionId,
        callback: UpdateCallback,
        stream: FlashWriteStream,
        slot: u8,
        capacity: u32,
    ) -> Self {
        Self {
            id,
            callback,
            transport_open: true,
            remote: None,
            state: OtaState::Resolving,
            stream,
            header: HeaderAccumulator::new(),
            slot,
            capacity,
            received: 0,
            expected: 0,
            error: None,
        }
    }

    pub(super) fn is_complete(&self) -> bool {
        self.expected > 0 && self.received == self.expected
    }

    /// Keeps the first failure cause.
    pub(super) fn fail(&mut self, error: OtaError) {
        self.error.get_or_insert(error);
    }
}
