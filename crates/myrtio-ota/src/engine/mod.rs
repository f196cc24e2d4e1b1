//! OTA download state machine.
//!
//! The engine resolves the update host, requests the image for the inactive
//! slot, streams the response body into flash and reports the result through
//! a callback. It never touches the boot configuration on its own, flipping
//! the active slot is left to the callback.

pub mod ports;
mod session;

use core::net::{IpAddr, SocketAddr};

use embedded_storage::nor_flash::NorFlash;

use self::ports::{
    Network, Resolution, TimeoutKind, TimerPort, TransportEvents, UpgradeFlag, UpgradeFlagStore,
};
use self::session::UpgradeSession;
use crate::boot::BootConfigStore;
use crate::config::{FlashLayout, OtaConfig};
use crate::error::OtaError;
use crate::flash::FlashWriteStream;
use crate::http::{HeaderProgress, build_request};

/// Completion callback, `(success, updated_slot)`.
pub type UpdateCallback = fn(bool, u8);

/// Generation number of an update session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SessionId(u32);

impl SessionId {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaState {
    Idle,
    Resolving,
    Connecting,
    AwaitingConnect,
    Requesting,
    ReceivingHeader,
    ReceivingBody,
    Finishing,
}

/// Owner of the single update session.
pub struct OtaEngine<N, T, F, U> {
    network: N,
    timer: T,
    flash: F,
    flag: U,
    config: OtaConfig,
    layout: FlashLayout,
    session: Option<UpgradeSession>,
    next_id: u32,
    last_error: Option<OtaError>,
}

impl<N, T, F, U> OtaEngine<N, T, F, U>
where
    N: Network,
    T: TimerPort,
    F: NorFlash,
    U: UpgradeFlagStore,
{
    pub fn new(network: N, timer: T, flash: F, flag: U, config: OtaConfig, layout: FlashLayout) -> Self {
        Self {
            network,
            timer,
            flash,
            flag,
            config,
            layout,
            session: None,
            next_id: 1,
            last_error: None,
        }
    }

    /// Starts downloading the image for the inactive slot.
    ///
    /// Returns once the host lookup is issued. When the address is known
    /// right away the connect step runs before returning, so the callback may
    /// already have fired. Nothing is left allocated on error.
    pub fn activate(&mut self, callback: UpdateCallback) -> Result<SessionId, OtaError> {
        // A `Finished` flag only means the last download succeeded
        if self.session.is_some() || self.flag.load() == UpgradeFlag::Started {
            log::warn!("ota: update already in progress");
            return Err(OtaError::ConcurrentUpdateRejected);
        }

        let id = SessionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);

        self.network.open(id)?;
        let session = match self.prepare_session(id, callback) {
            Ok(session) => session,
            Err(error) => {
                self.network.disconnect(id);
                self.last_error = Some(error);
                return Err(error);
            }
        };
        log::info!(
            "ota: session {} writing slot {} at {:#x}",
            id.0,
            session.slot,
            session.stream.address()
        );
        self.session = Some(session);

        match self.network.resolve(id, self.config.host) {
            Resolution::Ready(address) => self.on_resolved(id, Some(address)),
            Resolution::Pending => {}
            Resolution::Failed => {
                log::error!("ota: failed to resolve {}", self.config.host);
                self.session = None;
                self.network.disconnect(id);
                self.reset_flag();
                self.last_error = Some(OtaError::ResolutionFailure);
                return Err(OtaError::ResolutionFailure);
            }
        }
        Ok(id)
    }

    /// Ends the current session right away. No-op when idle.
    pub fn deactivate(&mut self) {
        if self.session.is_some() {
            log::info!("ota: deactivated");
            self.finish();
        }
    }

    /// Clears a flag left behind by an update interrupted by a reset.
    ///
    /// Returns the flag as it was found.
    pub fn recover_after_reset(&mut self) -> UpgradeFlag {
        let flag = self.flag.load();
        match flag {
            UpgradeFlag::Idle => return flag,
            UpgradeFlag::Started => log::warn!("ota: previous update was interrupted"),
            UpgradeFlag::Finished => log::info!("ota: previous update completed"),
        }
        self.reset_flag();
        flag
    }

    pub fn state(&self) -> OtaState {
        self.session
            .as_ref()
            .map_or(OtaState::Idle, |session| session.state)
    }

    /// Update server endpoint once resolved.
    pub fn remote(&self) -> Option<SocketAddr> {
        self.session.as_ref().and_then(|session| session.remote)
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|session| session.id)
    }

    /// Failure cause of the last session, `None` after a success.
    pub fn last_error(&self) -> Option<OtaError> {
        self.last_error
    }

    /// Boot configuration store sharing the engine's flash.
    pub fn boot_store(&mut self) -> BootConfigStore<&mut F> {
        BootConfigStore::new(&mut self.flash, self.layout.boot_config_offset)
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    pub fn flag_mut(&mut self) -> &mut U {
        &mut self.flag
    }

    fn prepare_session(&mut self, id: SessionId, callback: UpdateCallback) -> Result<UpgradeSession, OtaError> {
        let boot = self.boot_store().read()?;
        let slot = boot.target_slot();
        let address = boot.slot_address(slot).ok_or(OtaError::SlotIndexInvalid)?;
        if self.config.image_name(slot).is_none() {
            return Err(OtaError::SlotIndexInvalid);
        }

        #[allow(clippy::cast_possible_truncation)]
        let stream = FlashWriteStream::init(address, F::ERASE_SIZE as u32);
        self.flag.store(UpgradeFlag::Started)?;
        Ok(UpgradeSession::new(id, callback, stream, slot, self.layout.slot_size))
    }

    fn live_session(&mut self, id: SessionId) -> Option<&mut UpgradeSession> {
        self.session.as_mut().filter(|session| session.id == id)
    }

    fn reset_flag(&mut self) {
        if let Err(error) = self.flag.store(UpgradeFlag::Idle) {
            log::error!("ota: failed to reset upgrade flag: {:?}", error);
        }
    }

    /// Records the failure cause and finishes the session.
    fn abort(&mut self, error: OtaError) {
        log::error!("ota: update failed: {:?}", error);
        if let Some(session) = self.session.as_mut() {
            session.fail(error);
        }
        self.finish();
    }

    /// Single exit point of a session.
    fn finish(&mut self) {
        self.timer.disarm();
        let Some(mut session) = self.session.take() else {
            return;
        };
        if session.transport_open {
            session.transport_open = false;
            self.network.disconnect(session.id);
        }

        let success = self.flag.load() == UpgradeFlag::Finished;
        if success {
            self.last_error = None;
            log::info!(
                "ota: slot {} updated, {} bytes",
                session.slot,
                session.received
            );
        } else {
            self.reset_flag();
            self.last_error = Some(session.error.unwrap_or(OtaError::ShortTransfer));
            log::warn!(
                "ota: update of slot {} failed after {} of {} bytes",
                session.slot,
                session.received,
                session.expected
            );
        }
        (session.callback)(success, session.slot);
    }

    /// Feeds received bytes through the header parser and into flash.
    fn consume(&mut self, id: SessionId, data: &[u8]) -> Result<(), OtaError> {
        let Self { session, flash, .. } = self;
        let Some(session) = session.as_mut().filter(|session| session.id == id) else {
            return Ok(());
        };

        let body = if session.state == OtaState::ReceivingHeader {
            match session.header.push(data)? {
                HeaderProgress::Incomplete => return Ok(()),
                HeaderProgress::Complete {
                    content_length,
                    body,
                } => {
                    if content_length == 0 {
                        log::warn!("ota: empty image announced");
                        return Err(OtaError::ProtocolError);
                    }
                    if content_length > session.capacity {
                        log::warn!(
                            "ota: image of {} bytes exceeds slot of {}",
                            content_length,
                            session.capacity
                        );
                        return Err(OtaError::ImageTooLarge);
                    }
                    log::info!("ota: receiving {} bytes", content_length);
                    session.expected = content_length;
                    session.state = OtaState::ReceivingBody;
                    body
                }
            }
        } else {
            data
        };

        if body.is_empty() {
            return Ok(());
        }
        let len = u32::try_from(body.len()).map_err(|_| OtaError::ProtocolError)?;
        if session.received + len > session.expected {
            log::warn!("ota: more payload than announced");
            return Err(OtaError::ProtocolError);
        }
        session.stream.write(flash, body)?;
        session.received += len;
        Ok(())
    }

    /// Flushes the stream and marks the update finished.
    fn complete(&mut self) -> Result<(), OtaError> {
        let Self { session, flash, flag, .. } = self;
        let Some(session) = session.as_mut() else {
            return Ok(());
        };
        session.state = OtaState::Finishing;
        session.stream.finalize(flash)?;
        flag.store(UpgradeFlag::Finished)
    }
}

impl<N, T, F, U> TransportEvents for OtaEngine<N, T, F, U>
where
    N: Network,
    T: TimerPort,
    F: NorFlash,
    U: UpgradeFlagStore,
{
    fn on_resolved(&mut self, id: SessionId, address: Option<IpAddr>) {
        if self.live_session(id).is_none() {
            return;
        }
        let Some(address) = address else {
            self.abort(OtaError::ResolutionFailure);
            return;
        };

        let remote = SocketAddr::new(address, self.config.port);
        if let Some(session) = self.live_session(id) {
            session.remote = Some(remote);
            session.state = OtaState::Connecting;
        }
        log::info!("ota: connecting to {}", remote);

        if let Err(error) = self.network.connect(id, remote) {
            self.abort(error);
            return;
        }
        if let Some(session) = self.live_session(id) {
            session.state = OtaState::AwaitingConnect;
        }
        self.timer.arm(id, TimeoutKind::Connect, self.config.timeout);
    }

    fn on_connected(&mut self, id: SessionId) {
        let Some(session) = self.live_session(id) else {
            return;
        };
        if session.state != OtaState::AwaitingConnect {
            log::debug!("ota: ignoring connect in {:?}", session.state);
            return;
        }
        session.state = OtaState::Requesting;
        let slot = session.slot;
        self.timer.disarm();

        let Some(image) = self.config.image_name(slot) else {
            self.abort(OtaError::SlotIndexInvalid);
            return;
        };
        let request = match build_request(self.config.host, image, self.config.user_agent) {
            Ok(request) => request,
            Err(error) => {
                self.abort(error);
                return;
            }
        };
        log::info!("ota: requesting /{}", image);
        if let Err(error) = self.network.send(id, request.as_bytes()) {
            self.abort(error);
            return;
        }

        if let Some(session) = self.live_session(id) {
            session.state = OtaState::ReceivingHeader;
        }
        self.timer.arm(id, TimeoutKind::Receive, self.config.timeout);
    }

    fn on_data(&mut self, id: SessionId, data: &[u8]) {
        if self.live_session(id).is_none() {
            return;
        }
        self.timer.disarm();

        if let Err(error) = self.consume(id, data) {
            self.abort(error);
            return;
        }

        let complete = self
            .live_session(id)
            .is_some_and(|session| session.is_complete());
        if complete {
            if let Err(error) = self.complete() {
                self.abort(error);
                return;
            }
            self.finish();
        } else if !self.network.is_readable(id) {
            self.abort(OtaError::ShortTransfer);
        } else {
            self.timer.arm(id, TimeoutKind::Receive, self.config.timeout);
        }
    }

    fn on_disconnected(&mut self, id: SessionId) {
        let Some(session) = self.live_session(id) else {
            // Resources of an earlier session
            self.network.disconnect(id);
            return;
        };
        if !session.transport_open {
            return;
        }
        session.transport_open = false;
        session.fail(OtaError::ShortTransfer);
        self.network.disconnect(id);
        log::warn!("ota: connection closed by peer");
        self.finish();
    }

    fn on_timeout(&mut self, id: SessionId, kind: TimeoutKind) {
        if self.live_session(id).is_none() {
            return;
        }
        log::warn!("ota: {:?} timeout", kind);
        self.abort(OtaError::Timeout);
    }

    fn on_error(&mut self, id: SessionId) {
        if self.live_session(id).is_none() {
            return;
        }
        log::warn!("ota: transport error");
        self.abort(OtaError::ConnectFailure);
    }
}
