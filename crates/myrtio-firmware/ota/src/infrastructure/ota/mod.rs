//! Bindings of the update engine to embassy.
//!
//! The engine itself is synchronous. Its network and timer ports only record
//! what has to happen and wake [`ota_driver_task`], which performs the socket
//! work and feeds the results back as engine events.

mod driver;

use core::cell::RefCell;
use core::net::{IpAddr, Ipv4Addr, SocketAddr};
use core::str::FromStr;

use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant};
use heapless::{Deque, String, Vec};
use myrtio_ota::OtaEngine;
use myrtio_ota::OtaError;
use myrtio_ota::SessionId;
use myrtio_ota::boot::rtc::RtcUpgradeFlag;
use myrtio_ota::engine::ports::{Network, Resolution, TimeoutKind, TimerPort};
use myrtio_ota::http::REQUEST_CAPACITY;

use crate::infrastructure::drivers::{RtcScratch, SharedFlash};

pub(crate) use driver::ota_driver_task;

const MAX_HOST_LEN: usize = 64;
const COMMAND_QUEUE_LEN: usize = 4;

pub(crate) type FirmwareEngine =
    OtaEngine<EmbassyNetwork, EmbassyTimer, SharedFlash, RtcUpgradeFlag<RtcScratch>>;

static ENGINE: Mutex<CriticalSectionRawMutex, RefCell<Option<FirmwareEngine>>> =
    Mutex::new(RefCell::new(None));

/// Raised whenever a port queues work or rearms the timer.
static DRIVER_WAKE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Install the engine. Must run before any task touches it.
pub(crate) fn init_engine(engine: FirmwareEngine) {
    ENGINE.lock(|cell| {
        cell.borrow_mut().replace(engine);
    });
}

/// Run `f` with the engine, `None` before [`init_engine`].
pub(crate) fn with_engine<R>(f: impl FnOnce(&mut FirmwareEngine) -> R) -> Option<R> {
    ENGINE.lock(|cell| cell.borrow_mut().as_mut().map(f))
}

/// Socket work requested by the engine.
#[derive(Debug)]
pub(crate) enum NetCommand {
    Resolve(SessionId, String<MAX_HOST_LEN>),
    Connect(SessionId, SocketAddr),
    Send(SessionId, Vec<u8, REQUEST_CAPACITY>),
    Disconnect(SessionId),
}

/// [`Network`] port backed by a single embassy-net TCP socket.
pub(crate) struct EmbassyNetwork {
    commands: Deque<NetCommand, COMMAND_QUEUE_LEN>,
    active: Option<SessionId>,
    readable: bool,
}

impl EmbassyNetwork {
    pub(crate) const fn new() -> Self {
        Self {
            commands: Deque::new(),
            active: None,
            readable: false,
        }
    }

    pub(crate) fn pop_command(&mut self) -> Option<NetCommand> {
        self.commands.pop_front()
    }

    pub(crate) fn set_readable(&mut self, readable: bool) {
        self.readable = readable;
    }

    fn push(&mut self, command: NetCommand) -> Result<(), OtaError> {
        self.commands
            .push_back(command)
            .map_err(|_| OtaError::AllocationFailure)?;
        DRIVER_WAKE.signal(());
        Ok(())
    }
}

impl Network for EmbassyNetwork {
    fn open(&mut self, session: SessionId) -> Result<(), OtaError> {
        if self.active.is_some() {
            return Err(OtaError::AllocationFailure);
        }
        self.active = Some(session);
        self.readable = false;
        Ok(())
    }

    fn resolve(&mut self, session: SessionId, host: &str) -> Resolution {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Resolution::Ready(IpAddr::V4(ip));
        }
        let Ok(host) = String::from_str(host) else {
            return Resolution::Failed;
        };
        match self.push(NetCommand::Resolve(session, host)) {
            Ok(()) => Resolution::Pending,
            Err(_) => Resolution::Failed,
        }
    }

    fn connect(&mut self, session: SessionId, remote: SocketAddr) -> Result<(), OtaError> {
        self.push(NetCommand::Connect(session, remote))
            .map_err(|_| OtaError::ConnectFailure)
    }

    fn send(&mut self, session: SessionId, data: &[u8]) -> Result<(), OtaError> {
        let data = Vec::from_slice(data).map_err(|()| OtaError::ConnectFailure)?;
        self.push(NetCommand::Send(session, data))
            .map_err(|_| OtaError::ConnectFailure)
    }

    fn is_readable(&self, session: SessionId) -> bool {
        self.readable && self.active == Some(session)
    }

    fn disconnect(&mut self, session: SessionId) {
        if self.active != Some(session) {
            return;
        }
        self.active = None;
        self.readable = false;
        if self.push(NetCommand::Disconnect(session)).is_err() {
            log::warn!("ota: command queue full, dropping disconnect");
        }
    }
}

/// Single deadline checked by the driver task.
pub(crate) struct EmbassyTimer {
    deadline: Option<(SessionId, TimeoutKind, Instant)>,
}

impl EmbassyTimer {
    pub(crate) const fn new() -> Self {
        Self { deadline: None }
    }

    pub(crate) fn deadline(&self) -> Option<(SessionId, TimeoutKind, Instant)> {
        self.deadline
    }
}

impl TimerPort for EmbassyTimer {
    fn arm(&mut self, session: SessionId, kind: TimeoutKind, after: Duration) {
        self.deadline = Some((session, kind, Instant::now() + after));
        DRIVER_WAKE.signal(());
    }

    fn disarm(&mut self) {
        self.deadline = None;
    }
}
