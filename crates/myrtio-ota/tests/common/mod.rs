#![allow(dead_code)]

use std::cell::RefCell;
use std::net::IpAddr;

use embassy_time::Duration;
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use myrtio_ota::boot::rtc::{RtcMemory, RtcUpgradeFlag};
use myrtio_ota::engine::ports::{Network, Resolution, TimeoutKind, TimerPort};
use myrtio_ota::{BootConfiguration, FlashLayout, OtaConfig, OtaEngine, OtaError, SessionId};

// ---------------------------------------------------------------------------
// Flash
// ---------------------------------------------------------------------------

pub const FLASH_SIZE: usize = 0x1_0000;
pub const BOOT_CONFIG_OFFSET: u32 = 0x0000;
pub const SLOT_ADDRESSES: [u32; 2] = [0x2000, 0x8000];
pub const SLOT_SIZE: u32 = 0x6000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeFlashError;

impl NorFlashError for FakeFlashError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

/// In-memory NOR flash that records every erase and write.
///
/// Programming only clears bits, like the real part, and panics on writes
/// that are not word aligned.
pub struct FakeFlash {
    pub memory: Vec<u8>,
    /// `(from, to)` of every erase
    pub erases: Vec<(u32, u32)>,
    /// `(offset, len)` of every write
    pub writes: Vec<(u32, usize)>,
    pub fail_write_at: Option<u32>,
    pub fail_erase: bool,
}

impl FakeFlash {
    pub fn new() -> Self {
        Self {
            memory: vec![0xFF; FLASH_SIZE],
            erases: Vec::new(),
            writes: Vec::new(),
            fail_write_at: None,
            fail_erase: false,
        }
    }

    pub fn bytes(&self, offset: u32, len: usize) -> &[u8] {
        let offset = offset as usize;
        &self.memory[offset..offset + len]
    }

    pub fn erase_count(&self, sector: u32) -> usize {
        let from = sector * Self::ERASE_SIZE as u32;
        self.erases.iter().filter(|(start, _)| *start == from).count()
    }

    pub fn clear_log(&mut self) {
        self.erases.clear();
        self.writes.clear();
    }
}

impl ErrorType for FakeFlash {
    type Error = FakeFlashError;
}

impl ReadNorFlash for FakeFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let offset = offset as usize;
        bytes.copy_from_slice(&self.memory[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.memory.len()
    }
}

impl NorFlash for FakeFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = 0x1000;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if self.fail_erase {
            return Err(FakeFlashError);
        }
        assert_eq!(from as usize % Self::ERASE_SIZE, 0, "unaligned erase start");
        assert_eq!(to as usize % Self::ERASE_SIZE, 0, "unaligned erase end");
        self.memory[from as usize..to as usize].fill(0xFF);
        self.erases.push((from, to));
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.fail_write_at == Some(offset) {
            return Err(FakeFlashError);
        }
        assert_eq!(offset % 4, 0, "unaligned write offset");
        assert_eq!(bytes.len() % 4, 0, "unaligned write length");
        let start = offset as usize;
        for (cell, byte) in self.memory[start..start + bytes.len()].iter_mut().zip(bytes) {
            *cell &= *byte;
        }
        self.writes.push((offset, bytes.len()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RTC memory
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FakeRtcError;

pub struct FakeRtc {
    pub memory: [u8; 64],
    pub fail: bool,
}

impl FakeRtc {
    pub fn new() -> Self {
        Self {
            memory: [0; 64],
            fail: false,
        }
    }
}

impl RtcMemory for FakeRtc {
    type Error = FakeRtcError;

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        if self.fail {
            return Err(FakeRtcError);
        }
        buf.copy_from_slice(&self.memory[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error> {
        if self.fail {
            return Err(FakeRtcError);
        }
        self.memory[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Network and timer
// ---------------------------------------------------------------------------

pub struct FakeNetwork {
    pub resolution: Resolution,
    pub readable: bool,
    pub fail_open: bool,
    pub fail_connect: bool,
    pub opened: Vec<SessionId>,
    pub resolved: Vec<SessionId>,
    pub connects: Vec<(SessionId, std::net::SocketAddr)>,
    pub sent: Vec<u8>,
    pub disconnects: Vec<SessionId>,
}

impl FakeNetwork {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            readable: true,
            fail_open: false,
            fail_connect: false,
            opened: Vec::new(),
            resolved: Vec::new(),
            connects: Vec::new(),
            sent: Vec::new(),
            disconnects: Vec::new(),
        }
    }

    pub fn sent_text(&self) -> &str {
        std::str::from_utf8(&self.sent).unwrap()
    }
}

impl Network for FakeNetwork {
    fn open(&mut self, session: SessionId) -> Result<(), OtaError> {
        if self.fail_open {
            return Err(OtaError::AllocationFailure);
        }
        self.opened.push(session);
        Ok(())
    }

    fn resolve(&mut self, session: SessionId, _host: &str) -> Resolution {
        self.resolved.push(session);
        self.resolution
    }

    fn connect(&mut self, session: SessionId, remote: std::net::SocketAddr) -> Result<(), OtaError> {
        if self.fail_connect {
            return Err(OtaError::ConnectFailure);
        }
        self.connects.push((session, remote));
        Ok(())
    }

    fn send(&mut self, _session: SessionId, data: &[u8]) -> Result<(), OtaError> {
        self.sent.extend_from_slice(data);
        Ok(())
    }

    fn is_readable(&self, _session: SessionId) -> bool {
        self.readable
    }

    fn disconnect(&mut self, session: SessionId) {
        self.disconnects.push(session);
    }
}

#[derive(Default)]
pub struct FakeTimer {
    pub armed: Option<(SessionId, TimeoutKind, Duration)>,
    pub arm_count: usize,
}

impl TimerPort for FakeTimer {
    fn arm(&mut self, session: SessionId, kind: TimeoutKind, after: Duration) {
        self.armed = Some((session, kind, after));
        self.arm_count += 1;
    }

    fn disarm(&mut self) {
        self.armed = None;
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub const FLAG_OFFSET: usize = 16;

pub type TestEngine = OtaEngine<FakeNetwork, FakeTimer, FakeFlash, RtcUpgradeFlag<FakeRtc>>;

pub fn literal_host() -> Resolution {
    Resolution::Ready(IpAddr::from([192, 168, 43, 1]))
}

pub fn provisioned_flash() -> FakeFlash {
    let mut flash = FakeFlash::new();
    let config = BootConfiguration::new(SLOT_ADDRESSES).to_bytes();
    flash.memory[..config.len()].copy_from_slice(&config);
    flash
}

pub fn engine(resolution: Resolution) -> TestEngine {
    OtaEngine::new(
        FakeNetwork::new(resolution),
        FakeTimer::default(),
        provisioned_flash(),
        RtcUpgradeFlag::new(FakeRtc::new(), FLAG_OFFSET),
        OtaConfig::DEFAULT,
        FlashLayout {
            boot_config_offset: BOOT_CONFIG_OFFSET,
            slot_size: SLOT_SIZE,
        },
    )
}

// ---------------------------------------------------------------------------
// Callback capture
// ---------------------------------------------------------------------------

thread_local! {
    static RESULTS: RefCell<Vec<(bool, u8)>> = const { RefCell::new(Vec::new()) };
}

/// Update callback storing its arguments for the current test thread.
pub fn record_result(success: bool, slot: u8) {
    RESULTS.with(|results| results.borrow_mut().push((success, slot)));
}

pub fn take_results() -> Vec<(bool, u8)> {
    RESULTS.with(|results| results.borrow_mut().drain(..).collect())
}
