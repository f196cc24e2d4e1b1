//! RTC scratch memory records.
//!
//! RTC memory survives a warm reset but not a power cycle, so both records
//! here are self-checking and read back as absent after a cold boot.

use bytemuck::{Pod, Zeroable};

use crate::engine::ports::{UpgradeFlag, UpgradeFlagStore};
use crate::error::OtaError;

pub const RTC_MAGIC: u32 = 0x2334_AE68;
/// Seed of the record checksum.
pub const CHECKSUM_SEED: u8 = 0xEF;

/// Byte addressable memory retained across warm resets.
pub trait RtcMemory {
    type Error: core::fmt::Debug;

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Self::Error>;
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error>;
}

impl<T: RtcMemory> RtcMemory for &mut T {
    type Error = T::Error;

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read(offset, buf)
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error> {
        (**self).write(offset, data)
    }
}

/// How the bootloader should start the next image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BootMode {
    Standard = 0x00,
    /// Boot `temp_slot` once, then fall back to the configured slot
    Temporary = 0x01,
}

impl BootMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Standard),
            0x01 => Some(Self::Temporary),
            _ => None,
        }
    }
}

/// Boot hand-off record.
///
/// Layout (12 bytes): `magic u32 | next_mode u8 | last_mode u8 | last_slot u8 |
/// temp_slot u8 | checksum u8 | reserved [u8; 3]`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct RtcRecord {
    pub magic: u32,
    pub next_mode: u8,
    pub last_mode: u8,
    pub last_slot: u8,
    pub temp_slot: u8,
    checksum: u8,
    reserved: [u8; 3],
}

impl RtcRecord {
    pub const SIZE: usize = core::mem::size_of::<Self>();
    const CHECKSUM_OFFSET: usize = 8;

    pub const fn new() -> Self {
        Self {
            magic: RTC_MAGIC,
            next_mode: BootMode::Standard as u8,
            last_mode: BootMode::Standard as u8,
            last_slot: 0,
            temp_slot: 0,
            checksum: 0,
            reserved: [0; 3],
        }
    }

    fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut le = self;
        le.magic = self.magic.to_le();
        let mut bytes: [u8; Self::SIZE] = bytemuck::cast(le);
        bytes[Self::CHECKSUM_OFFSET] = checksum(&bytes[..Self::CHECKSUM_OFFSET]);
        bytes
    }

    fn from_bytes(bytes: &[u8; Self::SIZE]) -> Result<Self, OtaError> {
        if bytes[Self::CHECKSUM_OFFSET] != checksum(&bytes[..Self::CHECKSUM_OFFSET]) {
            return Err(OtaError::ChecksumMismatch);
        }
        let mut record: Self = bytemuck::pod_read_unaligned(bytes);
        record.magic = u32::from_le(record.magic);
        if record.magic != RTC_MAGIC {
            return Err(OtaError::ChecksumMismatch);
        }
        record.checksum = 0;
        Ok(record)
    }
}

impl Default for RtcRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Running XOR over `bytes`, seeded with [`CHECKSUM_SEED`].
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(CHECKSUM_SEED, |acc, byte| acc ^ byte)
}

/// Checksummed [`RtcRecord`] at a fixed RTC memory offset.
pub struct RtcStore<M> {
    memory: M,
    offset: usize,
}

impl<M: RtcMemory> RtcStore<M> {
    pub fn new(memory: M, offset: usize) -> Self {
        Self { memory, offset }
    }

    pub fn read(&mut self) -> Result<RtcRecord, OtaError> {
        let mut bytes = [0u8; RtcRecord::SIZE];
        self.memory
            .read(self.offset, &mut bytes)
            .map_err(|_| OtaError::MemoryAccess)?;
        RtcRecord::from_bytes(&bytes)
    }

    pub fn write(&mut self, record: &RtcRecord) -> Result<(), OtaError> {
        self.memory
            .write(self.offset, &record.to_bytes())
            .map_err(|_| OtaError::MemoryAccess)
    }

    /// Asks the bootloader to start `slot` once on the next reset.
    pub fn set_temp_slot(&mut self, slot: u8) -> Result<(), OtaError> {
        let mut record = self.read().unwrap_or_default();
        record.next_mode = BootMode::Temporary as u8;
        record.temp_slot = slot;
        self.write(&record)
    }

    /// Slot the bootloader reported starting last.
    pub fn last_boot_slot(&mut self) -> Result<u8, OtaError> {
        Ok(self.read()?.last_slot)
    }

    pub fn last_boot_mode(&mut self) -> Result<BootMode, OtaError> {
        BootMode::from_u8(self.read()?.last_mode).ok_or(OtaError::ChecksumMismatch)
    }
}

/// [`UpgradeFlag`] persisted as one byte followed by its complement.
///
/// Any other pattern, including uninitialised memory, reads as idle.
pub struct RtcUpgradeFlag<M> {
    memory: M,
    offset: usize,
}

impl<M: RtcMemory> RtcUpgradeFlag<M> {
    pub fn new(memory: M, offset: usize) -> Self {
        Self { memory, offset }
    }
}

impl<M: RtcMemory> UpgradeFlagStore for RtcUpgradeFlag<M> {
    fn load(&mut self) -> UpgradeFlag {
        let mut bytes = [0u8; 2];
        if self.memory.read(self.offset, &mut bytes).is_err() || bytes[0] != !bytes[1] {
            return UpgradeFlag::Idle;
        }
        UpgradeFlag::from_u8(bytes[0]).unwrap_or(UpgradeFlag::Idle)
    }

    fn store(&mut self, flag: UpgradeFlag) -> Result<(), OtaError> {
        let value = flag as u8;
        self.memory
            .write(self.offset, &[value, !value])
            .map_err(|_| OtaError::MemoryAccess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_seeded_xor() {
        assert_eq!(checksum(&[]), 0xEF);
        assert_eq!(checksum(&[0xEF]), 0x00);
        assert_eq!(checksum(&[0x01, 0x02]), 0xEF ^ 0x03);
    }

    #[test]
    fn test_record_layout() {
        let bytes = RtcRecord::new().to_bytes();
        assert_eq!(RtcRecord::SIZE, 12);
        assert_eq!(&bytes[0..4], &[0x68, 0xAE, 0x34, 0x23]);
        assert_eq!(bytes[8], checksum(&bytes[..8]));
        assert_eq!(RtcRecord::from_bytes(&bytes), Ok(RtcRecord::new()));
    }
}
