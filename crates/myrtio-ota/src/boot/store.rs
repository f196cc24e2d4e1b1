use embedded_storage::nor_flash::NorFlash;

use super::config::{BootConfiguration, SECTOR_SIZE};
use crate::error::OtaError;

/// Boot configuration kept in a single flash sector.
///
/// Every write reads the whole sector, patches the record, erases and
/// rewrites it. There is no wear leveling and an interrupted write leaves the
/// sector erased.
pub struct BootConfigStore<F> {
    flash: F,
    offset: u32,
}

impl<F: NorFlash> BootConfigStore<F> {
    /// `offset` must be sector aligned.
    pub fn new(flash: F, offset: u32) -> Self {
        Self { flash, offset }
    }

    pub fn into_inner(self) -> F {
        self.flash
    }

    /// Reads the stored record verbatim, without validating it.
    pub fn read(&mut self) -> Result<BootConfiguration, OtaError> {
        let mut bytes = [0u8; BootConfiguration::SIZE];
        self.flash
            .read(self.offset, &mut bytes)
            .map_err(|_| OtaError::FlashRead)?;
        Ok(BootConfiguration::from_bytes(&bytes))
    }

    pub fn write(&mut self, config: &BootConfiguration) -> Result<(), OtaError> {
        let mut sector = [0u8; SECTOR_SIZE as usize];
        self.flash
            .read(self.offset, &mut sector)
            .map_err(|_| OtaError::FlashRead)?;
        sector[..BootConfiguration::SIZE].copy_from_slice(&config.to_bytes());

        self.flash
            .erase(self.offset, self.offset + SECTOR_SIZE)
            .map_err(|_| OtaError::FlashErase)?;
        self.flash
            .write(self.offset, &sector)
            .map_err(|_| OtaError::FlashWrite)
    }

    pub fn current_slot(&mut self) -> Result<u8, OtaError> {
        Ok(self.read()?.current_slot)
    }

    /// Marks `slot` as the one to boot. Leaves the record untouched when the
    /// slot is out of range.
    pub fn set_current_slot(&mut self, slot: u8) -> Result<(), OtaError> {
        let mut config = self.read()?;
        if slot >= config.slot_count {
            return Err(OtaError::SlotIndexInvalid);
        }
        config.current_slot = slot;
        self.write(&config)
    }

    /// Activates the next slot and returns it.
    pub fn switch_slot(&mut self) -> Result<u8, OtaError> {
        let current = self.read()?;
        let next = current.next_slot().ok_or(OtaError::SlotIndexInvalid)?;
        self.set_current_slot(next)?;
        Ok(next)
    }

    /// Writes a fresh record when the stored one does not validate.
    ///
    /// Returns the record in effect afterwards.
    pub fn provision(&mut self, default: &BootConfiguration) -> Result<BootConfiguration, OtaError> {
        let config = self.read()?;
        if config.is_valid() {
            return Ok(config);
        }
        log::warn!("boot: config sector invalid, provisioning defaults");
        self.write(default)?;
        Ok(*default)
    }
}
