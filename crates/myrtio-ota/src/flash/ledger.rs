use core::ops::Range;

use embedded_storage::nor_flash::NorFlash;

use crate::error::OtaError;

/// Erase high-water mark of a write stream.
///
/// Sectors are erased in ascending order, each at most once, starting at the
/// sector the stream was opened on.
#[derive(Debug, Clone)]
pub struct EraseLedger {
    sector_size: u32,
    start_sector: u32,
    /// First sector not erased yet
    next_sector: u32,
}

impl EraseLedger {
    pub fn new(start_sector: u32, sector_size: u32) -> Self {
        Self {
            sector_size,
            start_sector,
            next_sector: start_sector,
        }
    }

    pub fn sector_of(&self, address: u32) -> u32 {
        address / self.sector_size
    }

    pub fn start_sector(&self) -> u32 {
        self.start_sector
    }

    /// Highest erased sector, `None` before the first erase.
    pub fn last_erased(&self) -> Option<u32> {
        (self.next_sector > self.start_sector).then(|| self.next_sector - 1)
    }

    /// Sectors that still need erasing to cover everything up to `sector`.
    pub fn pending(&self, sector: u32) -> Range<u32> {
        self.next_sector..self.next_sector.max(sector + 1)
    }

    /// Erases every sector up to and including `sector` that has not been
    /// erased yet. The mark only advances past sectors erased successfully.
    pub fn erase_through<F: NorFlash>(&mut self, flash: &mut F, sector: u32) -> Result<(), OtaError> {
        for pending in self.pending(sector) {
            let from = pending * self.sector_size;
            flash
                .erase(from, from + self.sector_size)
                .map_err(|_| OtaError::FlashErase)?;
            self.next_sector = pending + 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_is_monotonic() {
        let mut ledger = EraseLedger::new(16, 0x1000);
        assert_eq!(ledger.last_erased(), None);
        assert_eq!(ledger.pending(16), 16..17);
        assert_eq!(ledger.pending(18), 16..19);

        ledger.next_sector = 19;
        assert_eq!(ledger.last_erased(), Some(18));
        assert!(ledger.pending(17).is_empty());
        assert_eq!(ledger.pending(19), 19..20);
    }

    #[test]
    fn test_sector_of() {
        let ledger = EraseLedger::new(0, 0x1000);
        assert_eq!(ledger.sector_of(0x0FFF), 0);
        assert_eq!(ledger.sector_of(0x1000), 1);
    }
}
