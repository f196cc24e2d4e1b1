use embedded_storage::nor_flash::NorFlash;

use super::{EraseLedger, WORD_SIZE};
use crate::error::OtaError;

/// Scratch space joining the carried bytes with the next chunk.
const STAGING_SIZE: usize = 1024;

/// Turns arbitrary byte chunks into word aligned flash writes.
///
/// Up to three trailing bytes of each chunk are carried over to the next one.
/// Sectors are erased lazily right before the first write that touches them.
#[derive(Debug, Clone)]
pub struct FlashWriteStream {
    address: u32,
    ledger: EraseLedger,
    carry: [u8; WORD_SIZE],
    carry_len: usize,
    written: u32,
    finalized: bool,
}

impl FlashWriteStream {
    /// Opens a stream at `start_address`, which must be word aligned.
    pub fn init(start_address: u32, sector_size: u32) -> Self {
        Self {
            address: start_address,
            ledger: EraseLedger::new(start_address / sector_size, sector_size),
            carry: [0xFF; WORD_SIZE],
            carry_len: 0,
            written: 0,
            finalized: false,
        }
    }

    /// Next flash address to be programmed.
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Bytes physically programmed so far, always a multiple of four.
    pub fn written(&self) -> u32 {
        self.written
    }

    pub fn pending(&self) -> &[u8] {
        &self.carry[..self.carry_len]
    }

    pub fn ledger(&self) -> &EraseLedger {
        &self.ledger
    }

    /// Programs the word aligned part of `data`, prefixed by the carried bytes.
    ///
    /// Chunks of up to `STAGING_SIZE - 3` bytes take a single flash write.
    pub fn write<F: NorFlash>(&mut self, flash: &mut F, data: &[u8]) -> Result<(), OtaError> {
        let mut data = data;

        while self.carry_len > 0 && !data.is_empty() {
            let mut staging = [0xFF; STAGING_SIZE];
            let take = (STAGING_SIZE - self.carry_len).min(data.len());
            staging[..self.carry_len].copy_from_slice(&self.carry[..self.carry_len]);
            staging[self.carry_len..self.carry_len + take].copy_from_slice(&data[..take]);
            data = &data[take..];
            self.write_aligned(flash, &staging[..self.carry_len + take])?;
        }
        if data.is_empty() {
            return Ok(());
        }
        self.write_aligned(flash, data)
    }

    /// Pads the carried bytes with `0xFF` and writes the last word.
    ///
    /// Only the first call has an effect.
    pub fn finalize<F: NorFlash>(&mut self, flash: &mut F) -> Result<(), OtaError> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        if self.carry_len == 0 {
            return Ok(());
        }

        let mut word = [0xFF; WORD_SIZE];
        word[..self.carry_len].copy_from_slice(&self.carry[..self.carry_len]);
        self.carry_len = 0;
        self.program(flash, &word)
    }

    /// Writes the aligned prefix of `bytes` and carries the rest.
    fn write_aligned<F: NorFlash>(&mut self, flash: &mut F, bytes: &[u8]) -> Result<(), OtaError> {
        let aligned = bytes.len() & !(WORD_SIZE - 1);
        if aligned > 0 {
            self.program(flash, &bytes[..aligned])?;
        }
        let rest = &bytes[aligned..];
        self.carry[..rest.len()].copy_from_slice(rest);
        self.carry_len = rest.len();
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn program<F: NorFlash>(&mut self, flash: &mut F, bytes: &[u8]) -> Result<(), OtaError> {
        let len = bytes.len() as u32;
        let last_sector = self.ledger.sector_of(self.address + len - 1);
        self.ledger.erase_through(flash, last_sector)?;

        flash
            .write(self.address, bytes)
            .map_err(|_| OtaError::FlashWrite)?;
        self.address += len;
        self.written += len;
        Ok(())
    }
}
