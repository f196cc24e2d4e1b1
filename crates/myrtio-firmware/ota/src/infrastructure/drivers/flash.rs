//! Flash storage driver with shared mutex access
//!
//! The update engine streams images through [`SharedFlash`] while the boot
//! manager rewrites the boot configuration and `otadata`, both go through
//! the same mutex.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use embedded_storage::nor_flash::{ErrorType, NorFlash, ReadNorFlash};
use esp_hal::peripherals::FLASH;
use esp_storage::FlashStorage;
use static_cell::StaticCell;

/// Type alias for the shared flash storage mutex
pub(crate) type FlashStorageMutex = Mutex<CriticalSectionRawMutex, RefCell<FlashStorage<'static>>>;

static FLASH_STORAGE_CELL: StaticCell<FlashStorageMutex> = StaticCell::new();

/// Initialize the shared flash storage mutex from the FLASH peripheral.
///
/// # Panics
/// Panics if called more than once.
pub(crate) fn init_flash_storage_mutex(flash: FLASH<'static>) -> &'static FlashStorageMutex {
    let flash_storage = FlashStorage::new(flash);
    FLASH_STORAGE_CELL.init(Mutex::new(RefCell::new(flash_storage)))
}

/// [`NorFlash`] handle locking the shared mutex for every operation.
#[derive(Clone, Copy)]
pub(crate) struct SharedFlash {
    storage: &'static FlashStorageMutex,
}

impl SharedFlash {
    pub(crate) fn new(storage: &'static FlashStorageMutex) -> Self {
        Self { storage }
    }

    /// Runs `f` with exclusive access to the raw flash.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut FlashStorage<'static>) -> R) -> R {
        self.storage.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

impl ErrorType for SharedFlash {
    type Error = <FlashStorage<'static> as ErrorType>::Error;
}

impl ReadNorFlash for SharedFlash {
    const READ_SIZE: usize = <FlashStorage<'static> as ReadNorFlash>::READ_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.with(|flash| ReadNorFlash::read(flash, offset, bytes))
    }

    fn capacity(&self) -> usize {
        self.with(|flash| flash.capacity())
    }
}

impl NorFlash for SharedFlash {
    const WRITE_SIZE: usize = <FlashStorage<'static> as NorFlash>::WRITE_SIZE;
    const ERASE_SIZE: usize = <FlashStorage<'static> as NorFlash>::ERASE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.with(|flash| flash.erase(from, to))
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.with(|flash| NorFlash::write(flash, offset, bytes))
    }
}
