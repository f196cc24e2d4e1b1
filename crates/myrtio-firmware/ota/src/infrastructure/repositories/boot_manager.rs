use esp_bootloader_esp_idf::{
    ota::Ota,
    partitions::{
        AppPartitionSubType, DataPartitionSubType, PARTITION_TABLE_MAX_LEN, PartitionType,
        read_partition_table,
    },
};
use myrtio_ota::boot::rtc::{BootMode, RtcRecord, RtcStore};
use myrtio_ota::{BootConfigStore, BootConfiguration, OtaError};

use crate::config;
use crate::infrastructure::drivers::{RtcScratch, SharedFlash};

/// Number of application slots in the partition table
const OTA_APP_COUNT: usize = 2;

fn slot_partition(slot: u8) -> Option<AppPartitionSubType> {
    match slot {
        0 => Some(AppPartitionSubType::Ota0),
        1 => Some(AppPartitionSubType::Ota1),
        _ => None,
    }
}

/// Owner of the boot configuration sector.
///
/// The ESP-IDF second stage bootloader picks the image from `otadata`, so
/// every slot change is mirrored there.
pub(crate) struct BootManager {
    flash: SharedFlash,
    store: BootConfigStore<SharedFlash>,
}

impl BootManager {
    pub(crate) fn new(flash: SharedFlash) -> Self {
        Self {
            flash,
            store: BootConfigStore::new(flash, config::FLASH_LAYOUT.boot_config_offset),
        }
    }

    /// Reads the boot configuration, writing the defaults on first boot.
    pub(crate) fn load(&mut self) -> Result<BootConfiguration, OtaError> {
        self.store
            .provision(&BootConfiguration::new(config::SLOT_ADDRESSES))
    }

    pub(crate) fn set_current_slot(&mut self, slot: u8) -> Result<(), OtaError> {
        self.store.set_current_slot(slot)?;
        self.sync_otadata(slot)
    }

    /// Activates the other slot, returns it.
    pub(crate) fn switch_slot(&mut self) -> Result<u8, OtaError> {
        let slot = self.store.switch_slot()?;
        self.sync_otadata(slot)?;
        Ok(slot)
    }

    fn sync_otadata(&mut self, slot: u8) -> Result<(), OtaError> {
        let partition = slot_partition(slot).ok_or(OtaError::SlotIndexInvalid)?;
        self.flash.with(|flash| {
            let mut buffer = [0u8; PARTITION_TABLE_MAX_LEN];
            let pt = read_partition_table(&mut *flash, &mut buffer).map_err(|_| OtaError::FlashRead)?;
            let ota_part = pt
                .find_partition(PartitionType::Data(DataPartitionSubType::Ota))
                .map_err(|_| OtaError::FlashRead)?
                .ok_or(OtaError::FlashRead)?;
            let mut ota_part = ota_part.as_embedded_storage(&mut *flash);
            let mut ota = Ota::new(&mut ota_part, OTA_APP_COUNT).map_err(|_| OtaError::FlashRead)?;
            ota.set_current_app_partition(partition)
                .map_err(|_| OtaError::FlashWrite)
        })
    }
}

/// Reports the previous boot hand-off and records the running slot.
pub(crate) fn record_boot(slot: u8) {
    let mut rtc = RtcStore::new(RtcScratch, config::RTC_RECORD_OFFSET);
    let mut record = match rtc.read() {
        Ok(record) => {
            log::info!(
                "boot: last slot {}, mode {:?}",
                record.last_slot,
                BootMode::from_u8(record.last_mode)
            );
            record
        }
        Err(_) => RtcRecord::new(),
    };

    let temporary = record.next_mode == BootMode::Temporary as u8 && record.temp_slot == slot;
    record.last_mode = if temporary {
        BootMode::Temporary as u8
    } else {
        BootMode::Standard as u8
    };
    record.last_slot = slot;
    record.next_mode = BootMode::Standard as u8;
    if let Err(e) = rtc.write(&record) {
        log::warn!("boot: failed to write rtc record: {:?}", e);
    }
}
