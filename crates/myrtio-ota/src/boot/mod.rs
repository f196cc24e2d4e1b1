//! Durable boot state: the flash boot configuration sector and the RTC
//! scratch record that survives warm resets.

mod config;
pub mod rtc;
mod store;

pub use config::{BOOT_CONFIG_MAGIC, BOOT_CONFIG_VERSION, BootConfiguration, MAX_SLOTS, SECTOR_SIZE};
pub use store::BootConfigStore;
