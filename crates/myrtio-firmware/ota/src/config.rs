#![allow(clippy::unreadable_literal)]

use myrtio_ota::{FlashLayout, MAX_SLOTS, OtaConfig};

pub(crate) struct WifiConfig {
    pub ssid: &'static str,
    pub password: &'static str,
}

pub(crate) struct DeviceConfig {
    pub hostname: &'static str,
}

pub(crate) const BUILD_VERSION: &str = env!("BUILD_VERSION");

pub(crate) const WIFI: WifiConfig = WifiConfig {
    ssid: env!("WIFI_SSID"),
    password: env!("WIFI_PASSWORD"),
};

pub(crate) const DEVICE: DeviceConfig = DeviceConfig {
    hostname: "myrtio-ota",
};

pub(crate) const OTA: OtaConfig = OtaConfig {
    host: match option_env!("OTA_HOST") {
        Some(host) => host,
        None => OtaConfig::DEFAULT.host,
    },
    ..OtaConfig::DEFAULT
};

/// Application slots, must match `ota_0` and `ota_1` in partitions.csv.
pub(crate) const SLOT_ADDRESSES: [u32; MAX_SLOTS] = [0x1_0000, 0x19_0000];

pub(crate) const FLASH_LAYOUT: FlashLayout = FlashLayout {
    boot_config_offset: 0x31_0000,
    slot_size: 0x18_0000,
};

/// Offsets inside the RTC scratch area.
pub(crate) const RTC_RECORD_OFFSET: usize = 0;
pub(crate) const RTC_FLAG_OFFSET: usize = 16;

/// Port of the trigger listener (standard espota port)
pub(crate) const TRIGGER_PORT: u16 = 3232;
