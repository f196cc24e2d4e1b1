use embassy_time::Duration;

use crate::boot::MAX_SLOTS;

/// Update server parameters.
///
/// The image requested from the server depends on the slot being written,
/// `image_names[slot]`.
#[derive(Debug, Clone, Copy)]
pub struct OtaConfig {
    pub host: &'static str,
    pub port: u16,
    pub image_names: [&'static str; MAX_SLOTS],
    /// Applies to both the connect and every receive wait
    pub timeout: Duration,
    pub user_agent: &'static str,
}

impl OtaConfig {
    pub const DEFAULT: Self = Self {
        host: "192.168.43.1",
        port: 12345,
        image_names: ["user_0.bin", "user_1.bin"],
        timeout: Duration::from_millis(10_000),
        user_agent: "esp8266/1.0",
    };

    /// Image file name for the given target slot.
    pub fn image_name(&self, slot: u8) -> Option<&'static str> {
        self.image_names.get(usize::from(slot)).copied()
    }
}

impl Default for OtaConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Where the boot configuration lives and how large an image slot is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashLayout {
    /// Sector aligned offset of the boot configuration sector
    pub boot_config_offset: u32,
    /// Capacity of one image slot in bytes
    pub slot_size: u32,
}
