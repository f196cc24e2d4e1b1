use bytemuck::{Pod, Zeroable};

pub const BOOT_CONFIG_MAGIC: u32 = 0xA5EA_F1C3;
pub const BOOT_CONFIG_VERSION: u8 = 0x01;
pub const MAX_SLOTS: usize = 2;
pub const SECTOR_SIZE: u32 = 0x1000;

/// Boot configuration record as stored at the start of the config sector.
///
/// Layout (little endian, 16 bytes):
/// `magic u32 | version u8 | current u8 | count u8 | reserved u8 | slot[0] u32 | slot[1] u32`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct BootConfiguration {
    pub magic: u32,
    pub version: u8,
    pub current_slot: u8,
    pub slot_count: u8,
    reserved: u8,
    pub slot_address: [u32; MAX_SLOTS],
}

impl BootConfiguration {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    /// Provisioning record with both slots populated and slot 0 active.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(slot_address: [u32; MAX_SLOTS]) -> Self {
        Self {
            magic: BOOT_CONFIG_MAGIC,
            version: BOOT_CONFIG_VERSION,
            current_slot: 0,
            slot_count: MAX_SLOTS as u8,
            reserved: 0,
            slot_address,
        }
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let mut config: Self = bytemuck::pod_read_unaligned(bytes);
        config.magic = u32::from_le(config.magic);
        for address in &mut config.slot_address {
            *address = u32::from_le(*address);
        }
        config
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut le = *self;
        le.magic = self.magic.to_le();
        for address in &mut le.slot_address {
            *address = address.to_le();
        }
        bytemuck::cast(le)
    }

    /// Checks magic, version, slot range and sector alignment.
    pub fn is_valid(&self) -> bool {
        let count = usize::from(self.slot_count);
        self.magic == BOOT_CONFIG_MAGIC
            && self.version == BOOT_CONFIG_VERSION
            && (1..=MAX_SLOTS).contains(&count)
            && self.current_slot < self.slot_count
            && self.slot_address[..count]
                .iter()
                .all(|address| address % SECTOR_SIZE == 0)
    }

    pub fn slot_address(&self, slot: u8) -> Option<u32> {
        if slot >= self.slot_count {
            return None;
        }
        self.slot_address.get(usize::from(slot)).copied()
    }

    /// Slot an update download is written to.
    pub fn target_slot(&self) -> u8 {
        u8::from(self.current_slot == 0)
    }

    /// Slot following the current one, wrapping around the slot count.
    ///
    /// `None` when the current slot is outside the slot count.
    pub fn next_slot(&self) -> Option<u8> {
        if self.current_slot >= self.slot_count {
            return None;
        }
        Some((self.current_slot + 1) % self.slot_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLOTS: [u32; MAX_SLOTS] = [0x0001_0000, 0x0019_0000];

    #[test]
    fn test_layout_is_sixteen_le_bytes() {
        let config = BootConfiguration::new(SLOTS);
        let bytes = config.to_bytes();

        assert_eq!(BootConfiguration::SIZE, 16);
        assert_eq!(&bytes[0..4], &[0xC3, 0xF1, 0xEA, 0xA5]);
        assert_eq!(bytes[4], BOOT_CONFIG_VERSION);
        assert_eq!(bytes[5], 0);
        assert_eq!(bytes[6], 2);
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x01, 0x00]);
        assert_eq!(&bytes[12..16], &[0x00, 0x00, 0x19, 0x00]);
        assert_eq!(BootConfiguration::from_bytes(&bytes), config);
    }

    #[test]
    fn test_validation() {
        let config = BootConfiguration::new(SLOTS);
        assert!(config.is_valid());

        let erased = BootConfiguration::from_bytes(&[0xFF; BootConfiguration::SIZE]);
        assert!(!erased.is_valid());

        let mut unaligned = config;
        unaligned.slot_address[1] += 4;
        assert!(!unaligned.is_valid());

        let mut out_of_range = config;
        out_of_range.current_slot = 2;
        assert!(!out_of_range.is_valid());
    }

    #[test]
    fn test_target_and_next_slot() {
        let mut config = BootConfiguration::new(SLOTS);
        assert_eq!(config.target_slot(), 1);
        assert_eq!(config.next_slot(), Some(1));

        config.current_slot = 1;
        assert_eq!(config.target_slot(), 0);
        assert_eq!(config.next_slot(), Some(0));
        assert_eq!(config.slot_address(0), Some(SLOTS[0]));
        assert_eq!(config.slot_address(2), None);

        config.current_slot = 0xFF;
        assert_eq!(config.next_slot(), None);
    }
}
