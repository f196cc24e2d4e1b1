mod boot_manager;

pub(crate) use boot_manager::{BootManager, record_boot};
