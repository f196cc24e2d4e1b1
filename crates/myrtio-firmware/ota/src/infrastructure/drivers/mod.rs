mod flash;
mod network;
mod rtc;
mod wifi_sta;

pub(crate) use flash::{SharedFlash, init_flash_storage_mutex};
pub(crate) use network::{resolve_host, to_core_ip, to_endpoint};
pub(crate) use rtc::RtcScratch;
pub(crate) use wifi_sta::start_wifi_sta;
