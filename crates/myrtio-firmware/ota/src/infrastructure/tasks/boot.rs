use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embassy_time::{Duration, Timer};

use crate::infrastructure::repositories::BootManager;

/// Slot change requested by the update callback or a remote command.
#[derive(Debug, Clone, Copy)]
pub(crate) enum BootRequest {
    /// Boot the freshly written slot
    Activate(u8),
    /// Boot the other slot
    Revert,
}

static BOOT_CHANNEL: Channel<CriticalSectionRawMutex, BootRequest, 1> = Channel::new();

/// Queue a slot change, `false` when one is already pending.
pub(crate) fn request_boot(request: BootRequest) -> bool {
    BOOT_CHANNEL.try_send(request).is_ok()
}

/// Persists the requested slot and restarts into it.
#[embassy_executor::task]
pub(crate) async fn boot_task(mut manager: BootManager) {
    loop {
        let request = BOOT_CHANNEL.receive().await;
        let result = match request {
            BootRequest::Activate(slot) => manager.set_current_slot(slot).map(|()| slot),
            BootRequest::Revert => manager.switch_slot(),
        };

        match result {
            Ok(slot) => {
                log::info!("boot: restarting into slot {}", slot);
                // Give the logger and the trigger reply time to flush
                Timer::after(Duration::from_millis(500)).await;
                esp_hal::system::software_reset();
            }
            Err(e) => log::error!("boot: {:?} failed: {:?}", request, e),
        }
    }
}
