//! OTA Controller
//!
//! Turns remote trigger commands into engine activations and slot changes.

use myrtio_ota::{OtaError, TriggerCommand};

use crate::infrastructure::ota::with_engine;
use crate::infrastructure::tasks::{BootRequest, request_boot};

/// Update callback handed to the engine.
///
/// Runs with the engine locked. A successful download activates the written
/// slot and restarts.
fn on_update_finished(success: bool, slot: u8) {
    if !success {
        log::warn!("ota: update of slot {} failed", slot);
        return;
    }

    log::info!("ota: slot {} written, activating", slot);
    if !request_boot(BootRequest::Activate(slot)) {
        log::warn!("ota: boot request already pending");
    }
}

pub(crate) fn handle_trigger(command: TriggerCommand) -> Result<(), OtaError> {
    match command {
        TriggerCommand::Update => {
            let session = with_engine(|engine| engine.activate(on_update_finished))
                .unwrap_or(Err(OtaError::ConcurrentUpdateRejected))
                .inspect_err(|e| log::warn!("ota: activation rejected: {:?}", e))?;
            log::info!("ota: session {} started", session.value());
            Ok(())
        }
        TriggerCommand::Revert => {
            if request_boot(BootRequest::Revert) {
                Ok(())
            } else {
                Err(OtaError::ConcurrentUpdateRejected)
            }
        }
    }
}
