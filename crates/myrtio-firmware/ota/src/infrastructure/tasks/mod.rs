mod boot;
mod trigger_listener;

pub(crate) use boot::{BootRequest, boot_task, request_boot};
pub(crate) use trigger_listener::trigger_listener_task;
