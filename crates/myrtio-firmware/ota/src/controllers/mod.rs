mod ota;

pub(crate) use ota::handle_trigger;
