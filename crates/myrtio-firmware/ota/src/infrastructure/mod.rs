//! Hardware and network bindings of the update core.

pub(crate) mod drivers;
pub(crate) mod ota;
pub(crate) mod repositories;
pub(crate) mod tasks;
