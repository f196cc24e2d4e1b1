//! Dual-bank over-the-air update core.
//!
//! Everything here is hardware independent: flash is reached through
//! [`embedded_storage::nor_flash::NorFlash`], the network, timer, RTC memory
//! and upgrade flag through the traits in [`engine::ports`] and [`boot::rtc`].
#![no_std]

pub mod boot;
pub mod config;
pub mod engine;
pub mod error;
pub mod flash;
pub mod http;
pub mod trigger;

pub use boot::{BootConfigStore, BootConfiguration, MAX_SLOTS, SECTOR_SIZE};
pub use config::{FlashLayout, OtaConfig};
pub use engine::{OtaEngine, OtaState, SessionId, UpdateCallback};
pub use error::OtaError;
pub use trigger::TriggerCommand;
