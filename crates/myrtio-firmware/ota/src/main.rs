#![no_std]
#![no_main]
#![feature(type_alias_impl_trait)]

mod config;
mod controllers;
mod infrastructure;

use embassy_executor::Spawner;
use embassy_time::Duration;

use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::{clock::CpuClock, timer::timg::TimerGroup};
use myrtio_ota::OtaEngine;
use myrtio_ota::boot::rtc::RtcUpgradeFlag;

use crate::infrastructure::drivers::{
    RtcScratch, SharedFlash, init_flash_storage_mutex, start_wifi_sta,
};
use crate::infrastructure::ota::{
    EmbassyNetwork, EmbassyTimer, init_engine, ota_driver_task, with_engine,
};
use crate::infrastructure::repositories::{BootManager, record_boot};
use crate::infrastructure::tasks::{boot_task, trigger_listener_task};

esp_bootloader_esp_idf::esp_app_desc!();

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    esp_println::logger::init_logger_from_env();

    // Initialize hardware
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // Allocate heap memory (64 + 32 KB)
    esp_alloc::heap_allocator!(
        #[unsafe(link_section = ".dram2_uninit")] size: 64 * 1024
    );
    esp_alloc::heap_allocator!(size: 32 * 1024);

    // Start rtos
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    log::info!("myrtio-ota {}", config::BUILD_VERSION);

    let flash = SharedFlash::new(init_flash_storage_mutex(peripherals.FLASH));
    let mut boot_manager = BootManager::new(flash);
    match boot_manager.load() {
        Ok(boot) => {
            log::info!("boot: running slot {} of {}", boot.current_slot, boot.slot_count);
            record_boot(boot.current_slot);
        }
        Err(e) => log::error!("boot: failed to load boot configuration: {:?}", e),
    }

    init_engine(OtaEngine::new(
        EmbassyNetwork::new(),
        EmbassyTimer::new(),
        flash,
        RtcUpgradeFlag::new(RtcScratch, config::RTC_FLAG_OFFSET),
        config::OTA,
        config::FLASH_LAYOUT,
    ));
    with_engine(|engine| engine.recover_after_reset());
    spawner.spawn(boot_task(boot_manager)).ok();

    // Wait for network connection before starting network-dependent tasks
    let stack = start_wifi_sta(spawner, peripherals.WIFI).await;
    spawner.spawn(ota_driver_task(stack)).ok();
    spawner.spawn(trigger_listener_task(stack)).ok();

    loop {
        embassy_time::Timer::after(Duration::from_secs(5)).await;
    }
}
