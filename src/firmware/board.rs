//! The PhotoPainter board: every collaborator the controller needs.

use embassy_rp::adc::{self, Adc};
use embassy_rp::gpio::{Input, Output};
use embassy_rp::watchdog::Watchdog as HwWatchdog;
use embassy_time::{Duration, block_for};
use photo_frame::panel::Panel;
use photo_frame::power::{Indicator, PowerSense};
use photo_frame::selector::RandomSource;
use photo_frame::shutdown::{PowerLatch, Watchdog};
use photo_frame::storage::Storage;

use super::epd7in3e::Epd7in3e;
use super::error::BoardError;
use super::rosc::Rosc;
use super::sdcard::SdSlot;
use super::tasks::{CHARGE, set_power_led};

const ADC_RETRIES: usize = 3;

/// Low-power pattern: the power LED blinks this many times.
const LOW_POWER_FLASHES: usize = 5;
const LOW_POWER_FLASH_MS: u64 = 200;

/// Hardware behind the frame's collaborator traits.
pub struct PhotoPainter {
    pub adc: Adc<'static, adc::Blocking>,
    pub vbat: adc::Channel<'static>,
    pub vbus: Input<'static>,
    pub bat_off: Output<'static>,
    pub sd: SdSlot,
    pub epd: Epd7in3e,
    pub watchdog: HwWatchdog,
    pub watchdog_armed: bool,
    pub rng: Rosc,
}

/// Feed `watchdog` if it has been started.
fn feed_if_armed(
    watchdog: &mut HwWatchdog,
    armed: bool,
) {
    if armed {
        watchdog.feed();
    }
}

impl PowerSense for PhotoPainter {
    fn sample_raw_adc(&mut self) -> Option<u16> {
        for _ in 0..ADC_RETRIES {
            match self.adc.blocking_read(&mut self.vbat) {
                Ok(raw) => return Some(raw),
                Err(e) => log::warn!("Battery ADC read failed: {:?}", e),
            }
        }
        None
    }

    fn battery_present_signal(&mut self) -> bool { self.vbus.is_high() }

    fn charge_signal(&mut self) -> bool { CHARGE.is_charging() }

    fn arm_charge_indicator(&mut self) { CHARGE.arm(); }
}

impl Indicator for PhotoPainter {
    fn set_power_led(
        &mut self,
        on: bool,
    ) {
        set_power_led(on);
    }

    fn flash_low_power(&mut self) {
        for _ in 0..LOW_POWER_FLASHES {
            set_power_led(true);
            block_for(Duration::from_millis(LOW_POWER_FLASH_MS));
            set_power_led(false);
            block_for(Duration::from_millis(LOW_POWER_FLASH_MS));
        }
    }
}

impl Storage for PhotoPainter {
    type StorageError = BoardError;

    fn storage_ready(&mut self) -> bool {
        match self.sd.probe() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("SD card probe failed: {}", e);
                false
            }
        }
    }

    fn mount(&mut self) -> Result<(), Self::StorageError> { self.sd.mount() }

    fn unmount(&mut self) { self.sd.unmount(); }

    fn exists(
        &mut self,
        path: &str,
    ) -> bool {
        // A long miss streak can outlast the watchdog
        feed_if_armed(&mut self.watchdog, self.watchdog_armed);
        match self.sd.contains(path) {
            Ok(found) => found,
            Err(e) => {
                log::warn!("Checking {} failed: {}", path, e);
                false
            }
        }
    }
}

impl Panel for PhotoPainter {
    type PanelError = BoardError;

    fn render_bitmap(
        &mut self,
        path: &str,
    ) -> Result<(), Self::PanelError> {
        let Self {
            sd,
            epd,
            watchdog,
            watchdog_armed,
            ..
        } = self;
        let armed = *watchdog_armed;
        let mut feed = || feed_if_armed(watchdog, armed);

        epd.init(&mut feed)?;
        epd.begin_frame()?;
        sd.stream_bitmap(path, &mut |row| {
            feed();
            epd.write_rows(row)
        })?;
        epd.refresh(&mut feed)
    }

    fn render_message(
        &mut self,
        text: &str,
    ) -> Result<(), Self::PanelError> {
        let armed = self.watchdog_armed;
        let watchdog = &mut self.watchdog;
        self.epd.show_message(text, &mut || feed_if_armed(watchdog, armed))
    }

    fn sleep(&mut self) {
        if let Err(e) = self.epd.sleep() {
            log::warn!("Panel sleep failed: {}", e);
        }
    }
}

impl Watchdog for PhotoPainter {
    fn enable(
        &mut self,
        timeout_ms: u32,
        pause_on_debug: bool,
    ) {
        self.watchdog.pause_on_debug(pause_on_debug);
        self.watchdog.start(Duration::from_millis(u64::from(timeout_ms)));
        self.watchdog_armed = true;
    }

    fn feed(&mut self) { feed_if_armed(&mut self.watchdog, self.watchdog_armed); }
}

impl PowerLatch for PhotoPainter {
    fn power_off(&mut self) {
        log::info!("Cutting battery power");
        self.bat_off.set_low();
    }
}

impl RandomSource for PhotoPainter {
    fn next_u32(&mut self) -> u32 { self.rng.next_u32() }
}
