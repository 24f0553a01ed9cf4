//! Scripted board and delay for host tests.

use embedded_hal_async::delay::DelayNs;

use crate::cadence::ButtonTally;
use crate::panel::Panel;
use crate::power::{Indicator, PowerSense, VOLTS_PER_COUNT};
use crate::selector::RandomSource;
use crate::shutdown::{PowerLatch, Watchdog};
use crate::storage::Storage;

/// In-memory board recording every collaborator call.
pub struct MockBoard {
    // Power
    pub present: bool,
    pub charging: bool,
    /// Battery voltage per sample; the last entry repeats.
    pub voltages: Vec<f32>,
    pub samples: usize,
    /// Every ADC sample fails while set.
    pub adc_fault: bool,
    pub charge_armed: bool,

    // LEDs
    pub power_led: Option<bool>,
    pub low_power_flashes: u32,

    // Storage
    pub card_inserted: bool,
    pub fail_mount: bool,
    pub mounted: bool,
    pub mounts: u32,
    pub unmounts: u32,
    pub pictures: Vec<u16>,
    pub exists_checks: u32,

    // Panel
    pub fail_render: bool,
    pub rendered: Vec<String>,
    pub rendered_while_mounted: bool,
    pub messages: Vec<String>,
    pub panel_asleep: bool,
    pub press_during_render: Option<&'static ButtonTally>,

    // Watchdog and latch
    pub watchdog_enables: Vec<(u32, bool)>,
    pub feeds: u32,
    pub feeds_since_last_enable: u32,
    pub powered_off: bool,
    pub panel_asleep_before_power_off: bool,

    // Random words to return in order; an LCG takes over once exhausted
    pub rng_words: Vec<u32>,
    rng_cursor: usize,
    rng_state: u32,
}

impl MockBoard {
    /// Healthy board on a 3.9 V battery with the given pictures on the card.
    pub fn with_pictures(pictures: &[u16]) -> Self {
        Self {
            present: true,
            charging: false,
            voltages: vec![3.9],
            samples: 0,
            adc_fault: false,
            charge_armed: false,
            power_led: None,
            low_power_flashes: 0,
            card_inserted: true,
            fail_mount: false,
            mounted: false,
            mounts: 0,
            unmounts: 0,
            pictures: pictures.to_vec(),
            exists_checks: 0,
            fail_render: false,
            rendered: Vec::new(),
            rendered_while_mounted: false,
            messages: Vec::new(),
            panel_asleep: false,
            press_during_render: None,
            watchdog_enables: Vec::new(),
            feeds: 0,
            feeds_since_last_enable: 0,
            powered_off: false,
            panel_asleep_before_power_off: false,
            rng_words: Vec::new(),
            rng_cursor: 0,
            rng_state: 0x1234_5678,
        }
    }
}

impl PowerSense for MockBoard {
    fn sample_raw_adc(&mut self) -> Option<u16> {
        if self.adc_fault {
            return None;
        }
        let volts = self
            .voltages
            .get(self.samples)
            .or(self.voltages.last())
            .copied()
            .unwrap_or_default();
        self.samples += 1;
        // Round to the nearest code so the reading lands on the scripted value
        Some((volts / VOLTS_PER_COUNT).round() as u16)
    }

    fn battery_present_signal(&mut self) -> bool { self.present }

    fn charge_signal(&mut self) -> bool { self.charging }

    fn arm_charge_indicator(&mut self) { self.charge_armed = true; }
}

impl Indicator for MockBoard {
    fn set_power_led(
        &mut self,
        on: bool,
    ) {
        self.power_led = Some(on);
    }

    fn flash_low_power(&mut self) { self.low_power_flashes += 1; }
}

impl Storage for MockBoard {
    type StorageError = &'static str;

    fn storage_ready(&mut self) -> bool { self.card_inserted }

    fn mount(&mut self) -> Result<(), Self::StorageError> {
        if self.fail_mount || !self.card_inserted {
            return Err("no FAT volume");
        }
        self.mounts += 1;
        self.mounted = true;
        Ok(())
    }

    fn unmount(&mut self) {
        self.unmounts += 1;
        self.mounted = false;
    }

    fn exists(
        &mut self,
        path: &str,
    ) -> bool {
        self.exists_checks += 1;
        self.mounted
            && self
                .pictures
                .iter()
                .any(|&index| crate::selector::picture_path(index).as_str() == path)
    }
}

impl Panel for MockBoard {
    type PanelError = &'static str;

    fn render_bitmap(
        &mut self,
        path: &str,
    ) -> Result<(), Self::PanelError> {
        if let Some(buttons) = self.press_during_render {
            buttons.press();
        }
        if self.fail_render {
            return Err("busy timeout");
        }
        self.rendered_while_mounted = self.mounted;
        self.rendered.push(String::from(path));
        Ok(())
    }

    fn render_message(
        &mut self,
        text: &str,
    ) -> Result<(), Self::PanelError> {
        if self.fail_render {
            return Err("busy timeout");
        }
        self.messages.push(String::from(text));
        Ok(())
    }

    fn sleep(&mut self) { self.panel_asleep = true; }
}

impl Watchdog for MockBoard {
    fn enable(
        &mut self,
        timeout_ms: u32,
        pause_on_debug: bool,
    ) {
        self.watchdog_enables.push((timeout_ms, pause_on_debug));
        self.feeds_since_last_enable = 0;
    }

    fn feed(&mut self) {
        self.feeds += 1;
        self.feeds_since_last_enable += 1;
    }
}

impl PowerLatch for MockBoard {
    fn power_off(&mut self) {
        self.panel_asleep_before_power_off = self.panel_asleep;
        self.powered_off = true;
    }
}

impl RandomSource for MockBoard {
    fn next_u32(&mut self) -> u32 {
        if let Some(&word) = self.rng_words.get(self.rng_cursor) {
            self.rng_cursor += 1;
            return word;
        }
        if !self.rng_words.is_empty() {
            self.rng_cursor = 1;
            return self.rng_words[0];
        }
        self.rng_state = self.rng_state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.rng_state
    }
}

/// Delay that returns immediately, recording each sleep.
pub struct MockDelay<'a> {
    pub sleeps: Vec<u32>,
    press: Option<(&'a ButtonTally, usize, u32)>,
}

impl MockDelay<'static> {
    pub fn new() -> Self {
        Self {
            sleeps: Vec::new(),
            press: None,
        }
    }
}

impl MockDelay<'_> {
    /// Deliver `count` presses during sleep number `at` (0 is the first).
    pub fn pressing<'b>(
        self,
        buttons: &'b ButtonTally,
        at: usize,
        count: u32,
    ) -> MockDelay<'b> {
        MockDelay {
            sleeps: self.sleeps,
            press: Some((buttons, at, count)),
        }
    }
}

impl DelayNs for MockDelay<'_> {
    async fn delay_ns(
        &mut self,
        _ns: u32,
    ) {
    }

    async fn delay_ms(
        &mut self,
        ms: u32,
    ) {
        match self.press {
            Some((buttons, at, count)) if at == self.sleeps.len() => (0..count).for_each(|_| buttons.press()),
            _ => {}
        }
        self.sleeps.push(ms);
    }
}
