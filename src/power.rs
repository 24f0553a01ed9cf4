//! Battery monitoring and power-state classification.
//!
//! The battery is sensed through three lines:
//!
//! - VBUS/battery sense (high = battery connected)
//! - the battery divider on an ADC input
//! - the charger's status output (active low = charging)
//!
//! [`PowerMonitor`] turns those raw signals into a [`PowerReading`] and a
//! [`PowerState`]. [`ChargeLine`] is the small piece of state shared with the
//! charge-edge handler, which drives the power LED on its own.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::config::FrameConfig;

// =============================================================================
// ADC Conversion
// =============================================================================

/// ADC reference voltage.
pub const ADC_REFERENCE_VOLTS: f32 = 3.3;

/// Number of codes of the 12-bit ADC.
pub const ADC_FULL_SCALE: u32 = 1 << 12;

/// The battery reaches the ADC through a 1/3 divider.
pub const DIVIDER_RATIO: f32 = 3.0;

/// Volts at the battery per ADC code.
pub const VOLTS_PER_COUNT: f32 = ADC_REFERENCE_VOLTS / ADC_FULL_SCALE as f32 * DIVIDER_RATIO;

/// Convert a raw ADC sample to battery volts.
#[inline]
pub fn raw_to_volts(raw: u16) -> f32 { f32::from(raw) * VOLTS_PER_COUNT }

// =============================================================================
// Collaborator Traits
// =============================================================================

/// Raw power-related signals provided by the board.
pub trait PowerSense {
    /// Take a fresh sample of the battery divider; `None` if the ADC failed.
    fn sample_raw_adc(&mut self) -> Option<u16>;

    /// Level of the VBUS/battery sense line.
    fn battery_present_signal(&mut self) -> bool;

    /// Whether the charger currently reports charging.
    fn charge_signal(&mut self) -> bool;

    /// Start reacting to charge-state edges (drive the power LED).
    fn arm_charge_indicator(&mut self);
}

/// Status LEDs.
pub trait Indicator {
    /// Switch the power LED.
    fn set_power_led(
        &mut self,
        on: bool,
    );

    /// Play the low-power pattern before refusing to boot.
    fn flash_low_power(&mut self);
}

// =============================================================================
// Power State
// =============================================================================

/// Battery state derived from one sampling instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PowerState {
    /// Not sampled yet, or the sample failed.
    #[default]
    Unknown,
    /// Running from USB only.
    NoBattery,
    /// Battery connected and being charged.
    Charging,
    /// Battery connected and supplying the board.
    Discharging,
    /// Below the run-time floor.
    LowVoltage,
    /// Below the cold-boot floor.
    CriticalVoltage,
}

/// One snapshot of the power signals.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PowerReading {
    /// Battery connected according to the sense line.
    pub present: bool,
    /// Charger status at sampling time.
    pub charging: bool,
    /// Battery voltage; only sampled when a battery is present, `None` if
    /// the sample failed.
    pub volts: Option<f32>,
}

impl PowerReading {
    fn classify(
        &self,
        floor: f32,
        below: PowerState,
    ) -> PowerState {
        match self.volts {
            _ if !self.present => PowerState::NoBattery,
            None => PowerState::Unknown,
            Some(volts) if volts < floor => below,
            Some(_) if self.charging => PowerState::Charging,
            Some(_) => PowerState::Discharging,
        }
    }

    /// Classification against the cold-boot floor.
    pub fn boot_state(
        &self,
        config: &FrameConfig,
    ) -> PowerState {
        self.classify(config.boot_min_voltage, PowerState::CriticalVoltage)
    }

    /// Classification against the run-time floor.
    pub fn run_state(
        &self,
        config: &FrameConfig,
    ) -> PowerState {
        self.classify(config.run_min_voltage, PowerState::LowVoltage)
    }
}

// =============================================================================
// Power Monitor
// =============================================================================

/// Battery queries built on top of the raw [`PowerSense`] signals.
pub trait PowerMonitor: PowerSense {
    /// True iff the sense line reports a connected battery.
    fn battery_present(&mut self) -> bool { self.battery_present_signal() }

    /// Fresh battery voltage sample.
    fn battery_voltage(&mut self) -> Option<f32> {
        let Some(raw) = self.sample_raw_adc() else {
            log::warn!("Battery voltage unavailable");
            return None;
        };
        let volts = raw_to_volts(raw);
        log::debug!("Raw battery measurement: {:#05x}, voltage: {} V", raw, volts);
        Some(volts)
    }

    /// Charger status.
    fn is_charging(&mut self) -> bool { self.charge_signal() }

    /// Sample all power signals at once.
    fn read_power(&mut self) -> PowerReading {
        let present = self.battery_present();
        PowerReading {
            present,
            charging: present && self.is_charging(),
            volts: if present { self.battery_voltage() } else { None },
        }
    }
}

impl<T: PowerSense + ?Sized> PowerMonitor for T {}

// =============================================================================
// Charge-Edge State
// =============================================================================

/// Charge-line state shared between the charge-edge handler and the loop.
///
/// Only plain atomic loads and stores are used, which the RP2040 (ARMv6-M)
/// supports without a critical section.
pub struct ChargeLine {
    armed: AtomicBool,
    charging: AtomicBool,
}

impl ChargeLine {
    /// Disarmed, not charging.
    pub const fn new() -> Self {
        Self {
            armed: AtomicBool::new(false),
            charging: AtomicBool::new(false),
        }
    }

    /// Let edges drive the power LED from now on.
    pub fn arm(&self) { self.armed.store(true, Ordering::Release); }

    /// Whether [`arm`](Self::arm) has been called.
    pub fn is_armed(&self) -> bool { self.armed.load(Ordering::Acquire) }

    /// Record the charger status without touching the LED.
    pub fn set_charging(
        &self,
        charging: bool,
    ) {
        self.charging.store(charging, Ordering::Release);
    }

    /// Record the charger status after an edge.
    ///
    /// Returns the level to drive the power LED to, or `None` while disarmed.
    pub fn on_edge(
        &self,
        charging: bool,
    ) -> Option<bool> {
        self.set_charging(charging);
        self.is_armed().then_some(charging)
    }

    /// Last charger status seen by the handler.
    pub fn is_charging(&self) -> bool { self.charging.load(Ordering::Acquire) }
}

impl Default for ChargeLine {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lines {
        raw: Option<u16>,
        present: bool,
        charging: bool,
        samples: u32,
    }

    impl PowerSense for Lines {
        fn sample_raw_adc(&mut self) -> Option<u16> {
            self.samples += 1;
            self.raw
        }

        fn battery_present_signal(&mut self) -> bool { self.present }

        fn charge_signal(&mut self) -> bool { self.charging }

        fn arm_charge_indicator(&mut self) {}
    }

    fn lines(volts: f32) -> Lines {
        Lines {
            raw: Some((volts / VOLTS_PER_COUNT) as u16),
            present: true,
            charging: false,
            samples: 0,
        }
    }

    #[test]
    fn test_conversion_matches_divider() {
        // Full scale is 3.3 V at the pin, 9.9 V at the battery
        assert!((raw_to_volts(4096 - 1) - 9.897_583).abs() < 1e-3);
        assert_eq!(raw_to_volts(0), 0.0);
        // 0x600 = 1536 counts: 1536 * 3.3 / 4096 * 3
        assert!((raw_to_volts(0x600) - 3.7125).abs() < 1e-4);
    }

    #[test]
    fn test_every_read_takes_a_fresh_sample() {
        let mut sense = lines(3.9);
        sense.battery_voltage();
        sense.battery_voltage();
        assert_eq!(sense.samples, 2);
    }

    #[test]
    fn test_no_battery_skips_sampling() {
        let mut sense = lines(0.0);
        sense.present = false;
        let reading = sense.read_power();
        assert_eq!(reading.volts, None);
        assert_eq!(sense.samples, 0);
        assert_eq!(reading.boot_state(&FrameConfig::GUARDED), PowerState::NoBattery);
        assert_eq!(reading.run_state(&FrameConfig::GUARDED), PowerState::NoBattery);
    }

    #[test]
    fn test_boot_floor() {
        let config = FrameConfig::GUARDED;
        assert_eq!(lines(3.0).read_power().boot_state(&config), PowerState::CriticalVoltage);
        // Between the floors: boot passes, the run loop rejects it
        let reading = lines(3.2).read_power();
        assert_eq!(reading.boot_state(&config), PowerState::Discharging);
        assert_eq!(reading.run_state(&config), PowerState::LowVoltage);
    }

    #[test]
    fn test_run_floor() {
        let config = FrameConfig::GUARDED;
        assert_eq!(lines(3.25).read_power().run_state(&config), PowerState::LowVoltage);
        assert_eq!(lines(3.9).read_power().run_state(&config), PowerState::Discharging);
    }

    #[test]
    fn test_charging_state() {
        let mut sense = lines(4.0);
        sense.charging = true;
        assert_eq!(sense.read_power().run_state(&FrameConfig::GUARDED), PowerState::Charging);
    }

    #[test]
    fn test_failed_sample_is_unknown_not_low() {
        let mut sense = lines(3.9);
        sense.raw = None;
        let reading = sense.read_power();
        assert_eq!(reading.volts, None);
        assert_eq!(reading.boot_state(&FrameConfig::GUARDED), PowerState::Unknown);
        assert_eq!(reading.run_state(&FrameConfig::GUARDED), PowerState::Unknown);
    }

    #[test]
    fn test_default_state_is_unknown() {
        assert_eq!(PowerState::default(), PowerState::Unknown);
    }

    #[test]
    fn test_charge_line_drives_led_only_when_armed() {
        let line = ChargeLine::new();
        assert_eq!(line.on_edge(true), None);
        // The level is still tracked for the polling path
        assert!(line.is_charging());

        line.arm();
        line.set_charging(false);
        assert!(!line.is_charging());
        assert_eq!(line.on_edge(true), Some(true));
        assert!(line.is_charging());
        assert_eq!(line.on_edge(false), Some(false));
        assert!(!line.is_charging());
    }
}
