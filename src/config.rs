//! Frame configuration and cadence profiles.
//!
//! Two loop profiles exist and are chosen at compile time:
//!
//! - [`FrameConfig::GUARDED`] (default): 4 s tick with the hardware watchdog
//!   armed at twice the tick.
//! - [`FrameConfig::LEGACY`] (`legacy-cadence` feature): 5 s tick, no watchdog.
//!
//! # Compile-Time Validation
//!
//! Both presets are checked by `const` assertions at the bottom of this
//! file, so an inconsistent edit fails the build instead of the device.

use crate::error::ConfigError;

// =============================================================================
// Shared Constants
// =============================================================================

/// Highest index the `pic/NNNN.bmp` namespace can hold.
pub const MAX_PICTURE_INDEX: u16 = 9999;

/// Cold-boot floor: below this the frame refuses to start.
pub const CRITICAL_VOLTAGE: f32 = 3.1;

/// Run-time floor: below this the frame shows a warning and powers off.
pub const LOW_VOLTAGE: f32 = 3.3;

/// More presses than this within one iteration arm a watchdog restart.
pub const BUTTON_RESTART_THRESHOLD: u32 = 4;

/// Watchdog timeout used for a forced restart.
pub const RESTART_TIMEOUT_MS: u32 = 100;

/// Pause between passing the gates and the first iteration.
pub const SETTLE_DELAY_MS: u32 = 1000;

/// Longest timeout the RP2040 watchdog can hold (0xFF_FFFF us, halved by erratum RP2040-E1).
pub const WATCHDOG_MAX_TIMEOUT_MS: u32 = 8_388;

const _: () = assert!(CRITICAL_VOLTAGE < LOW_VOLTAGE);

// =============================================================================
// Configuration Types
// =============================================================================

/// Hardware watchdog settings for the run loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Reset if not fed within this many milliseconds.
    pub timeout_ms: u32,
    /// Stop the watchdog counter while a debugger halts the core.
    pub pause_on_debug: bool,
}

/// Tunables of the control loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameConfig {
    /// Cadence tick: sleep between loop iterations.
    pub loop_delay_ms: u32,
    /// Ticks between scheduled image changes.
    pub next_image_every: u32,
    /// Starting bound of the image search space.
    pub max_picture_index: u16,
    /// Minimum battery voltage accepted at cold boot.
    pub boot_min_voltage: f32,
    /// Minimum battery voltage accepted while running.
    pub run_min_voltage: f32,
    /// Button presses per iteration above which a restart is forced.
    pub button_restart_threshold: u32,
    /// Watchdog timeout armed for a forced restart.
    pub restart_timeout_ms: u32,
    /// Delay between the gates and the first iteration.
    pub settle_delay_ms: u32,
    /// Run-loop watchdog; `None` leaves it disabled.
    pub watchdog: Option<WatchdogConfig>,
}

impl FrameConfig {
    /// Watchdog-guarded loop: 4 s tick, an image roughly every 4 hours.
    pub const GUARDED: Self = Self {
        loop_delay_ms: 4000,
        next_image_every: 3600,
        max_picture_index: MAX_PICTURE_INDEX,
        boot_min_voltage: CRITICAL_VOLTAGE,
        run_min_voltage: LOW_VOLTAGE,
        button_restart_threshold: BUTTON_RESTART_THRESHOLD,
        restart_timeout_ms: RESTART_TIMEOUT_MS,
        settle_delay_ms: SETTLE_DELAY_MS,
        watchdog: Some(WatchdogConfig {
            timeout_ms: 8000,
            pause_on_debug: true,
        }),
    };

    /// First-generation loop: 5 s tick, 2880 ticks (about 4 hours), no watchdog.
    ///
    /// 720 ticks is about 1 hour, 1440 about 2 hours.
    pub const LEGACY: Self = Self {
        loop_delay_ms: 5000,
        next_image_every: 2880,
        watchdog: None,
        ..Self::GUARDED
    };

    /// Profile selected by the `legacy-cadence` feature.
    #[cfg(feature = "legacy-cadence")]
    pub const SELECTED: Self = Self::LEGACY;

    /// Profile selected by the `legacy-cadence` feature.
    #[cfg(not(feature = "legacy-cadence"))]
    pub const SELECTED: Self = Self::GUARDED;

    /// Check the configuration for internal consistency.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.next_image_every == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if self.max_picture_index == 0 || self.max_picture_index > MAX_PICTURE_INDEX {
            return Err(ConfigError::PictureIndexOutOfRange);
        }
        if self.boot_min_voltage >= self.run_min_voltage {
            return Err(ConfigError::ThresholdOrder);
        }
        if self.restart_timeout_ms == 0 {
            return Err(ConfigError::ZeroRestartTimeout);
        }
        if let Some(watchdog) = self.watchdog {
            if watchdog.timeout_ms <= self.loop_delay_ms {
                return Err(ConfigError::WatchdogTooShort);
            }
            if watchdog.timeout_ms > WATCHDOG_MAX_TIMEOUT_MS {
                return Err(ConfigError::WatchdogTooLong);
            }
        }
        Ok(())
    }

    /// Approximate time between scheduled image changes.
    pub const fn image_interval_ms(&self) -> u64 { self.loop_delay_ms as u64 * self.next_image_every as u64 }
}

impl Default for FrameConfig {
    fn default() -> Self { Self::SELECTED }
}

// Compile-time validation of the shipped presets
const _: () = assert!(FrameConfig::GUARDED.validate().is_ok());
const _: () = assert!(FrameConfig::LEGACY.validate().is_ok());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert_eq!(FrameConfig::GUARDED.validate(), Ok(()));
        assert_eq!(FrameConfig::LEGACY.validate(), Ok(()));
    }

    #[test]
    fn test_presets_share_power_policy() {
        let guarded = FrameConfig::GUARDED;
        let legacy = FrameConfig::LEGACY;
        assert_eq!(guarded.boot_min_voltage, legacy.boot_min_voltage);
        assert_eq!(guarded.run_min_voltage, legacy.run_min_voltage);
        assert_eq!(guarded.button_restart_threshold, legacy.button_restart_threshold);
        assert!(legacy.watchdog.is_none());
        assert_eq!(guarded.watchdog.map(|w| w.timeout_ms), Some(2 * guarded.loop_delay_ms));
    }

    #[test]
    fn test_image_interval_is_about_four_hours() {
        assert_eq!(FrameConfig::LEGACY.image_interval_ms(), 14_400_000);
        assert_eq!(FrameConfig::GUARDED.image_interval_ms(), 14_400_000);
    }

    #[test]
    fn test_rejects_zero_period() {
        let config = FrameConfig {
            next_image_every: 0,
            ..FrameConfig::GUARDED
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroPeriod));
    }

    #[test]
    fn test_rejects_picture_index_out_of_range() {
        let zero = FrameConfig {
            max_picture_index: 0,
            ..FrameConfig::GUARDED
        };
        let huge = FrameConfig {
            max_picture_index: 10_000,
            ..FrameConfig::GUARDED
        };
        assert_eq!(zero.validate(), Err(ConfigError::PictureIndexOutOfRange));
        assert_eq!(huge.validate(), Err(ConfigError::PictureIndexOutOfRange));
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let config = FrameConfig {
            boot_min_voltage: 3.4,
            ..FrameConfig::GUARDED
        };
        assert_eq!(config.validate(), Err(ConfigError::ThresholdOrder));
    }

    #[test]
    fn test_rejects_watchdog_shorter_than_tick() {
        let config = FrameConfig {
            watchdog: Some(WatchdogConfig {
                timeout_ms: 4000,
                pause_on_debug: true,
            }),
            ..FrameConfig::GUARDED
        };
        assert_eq!(config.validate(), Err(ConfigError::WatchdogTooShort));
    }

    #[test]
    fn test_rejects_watchdog_beyond_hardware() {
        let config = FrameConfig {
            loop_delay_ms: 5000,
            watchdog: Some(WatchdogConfig {
                timeout_ms: 10_000,
                pause_on_debug: true,
            }),
            ..FrameConfig::GUARDED
        };
        assert_eq!(config.validate(), Err(ConfigError::WatchdogTooLong));
    }
}
