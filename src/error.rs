//! Error taxonomy for the frame controller.
//!
//! Only the fatal kinds change the controller's state (it moves to
//! `Aborting`); the others are logged where they occur and the loop carries on.
//! A hung iteration has no variant here: the hardware watchdog resets the
//! device instead.

/// Failure conditions the controller can observe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    /// Board bring-up failed before the controller was created.
    #[error("hardware initialisation failed")]
    InitFailure,

    /// No SD card (or no readable FAT volume) at startup.
    #[error("no SD card found")]
    StorageAbsent,

    /// Battery below the cold-boot minimum.
    #[error("battery voltage critical")]
    CriticalVoltage,

    /// Battery dropped below the run-time minimum.
    #[error("battery voltage low")]
    LowVoltage,

    /// Every candidate index was probed without finding a bitmap.
    #[error("no image available")]
    ImageNotFound,

    /// The panel failed to render a bitmap or message.
    #[error("render failed")]
    RenderFailure,
}

impl Fault {
    /// Whether this fault ends the control loop.
    pub const fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::InitFailure | Self::StorageAbsent | Self::CriticalVoltage | Self::LowVoltage
        )
    }
}

/// Rejected [`FrameConfig`](crate::config::FrameConfig) values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `next_image_every` must be at least one tick.
    #[error("image period must be at least one tick")]
    ZeroPeriod,

    /// The picture namespace is `0001..=9999`.
    #[error("max picture index must be within 1..=9999")]
    PictureIndexOutOfRange,

    /// The boot minimum must sit below the run-time minimum.
    #[error("boot voltage floor must be below the run-time floor")]
    ThresholdOrder,

    /// The watchdog would fire during a normal sleep.
    #[error("watchdog timeout must exceed the loop delay")]
    WatchdogTooShort,

    /// Beyond what the RP2040 watchdog counter can hold.
    #[error("watchdog timeout exceeds the hardware limit")]
    WatchdogTooLong,

    /// The forced-restart timeout must be non-zero.
    #[error("restart timeout must be non-zero")]
    ZeroRestartTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(Fault::InitFailure.is_fatal());
        assert!(Fault::StorageAbsent.is_fatal());
        assert!(Fault::CriticalVoltage.is_fatal());
        assert!(Fault::LowVoltage.is_fatal());
        assert!(!Fault::ImageNotFound.is_fatal());
        assert!(!Fault::RenderFailure.is_fatal());
    }

    #[test]
    fn test_fault_messages() {
        assert_eq!(Fault::StorageAbsent.to_string(), "no SD card found");
        assert_eq!(ConfigError::ZeroPeriod.to_string(), "image period must be at least one tick");
    }
}
