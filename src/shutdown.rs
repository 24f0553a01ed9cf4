//! The two exits from the control loop: cut power, or let the watchdog reset.

use crate::cadence::AbortReason;
use crate::error::Fault;
use crate::panel::Panel;

/// Hardware watchdog.
pub trait Watchdog {
    /// Start (or restart) the watchdog with the given timeout.
    fn enable(
        &mut self,
        timeout_ms: u32,
        pause_on_debug: bool,
    );

    /// Reload the watchdog counter.
    fn feed(&mut self);
}

/// Battery power latch.
pub trait PowerLatch {
    /// Disconnect the battery. Does not return on battery power; on USB power
    /// the board keeps running.
    fn power_off(&mut self);
}

/// How the control loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Controlled shutdown after an abort.
    PoweredOff(AbortReason),
    /// Watchdog armed with a short timeout and left unfed.
    RestartArmed,
    /// The board could not be brought up.
    InitFailed,
}

impl Outcome {
    /// Process exit code for hosted runs.
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InitFailed => 1,
            Self::PoweredOff(_) | Self::RestartArmed => 0,
        }
    }

    /// Fault that ended the run; `None` for a requested restart.
    pub const fn fault(self) -> Option<Fault> {
        match self {
            Self::PoweredOff(reason) => reason.fault(),
            Self::RestartArmed => None,
            Self::InitFailed => Some(Fault::InitFailure),
        }
    }
}

/// Send the panel to sleep and cut battery power.
pub fn graceful_shutdown<B: Panel + PowerLatch + ?Sized>(board: &mut B) {
    log::info!("finish");
    board.sleep();
    board.power_off();
}

/// Arm the watchdog to reset the device shortly; the caller must stop feeding.
pub fn arm_restart<W: Watchdog + ?Sized>(
    watchdog: &mut W,
    timeout_ms: u32,
) {
    log::warn!("Arming watchdog restart in {} ms", timeout_ms);
    watchdog.enable(timeout_ms, true);
}
