//! The frame's control loop.
//!
//! # States
//!
//! ```text
//! Initializing --(power gate, storage gate)--> Running --> Aborting(reason)
//!       |                                                        ^
//!       +------------------(gate failed)-------------------------+
//! ```
//!
//! Every iteration in `Running` samples the battery, drains the button tally,
//! shows an image when the [`LoopCounter`] reads zero and sleeps one cadence
//! tick with the watchdog fed on both sides of the sleep. `Aborting` always
//! ends in the shutdown coordinator: a forced restart arms the watchdog, every
//! other reason powers the board off.

mod buttons;
mod counter;

use embedded_hal_async::delay::DelayNs;

pub use self::buttons::{ButtonTally, DEBOUNCE_MS, Debouncer};
pub use self::counter::LoopCounter;
use crate::board::Board;
use crate::config::FrameConfig;
use crate::error::{ConfigError, Fault};
use crate::panel::{LOW_BATTERY_MESSAGE, NO_STORAGE_MESSAGE};
use crate::power::{PowerMonitor, PowerState};
use crate::selector::{DisplayOutcome, ImageSelector};
use crate::shutdown::{Outcome, arm_restart, graceful_shutdown};

// =============================================================================
// States
// =============================================================================

/// Why the loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    /// Battery below the cold-boot floor.
    CriticalVoltage,
    /// No SD card at startup.
    StorageAbsent,
    /// Battery below the run-time floor.
    LowBattery,
    /// Too many button presses within one iteration.
    ForcedRestart,
}

impl AbortReason {
    /// Fault behind the abort; a forced restart is user-requested.
    pub const fn fault(self) -> Option<Fault> {
        match self {
            Self::CriticalVoltage => Some(Fault::CriticalVoltage),
            Self::StorageAbsent => Some(Fault::StorageAbsent),
            Self::LowBattery => Some(Fault::LowVoltage),
            Self::ForcedRestart => None,
        }
    }
}

/// Controller state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Gates not yet passed.
    Initializing,
    /// Inside the main loop.
    Running,
    /// Terminal; shutdown has been handed over.
    Aborting(AbortReason),
}

// =============================================================================
// Controller
// =============================================================================

/// Cadence controller owning the board and all loop state.
pub struct Controller<'a, B: Board> {
    board: B,
    config: FrameConfig,
    buttons: &'a ButtonTally,
    counter: LoopCounter,
    selector: ImageSelector,
    phase: Phase,
    last_display: Option<DisplayOutcome>,
}

impl<'a, B: Board> Controller<'a, B> {
    /// Controller in `Initializing`, after checking `config`.
    pub fn new(
        board: B,
        config: FrameConfig,
        buttons: &'a ButtonTally,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            board,
            config,
            buttons,
            counter: LoopCounter::new(config.next_image_every),
            selector: ImageSelector::new(config.max_picture_index),
            phase: Phase::Initializing,
            last_display: None,
        })
    }

    pub fn phase(&self) -> Phase { self.phase }

    pub fn counter(&self) -> &LoopCounter { &self.counter }

    pub fn selector(&self) -> &ImageSelector { &self.selector }

    /// Outcome of the most recent display attempt.
    pub fn last_display(&self) -> Option<&DisplayOutcome> { self.last_display.as_ref() }

    pub fn board(&self) -> &B { &self.board }

    pub fn board_mut(&mut self) -> &mut B { &mut self.board }

    /// Run the power and storage gates; on success the controller is Running.
    pub fn enter(&mut self) -> Result<(), AbortReason> {
        log::info!("Checking for battery");
        let reading = self.board.read_power();
        match reading.boot_state(&self.config) {
            PowerState::NoBattery => log::info!("No battery connected"),
            PowerState::Unknown => {
                log::warn!("Battery voltage unknown, starting anyway");
                self.board.arm_charge_indicator();
            }
            PowerState::CriticalVoltage => {
                log::warn!("Low power: {:?} V", reading.volts);
                self.board.flash_low_power();
                return Err(AbortReason::CriticalVoltage);
            }
            state => {
                log::info!("Battery found: {:?}", state);
                self.board.arm_charge_indicator();
            }
        }

        if !self.board.storage_ready() {
            log::warn!("{}", NO_STORAGE_MESSAGE);
            if let Err(e) = self.board.render_message(NO_STORAGE_MESSAGE) {
                log::warn!("Rendering storage warning failed: {:?}", e);
            }
            return Err(AbortReason::StorageAbsent);
        }
        log::info!("SD Card found");

        if let Some(watchdog) = self.config.watchdog {
            log::info!("Enabling watchdog: {} ms", watchdog.timeout_ms);
            self.board.enable(watchdog.timeout_ms, watchdog.pause_on_debug);
        }

        self.phase = Phase::Running;
        Ok(())
    }

    /// One pass of the main loop, without the sleep.
    pub fn iterate(&mut self) -> Result<(), AbortReason> {
        log::info!("Main loop {}/{}", self.counter.value(), self.counter.period());

        let reading = self.board.read_power();
        match reading.run_state(&self.config) {
            PowerState::LowVoltage => {
                log::warn!("Battery low: {:?} V", reading.volts);
                if let Err(e) = self.board.render_message(LOW_BATTERY_MESSAGE) {
                    log::warn!("Rendering battery warning failed: {:?}", e);
                }
                return Err(AbortReason::LowBattery);
            }
            // A failed sample is no evidence of a flat battery
            PowerState::Unknown => log::warn!("Skipping battery check this iteration"),
            _ => {}
        }

        let presses = self.buttons.take();
        if presses > self.config.button_restart_threshold {
            log::warn!("Next button pressed {} times, enable restart", presses);
            return Err(AbortReason::ForcedRestart);
        }
        if presses > 0 {
            log::info!("Next button pressed");
            self.counter.rewind();
        }

        if self.counter.is_due() {
            log::info!("Displaying next image");
            let outcome = self.selector.select_and_display(&mut self.board);
            if let Some(fault) = outcome.fault() {
                log::warn!("No new image this time: {}", fault);
            }
            self.last_display = Some(outcome);
        }

        self.counter.advance();
        Ok(())
    }

    /// Run until the loop aborts and report how it ended.
    pub async fn run<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Outcome {
        if let Err(reason) = self.enter() {
            return self.abort(reason);
        }

        log::info!("Starting main loop");
        delay.delay_ms(self.config.settle_delay_ms).await;
        self.board.set_power_led(false);

        loop {
            if let Err(reason) = self.iterate() {
                return self.abort(reason);
            }
            self.feed_watchdog();
            delay.delay_ms(self.config.loop_delay_ms).await;
            self.feed_watchdog();
        }
    }

    fn feed_watchdog(&mut self) {
        if self.config.watchdog.is_some() {
            self.board.feed();
        }
    }

    fn abort(
        &mut self,
        reason: AbortReason,
    ) -> Outcome {
        match reason.fault() {
            Some(fault) => log::warn!("Aborting: {}", fault),
            None => log::warn!("Aborting: restart requested"),
        }
        self.phase = Phase::Aborting(reason);

        match reason {
            AbortReason::ForcedRestart => {
                arm_restart(&mut self.board, self.config.restart_timeout_ms);
                Outcome::RestartArmed
            }
            _ => {
                graceful_shutdown(&mut self.board);
                Outcome::PoweredOff(reason)
            }
        }
    }
}
