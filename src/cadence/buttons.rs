//! Button press tally shared with the button edge handler, and the
//! debounce filter the handler runs before counting a press.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Presses seen since the controller last looked.
///
/// The RP2040 has no atomic read-modify-write, so the count sits behind a
/// critical section. The handler only ever calls [`press`](Self::press); the
/// controller drains it once per iteration with [`take`](Self::take).
pub struct ButtonTally {
    presses: Mutex<CriticalSectionRawMutex, Cell<u32>>,
}

impl ButtonTally {
    /// Empty tally.
    pub const fn new() -> Self {
        Self {
            presses: Mutex::new(Cell::new(0)),
        }
    }

    /// Record one press.
    pub fn press(&self) { self.presses.lock(|presses| presses.set(presses.get().saturating_add(1))); }

    /// Return the presses so far and reset the tally.
    pub fn take(&self) -> u32 { self.presses.lock(|presses| presses.replace(0)) }

    /// Presses so far, without resetting.
    pub fn pending(&self) -> u32 { self.presses.lock(Cell::get) }
}

impl Default for ButtonTally {
    fn default() -> Self { Self::new() }
}

/// Level changes closer together than this are contact bounce.
pub const DEBOUNCE_MS: u64 = 50;

/// Time-based debounce for an active-low button.
///
/// Timestamps are milliseconds from any monotonic clock, so the filter runs
/// the same against embassy-time on the board and against fixed values in
/// tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct Debouncer {
    was_pressed: bool,
    last_change_ms: Option<u64>,
}

impl Debouncer {
    /// Released, no change seen yet.
    pub const fn new() -> Self {
        Self {
            was_pressed: false,
            last_change_ms: None,
        }
    }

    /// Feed the level read after an edge; true only for an accepted press.
    pub fn just_pressed(
        &mut self,
        is_low: bool,
        now_ms: u64,
    ) -> bool {
        if is_low == self.was_pressed {
            return false;
        }
        match self.last_change_ms {
            Some(last) if now_ms.saturating_sub(last) < DEBOUNCE_MS => return false,
            _ => {}
        }

        self.was_pressed = is_low;
        self.last_change_ms = Some(now_ms);
        is_low
    }
}
