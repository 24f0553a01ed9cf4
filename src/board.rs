//! Everything the controller needs from the hardware, as one bound.

use crate::panel::Panel;
use crate::power::{Indicator, PowerSense};
use crate::selector::RandomSource;
use crate::shutdown::{PowerLatch, Watchdog};
use crate::storage::Storage;

/// A complete board: power sensing, LEDs, storage, panel, watchdog, power
/// latch and a random source.
pub trait Board: PowerSense + Indicator + Storage + Panel + Watchdog + PowerLatch + RandomSource {}

impl<T> Board for T where T: PowerSense + Indicator + Storage + Panel + Watchdog + PowerLatch + RandomSource + ?Sized {}
