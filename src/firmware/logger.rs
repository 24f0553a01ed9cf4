//! Forwards `log` records from the core library to defmt over RTT.

use defmt::Display2Format;
use log::{Level, LevelFilter, Metadata, Record};

struct DefmtLogger;

impl log::Log for DefmtLogger {
    fn enabled(
        &self,
        _metadata: &Metadata,
    ) -> bool {
        true
    }

    fn log(
        &self,
        record: &Record,
    ) {
        let message = Display2Format(record.args());
        match record.level() {
            Level::Error => defmt::error!("{}", message),
            Level::Warn => defmt::warn!("{}", message),
            Level::Info => defmt::info!("{}", message),
            Level::Debug => defmt::debug!("{}", message),
            Level::Trace => defmt::trace!("{}", message),
        }
    }

    fn flush(&self) {}
}

static LOGGER: DefmtLogger = DefmtLogger;

/// Install the bridge. Must run before any task is spawned.
pub fn init() {
    // SAFETY: called once at the top of main, before any other code can log
    unsafe {
        log::set_logger_racy(&LOGGER).ok();
        log::set_max_level_racy(LevelFilter::Debug);
    }
}
