//! Control logic of the PhotoPainter e-ink photo frame.
//!
//! This crate holds everything that does not touch a register, so it builds
//! for the RP2040 and runs its tests on the host:
//!
//! - [`config`]: cadence profiles and power thresholds
//! - [`power`]: battery sensing and power-state classification
//! - [`storage`]: SD card gate and the mount guard
//! - [`panel`]: panel contract, palette and message rendering
//! - [`bitmap`]: BMP header parsing and row packing
//! - [`selector`]: random picture selection with a shrinking bound
//! - [`cadence`]: the control loop state machine
//! - [`shutdown`]: power-off and watchdog restart
//!
//! The firmware binary implements [`Board`] for the real hardware and
//! hands it to a [`Controller`].
//!
//! # no_std Compatibility
//!
//! The crate is `no_std` outside of tests. Logging goes through the `log`
//! facade; the firmware forwards it to defmt, the simulator to env_logger.

#![cfg_attr(not(test), no_std)]
// Crate-level lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

pub mod bitmap;
pub mod board;
pub mod cadence;
pub mod config;
pub mod error;
pub mod panel;
pub mod power;
pub mod selector;
pub mod shutdown;
pub mod storage;

#[cfg(test)]
mod mock;

// Re-export commonly used items
pub use board::Board;
pub use cadence::{AbortReason, ButtonTally, Controller, Debouncer, Phase};
pub use config::FrameConfig;
pub use error::{ConfigError, Fault};
pub use power::ChargeLine;
pub use shutdown::Outcome;
