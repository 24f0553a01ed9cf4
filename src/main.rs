//! PhotoPainter photo frame.
//!
//! On the RP2040 this is the embassy firmware driving the real board. On the
//! host the same controller runs against a directory standing in for the SD
//! card, with frames written out as PNG files.

#![cfg_attr(target_arch = "arm", no_std)]
#![cfg_attr(target_arch = "arm", no_main)]
// Crate-level lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

#[cfg(target_arch = "arm")]
mod firmware;
#[cfg(not(target_arch = "arm"))]
mod sim;

#[cfg(target_arch = "arm")]
use {defmt_rtt as _, panic_probe as _};

// Program metadata for `picotool info`
#[cfg(target_arch = "arm")]
#[unsafe(link_section = ".bi_entries")]
#[used]
pub static PICOTOOL_ENTRIES: [embassy_rp::binary_info::EntryAddr; 4] = [
    embassy_rp::binary_info::rp_program_name!(c"photo-frame"),
    embassy_rp::binary_info::rp_program_description!(c"PhotoPainter e-ink photo frame"),
    embassy_rp::binary_info::rp_cargo_version!(),
    embassy_rp::binary_info::rp_program_build_attribute!(),
];

#[cfg(target_arch = "arm")]
#[embassy_executor::main]
async fn main(spawner: embassy_executor::Spawner) { firmware::run(spawner).await }

#[cfg(not(target_arch = "arm"))]
fn main() { std::process::exit(sim::run()) }
