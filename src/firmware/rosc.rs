//! Random words from the ring oscillator's RANDOMBIT output.

use embassy_rp::pac;
use photo_frame::selector::RandomSource;

/// Raw ROSC bits, whitened with a multiply-xorshift step.
///
/// Each bit is one sample of the free-running ring oscillator; consecutive
/// bits are correlated, hence the mixing.
#[derive(Default)]
pub struct Rosc;

impl Rosc {
    fn raw_word() -> u32 {
        let random_reg = pac::ROSC.randombit();
        let mut acc = 0u32;
        for _ in 0..32 {
            acc = (acc << 1) | u32::from(random_reg.read().randombit());
        }
        acc
    }
}

impl RandomSource for Rosc {
    fn next_u32(&mut self) -> u32 {
        let mut x = Self::raw_word().wrapping_mul(0x9E37_79B9);
        x ^= x >> 16;
        x = x.wrapping_mul(0x85EB_CA6B);
        x ^ (x >> 13)
    }
}
