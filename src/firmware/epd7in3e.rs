//! Blocking driver for the 7.3" six-colour e-paper panel (800x480, 4 bpp).
//!
//! There is no framebuffer: a frame is streamed row by row between
//! [`Epd7in3e::begin_frame`] and [`Epd7in3e::refresh`], so the RP2040 never
//! holds more than one packed row or one message band.
//!
//! A full refresh takes around 20 s, longer than the watchdog can be set to.
//! Every busy-wait therefore takes a `feed` callback that is invoked while
//! polling, and gives up after [`BUSY_TIMEOUT_MS`].

use embassy_rp::gpio::{Input, Output};
use embassy_rp::peripherals::SPI1;
use embassy_rp::spi::{Blocking, Config as SpiConfig, Spi};
use embassy_time::{Duration, Instant, block_for};
use photo_frame::panel::render_message_bands;

use super::error::BoardError;

/// Longest accepted busy period.
pub const BUSY_TIMEOUT_MS: u32 = 45_000;

const BUSY_POLL_MS: u64 = 10;

// Controller commands
const PSR: u8 = 0x00;
const PWR: u8 = 0x01;
const POF: u8 = 0x02;
const POFS: u8 = 0x03;
const PON: u8 = 0x04;
const BTST1: u8 = 0x05;
const BTST2: u8 = 0x06;
const DSLP: u8 = 0x07;
const BTST3: u8 = 0x08;
const DTM: u8 = 0x10;
const DRF: u8 = 0x12;
const PLL: u8 = 0x30;
const CDI: u8 = 0x50;
const TCON: u8 = 0x60;
const TRES: u8 = 0x61;
const T_VDCS: u8 = 0x84;
const PWS: u8 = 0xE3;
const CMDH: u8 = 0xAA;

/// Deep sleep check code.
const DSLP_CHECK: u8 = 0xA5;

/// Register writes run after reset, in order.
const INIT_SEQUENCE: &[(u8, &[u8])] = &[
    (CMDH, &[0x49, 0x55, 0x20, 0x08, 0x09, 0x18]),
    (PWR, &[0x3F]),
    (PSR, &[0x5F, 0x69]),
    (POFS, &[0x00, 0x54, 0x00, 0x44]),
    (BTST1, &[0x40, 0x1F, 0x1F, 0x2C]),
    (BTST2, &[0x6F, 0x1F, 0x17, 0x49]),
    (BTST3, &[0x6F, 0x1F, 0x1F, 0x22]),
    (PLL, &[0x03]),
    (CDI, &[0x3F]),
    (TCON, &[0x02, 0x00]),
    // 800 x 480
    (TRES, &[0x03, 0x20, 0x01, 0xE0]),
    (T_VDCS, &[0x01]),
    (PWS, &[0x2F]),
];

/// 7.3" e-paper panel on SPI1.
pub struct Epd7in3e {
    spi: Spi<'static, SPI1, Blocking>,
    cs: Output<'static>,
    dc: Output<'static>,
    rst: Output<'static>,
    busy: Input<'static>,
    power: Output<'static>,
}

impl Epd7in3e {
    /// Create the driver; the panel stays unpowered until [`init`](Self::init).
    pub fn new(
        spi: Spi<'static, SPI1, Blocking>,
        cs: Output<'static>,
        dc: Output<'static>,
        rst: Output<'static>,
        busy: Input<'static>,
        power: Output<'static>,
    ) -> Self {
        Self {
            spi,
            cs,
            dc,
            rst,
            busy,
            power,
        }
    }

    /// Power the panel, reset it and load the register set.
    pub fn init(
        &mut self,
        feed: &mut dyn FnMut(),
    ) -> Result<(), BoardError> {
        self.power.set_high();
        self.reset();
        self.wait_idle(feed)?;
        block_for(Duration::from_millis(30));

        for &(command, data) in INIT_SEQUENCE {
            self.write_command(command)?;
            self.write_data(data)?;
        }

        self.write_command(PON)?;
        self.wait_idle(feed)
    }

    /// Start a frame; follow with exactly 480 packed rows.
    pub fn begin_frame(&mut self) -> Result<(), BoardError> { self.write_command(DTM) }

    /// Send packed pixel data of the current frame.
    pub fn write_rows(
        &mut self,
        rows: &[u8],
    ) -> Result<(), BoardError> {
        self.write_data(rows)
    }

    /// Show the streamed frame.
    pub fn refresh(
        &mut self,
        feed: &mut dyn FnMut(),
    ) -> Result<(), BoardError> {
        self.write_command(PON)?;
        self.wait_idle(feed)?;

        // Second setting of the booster
        self.write_command(BTST2)?;
        self.write_data(&[0x6F, 0x1F, 0x17, 0x49])?;

        self.write_command(DRF)?;
        self.write_data(&[0x00])?;
        self.wait_idle(feed)?;

        self.write_command(POF)?;
        self.write_data(&[0x00])?;
        self.wait_idle(feed)
    }

    /// Full-screen text message: init, one frame of message bands, refresh.
    pub fn show_message(
        &mut self,
        text: &str,
        feed: &mut dyn FnMut(),
    ) -> Result<(), BoardError> {
        self.init(feed)?;
        self.begin_frame()?;
        render_message_bands(text, |band| self.write_rows(band))?;
        self.refresh(feed)
    }

    /// Enter deep sleep and cut the panel supply.
    pub fn sleep(&mut self) -> Result<(), BoardError> {
        self.write_command(DSLP)?;
        self.write_data(&[DSLP_CHECK])?;
        block_for(Duration::from_millis(100));
        self.power.set_low();
        Ok(())
    }

    fn reset(&mut self) {
        self.rst.set_high();
        block_for(Duration::from_millis(20));
        self.rst.set_low();
        block_for(Duration::from_millis(2));
        self.rst.set_high();
        block_for(Duration::from_millis(20));
    }

    /// Poll BUSY (low while busy) until idle or timeout.
    fn wait_idle(
        &mut self,
        feed: &mut dyn FnMut(),
    ) -> Result<(), BoardError> {
        let start = Instant::now();
        while self.busy.is_low() {
            if start.elapsed() > Duration::from_millis(u64::from(BUSY_TIMEOUT_MS)) {
                return Err(BoardError::PanelBusy(BUSY_TIMEOUT_MS));
            }
            feed();
            block_for(Duration::from_millis(BUSY_POLL_MS));
        }
        Ok(())
    }

    /// Send a command byte (DC low, CS low during transfer).
    fn write_command(
        &mut self,
        command: u8,
    ) -> Result<(), BoardError> {
        self.cs.set_low();
        self.dc.set_low();
        let result = self.spi.blocking_write(&[command]);
        self.cs.set_high();
        result.map_err(|_| BoardError::Spi)
    }

    /// Send data bytes (DC high, CS low during transfer).
    fn write_data(
        &mut self,
        data: &[u8],
    ) -> Result<(), BoardError> {
        self.cs.set_low();
        self.dc.set_high();
        let result = self.spi.blocking_write(data);
        self.cs.set_high();
        result.map_err(|_| BoardError::Spi)
    }
}

/// SPI configuration for the panel.
///
/// The controller accepts up to 20 MHz on writes; 10 MHz leaves margin for
/// the ribbon cable.
pub fn panel_spi_config() -> SpiConfig {
    let mut config = SpiConfig::default();
    config.frequency = 10_000_000; // 10MHz
    config
}
