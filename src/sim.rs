//! Host dry run of the frame.
//!
//! A directory stands in for the SD card (`<card>/pic/NNNN.bmp`) and every
//! panel refresh is written to `<out>/frame-NNN.png`. The battery drains a
//! little on each sample, so the run ends with the low battery message.
//!
//! ```text
//! photo-frame <card-dir> [out-dir]
//! ```

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use std::{env, fs};

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::{OutputSettingsBuilder, SimulatorDisplay};
use embedded_hal_async::delay::DelayNs;
use photo_frame::bitmap::{BitmapError, BmpHeader, pack_row};
use photo_frame::panel::{PANEL_HEIGHT, PANEL_ROW_BYTES, PANEL_WIDTH, Panel, PanelColor, render_message_bands};
use photo_frame::power::{Indicator, PowerSense, VOLTS_PER_COUNT};
use photo_frame::selector::RandomSource;
use photo_frame::shutdown::{PowerLatch, Watchdog};
use photo_frame::storage::Storage;
use photo_frame::{ButtonTally, Controller, FrameConfig, Outcome};

// =============================================================================
// Simulation Parameters
// =============================================================================

/// Battery voltage at power-on.
const START_VOLTS: f32 = 3.9;

/// Voltage lost per ADC sample.
const DRAIN_PER_SAMPLE: f32 = 0.002;

/// Wall-clock speed-up of every delay.
const TIME_SCALE: u32 = 1000;

/// A simulated button press lands every this many delays.
const PRESS_EVERY: u32 = 100;

static BUTTONS: ButtonTally = ButtonTally::new();

#[derive(Debug, thiserror::Error)]
enum SimError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Bitmap(#[from] BitmapError),
    #[error("png: {0}")]
    Png(String),
}

// =============================================================================
// Simulated Board
// =============================================================================

struct SimBoard {
    card: Option<PathBuf>,
    mounted: bool,
    out_dir: PathBuf,
    frames: u32,
    display: SimulatorDisplay<Rgb888>,
    volts: f32,
    rng: u32,
}

impl SimBoard {
    fn new(
        card: Option<PathBuf>,
        out_dir: PathBuf,
    ) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0x9E37_79B9, |elapsed| elapsed.subsec_nanos());
        Self {
            card,
            mounted: false,
            out_dir,
            frames: 0,
            display: SimulatorDisplay::new(Size::new(PANEL_WIDTH as u32, PANEL_HEIGHT as u32)),
            volts: START_VOLTS,
            rng: seed | 1,
        }
    }

    /// Paint one packed panel row.
    fn blit_row(
        &mut self,
        row: usize,
        packed: &[u8],
    ) {
        let pixels = packed.iter().enumerate().flat_map(|(i, &byte)| {
            [(2 * i, byte >> 4), (2 * i + 1, byte & 0x0F)].map(|(x, code)| {
                let [r, g, b] = PanelColor::from_code(code).unwrap_or(PanelColor::White).rgb();
                Pixel(Point::new(x as i32, row as i32), Rgb888::new(r, g, b))
            })
        });
        let Ok(()) = self.display.draw_iter(pixels);
    }

    /// Write the current frame as the next PNG.
    fn save_frame(&mut self) -> Result<(), SimError> {
        let path = self.out_dir.join(format!("frame-{:03}.png", self.frames));
        self.frames += 1;
        self.display
            .to_rgb_output_image(&OutputSettingsBuilder::new().build())
            .save_png(&path)
            .map_err(|e| SimError::Png(e.to_string()))?;
        log::info!("Refreshed panel -> {}", path.display());
        Ok(())
    }

    fn draw_bitmap(
        &mut self,
        file: &Path,
    ) -> Result<(), SimError> {
        let bytes = fs::read(file)?;
        let header = BmpHeader::parse(&bytes)?;
        let mut packed = [0u8; PANEL_ROW_BYTES];
        for row in 0..PANEL_HEIGHT {
            let start = header.row_offset(row) as usize;
            let source = bytes.get(start..start + PANEL_WIDTH * 3).ok_or(BitmapError::Truncated)?;
            pack_row(source, &mut packed);
            self.blit_row(row, &packed);
        }
        Ok(())
    }
}

impl PowerSense for SimBoard {
    fn sample_raw_adc(&mut self) -> Option<u16> {
        let raw = (self.volts / VOLTS_PER_COUNT).round() as u16;
        self.volts -= DRAIN_PER_SAMPLE;
        Some(raw)
    }

    fn battery_present_signal(&mut self) -> bool { true }

    fn charge_signal(&mut self) -> bool { false }

    fn arm_charge_indicator(&mut self) { log::debug!("Charge indicator armed"); }
}

impl Indicator for SimBoard {
    fn set_power_led(
        &mut self,
        on: bool,
    ) {
        log::debug!("Power LED {}", if on { "on" } else { "off" });
    }

    fn flash_low_power(&mut self) { log::warn!("Power LED flashing: battery critical"); }
}

impl Storage for SimBoard {
    type StorageError = &'static str;

    fn storage_ready(&mut self) -> bool { self.card.as_deref().is_some_and(Path::is_dir) }

    fn mount(&mut self) -> Result<(), Self::StorageError> {
        if !self.storage_ready() {
            return Err("card directory missing");
        }
        self.mounted = true;
        Ok(())
    }

    fn unmount(&mut self) { self.mounted = false; }

    fn exists(
        &mut self,
        path: &str,
    ) -> bool {
        match &self.card {
            Some(card) if self.mounted => card.join(path).is_file(),
            _ => false,
        }
    }
}

impl Panel for SimBoard {
    type PanelError = SimError;

    fn render_bitmap(
        &mut self,
        path: &str,
    ) -> Result<(), Self::PanelError> {
        let Some(file) = self.card.as_ref().map(|card| card.join(path)) else {
            return Err(SimError::Io(std::io::ErrorKind::NotFound.into()));
        };
        self.draw_bitmap(&file)?;
        self.save_frame()
    }

    fn render_message(
        &mut self,
        text: &str,
    ) -> Result<(), Self::PanelError> {
        let mut row = 0;
        render_message_bands(text, |band| {
            for packed in band.chunks_exact(PANEL_ROW_BYTES) {
                self.blit_row(row, packed);
                row += 1;
            }
            Ok::<(), SimError>(())
        })?;
        self.save_frame()
    }

    fn sleep(&mut self) { log::debug!("Panel asleep"); }
}

impl Watchdog for SimBoard {
    fn enable(
        &mut self,
        timeout_ms: u32,
        pause_on_debug: bool,
    ) {
        log::info!("Watchdog enabled: {} ms (pause on debug: {})", timeout_ms, pause_on_debug);
    }

    fn feed(&mut self) { log::trace!("Watchdog fed"); }
}

impl PowerLatch for SimBoard {
    fn power_off(&mut self) { log::info!("Battery latch released"); }
}

impl RandomSource for SimBoard {
    fn next_u32(&mut self) -> u32 {
        // xorshift32
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 17;
        self.rng ^= self.rng << 5;
        self.rng
    }
}

// =============================================================================
// Time
// =============================================================================

/// Delay running [`TIME_SCALE`] times faster than requested.
struct SimDelay {
    delays: u32,
}

impl DelayNs for SimDelay {
    async fn delay_ns(
        &mut self,
        ns: u32,
    ) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns / TIME_SCALE)));
    }

    async fn delay_ms(
        &mut self,
        ms: u32,
    ) {
        std::thread::sleep(Duration::from_micros(u64::from(ms) * 1000 / u64::from(TIME_SCALE)));
        self.delays += 1;
        if self.delays % PRESS_EVERY == 0 {
            log::info!("Button pressed");
            BUTTONS.press();
        }
    }
}

// =============================================================================
// Entry
// =============================================================================

/// Run the frame once and return its exit code.
pub fn run() -> i32 {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args_os().skip(1);
    let card = args.next().map(PathBuf::from);
    let out_dir = args.next().map_or_else(|| PathBuf::from("frames"), PathBuf::from);

    if let Err(e) = fs::create_dir_all(&out_dir) {
        return init_failed(format_args!("cannot create {}: {}", out_dir.display(), e));
    }

    let board = SimBoard::new(card, out_dir);
    let mut controller = match Controller::new(board, FrameConfig::SELECTED, &BUTTONS) {
        Ok(controller) => controller,
        Err(e) => return init_failed(format_args!("invalid frame configuration: {e}")),
    };

    let mut delay = SimDelay { delays: 0 };
    let outcome = embassy_futures::block_on(controller.run(&mut delay));
    let frames = controller.board().frames;
    match outcome.fault() {
        Some(fault) => log::info!("Finished after {} frames: {}", frames, fault),
        None => log::info!("Finished after {} frames: restart armed", frames),
    }
    outcome.exit_code()
}

fn init_failed(detail: std::fmt::Arguments<'_>) -> i32 {
    let outcome = Outcome::InitFailed;
    if let Some(fault) = outcome.fault() {
        log::error!("{}: {}", fault, detail);
    }
    outcome.exit_code()
}
