//! E-ink panel contract and the 7.3" six-colour panel's pixel format.
//!
//! # Pixel Format
//!
//! The panel takes 4 bits per pixel, two pixels per byte (left pixel in the
//! high nibble), rows top to bottom. Six colour codes are defined; `4` is
//! unused by the controller.
//!
//! # Messages
//!
//! Messages are drawn with `embedded-graphics` into a [`MessageBand`]: a
//! window of [`BAND_ROWS`] panel rows. [`render_message_bands`] redraws the
//! text once per band and hands each finished band to a sink, so a message
//! never needs a full 192 KB framebuffer.

use core::convert::Infallible;
use core::fmt::Debug;

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};
use profont::PROFONT_24_POINT;

// =============================================================================
// Panel Collaborator
// =============================================================================

/// Shown when no SD card is found at startup.
pub const NO_STORAGE_MESSAGE: &str = "No SD Card found";

/// Shown before powering off on a low battery.
pub const LOW_BATTERY_MESSAGE: &str = "Low battery, please charge.";

/// Display collaborator.
pub trait Panel {
    /// Error reported by the render calls.
    type PanelError: Debug;

    /// Render the bitmap at `path` (relative to the storage root).
    fn render_bitmap(
        &mut self,
        path: &str,
    ) -> Result<(), Self::PanelError>;

    /// Render a short text message.
    fn render_message(
        &mut self,
        text: &str,
    ) -> Result<(), Self::PanelError>;

    /// Put the panel into deep sleep before power is cut.
    fn sleep(&mut self) {}
}

// =============================================================================
// Geometry and Palette
// =============================================================================

/// Panel width in pixels.
pub const PANEL_WIDTH: usize = 800;

/// Panel height in pixels.
pub const PANEL_HEIGHT: usize = 480;

/// Bytes per packed panel row.
pub const PANEL_ROW_BYTES: usize = PANEL_WIDTH / 2;

/// Rows rendered per message band.
pub const BAND_ROWS: usize = 16;

/// Bytes per message band.
pub const BAND_BYTES: usize = PANEL_ROW_BYTES * BAND_ROWS;

const _: () = assert!(PANEL_HEIGHT % BAND_ROWS == 0);

/// Colours the panel can show, with their controller codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PanelColor {
    Black = 0x0,
    White = 0x1,
    Yellow = 0x2,
    Red = 0x3,
    Blue = 0x5,
    Green = 0x6,
}

impl PanelColor {
    /// All colours with their nominal RGB values.
    const PALETTE: [(Self, [u8; 3]); 6] = [
        (Self::Black, [0, 0, 0]),
        (Self::White, [255, 255, 255]),
        (Self::Yellow, [255, 255, 0]),
        (Self::Red, [255, 0, 0]),
        (Self::Blue, [0, 0, 255]),
        (Self::Green, [0, 255, 0]),
    ];

    /// Controller code of this colour.
    #[inline]
    pub const fn code(self) -> u8 { self as u8 }

    /// Colour for a controller code; `4` and codes above `6` are unused.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x0 => Some(Self::Black),
            0x1 => Some(Self::White),
            0x2 => Some(Self::Yellow),
            0x3 => Some(Self::Red),
            0x5 => Some(Self::Blue),
            0x6 => Some(Self::Green),
            _ => None,
        }
    }

    /// Nominal RGB value of this colour.
    pub fn rgb(self) -> [u8; 3] {
        Self::PALETTE
            .iter()
            .find(|(color, _)| *color == self)
            .map_or([255, 255, 255], |&(_, rgb)| rgb)
    }

    /// Nearest panel colour by squared RGB distance.
    pub fn nearest(rgb: [u8; 3]) -> Self {
        let mut best = Self::White;
        let mut best_distance = u32::MAX;
        for (color, reference) in Self::PALETTE {
            let distance: u32 = rgb
                .iter()
                .zip(reference)
                .map(|(&a, b)| {
                    let d = i32::from(a) - i32::from(b);
                    (d * d) as u32
                })
                .sum();
            if distance < best_distance {
                best = color;
                best_distance = distance;
            }
        }
        best
    }
}

/// Pack two pixels into one controller byte.
#[inline]
pub const fn pack_pair(
    left: PanelColor,
    right: PanelColor,
) -> u8 {
    (left.code() << 4) | right.code()
}

// =============================================================================
// Message Rendering
// =============================================================================

/// Packed window of [`BAND_ROWS`] panel rows starting at `top`.
///
/// `BinaryColor::On` draws black ink, `Off` white paper. Pixels outside the
/// window are discarded so full-panel drawing code can be reused per band.
pub struct MessageBand {
    top: usize,
    pixels: [u8; BAND_BYTES],
}

impl MessageBand {
    const PAPER: u8 = pack_pair(PanelColor::White, PanelColor::White);

    /// A blank band at the top of the panel.
    pub const fn new() -> Self {
        Self {
            top: 0,
            pixels: [Self::PAPER; BAND_BYTES],
        }
    }

    /// Move the window to start at panel row `top` and clear it.
    pub fn reset(
        &mut self,
        top: usize,
    ) {
        self.top = top;
        self.pixels.fill(Self::PAPER);
    }

    /// First panel row covered by the band.
    pub const fn top(&self) -> usize { self.top }

    /// Packed rows of the band.
    pub fn as_bytes(&self) -> &[u8] { &self.pixels }

    /// Colour at panel coordinates inside the band.
    pub fn pixel(
        &self,
        x: usize,
        y: usize,
    ) -> Option<PanelColor> {
        if x >= PANEL_WIDTH || y < self.top || y >= self.top + BAND_ROWS {
            return None;
        }
        let byte = self.pixels[(y - self.top) * PANEL_ROW_BYTES + x / 2];
        let code = if x % 2 == 0 { byte >> 4 } else { byte & 0x0F };
        PanelColor::from_code(code)
    }

    fn set(
        &mut self,
        x: usize,
        y: usize,
        color: PanelColor,
    ) {
        let index = (y - self.top) * PANEL_ROW_BYTES + x / 2;
        let byte = &mut self.pixels[index];
        *byte = if x % 2 == 0 {
            (*byte & 0x0F) | (color.code() << 4)
        } else {
            (*byte & 0xF0) | color.code()
        };
    }
}

impl Default for MessageBand {
    fn default() -> Self { Self::new() }
}

impl OriginDimensions for MessageBand {
    fn size(&self) -> Size { Size::new(PANEL_WIDTH as u32, PANEL_HEIGHT as u32) }
}

impl DrawTarget for MessageBand {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(
        &mut self,
        pixels: I,
    ) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as usize, point.y as usize);
            if x >= PANEL_WIDTH || y < self.top || y >= self.top + BAND_ROWS {
                continue;
            }
            let ink = match color {
                BinaryColor::On => PanelColor::Black,
                BinaryColor::Off => PanelColor::White,
            };
            self.set(x, y, ink);
        }
        Ok(())
    }
}

/// Draw `text` centred on a white panel, band by band.
///
/// `sink` receives the packed bands top to bottom; together they cover the
/// whole panel. The first sink error stops rendering and is returned.
pub fn render_message_bands<E>(
    text: &str,
    mut sink: impl FnMut(&[u8]) -> Result<(), E>,
) -> Result<(), E> {
    let character_style = MonoTextStyle::new(&PROFONT_24_POINT, BinaryColor::On);
    let text_style = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Middle)
        .build();
    let center = Point::new((PANEL_WIDTH / 2) as i32, (PANEL_HEIGHT / 2) as i32);
    let message = Text::with_text_style(text, center, character_style, text_style);

    let mut band = MessageBand::new();
    for top in (0..PANEL_HEIGHT).step_by(BAND_ROWS) {
        band.reset(top);
        let Ok(_) = message.draw(&mut band);
        sink(band.as_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_maps_primaries() {
        assert_eq!(PanelColor::nearest([0, 0, 0]), PanelColor::Black);
        assert_eq!(PanelColor::nearest([250, 250, 250]), PanelColor::White);
        assert_eq!(PanelColor::nearest([240, 10, 20]), PanelColor::Red);
        assert_eq!(PanelColor::nearest([20, 30, 200]), PanelColor::Blue);
        assert_eq!(PanelColor::nearest([10, 200, 40]), PanelColor::Green);
        assert_eq!(PanelColor::nearest([230, 220, 30]), PanelColor::Yellow);
    }

    #[test]
    fn test_codes_round_trip_and_skip_four() {
        for (color, _) in PanelColor::PALETTE {
            assert_eq!(PanelColor::from_code(color.code()), Some(color));
            assert_eq!(PanelColor::nearest(color.rgb()), color);
        }
        assert_eq!(PanelColor::from_code(4), None);
        assert_eq!(PanelColor::from_code(7), None);
    }

    #[test]
    fn test_pack_pair_puts_left_pixel_high() {
        assert_eq!(pack_pair(PanelColor::Black, PanelColor::White), 0x01);
        assert_eq!(pack_pair(PanelColor::Green, PanelColor::Blue), 0x65);
    }

    #[test]
    fn test_band_discards_pixels_outside_window() {
        let mut band = MessageBand::new();
        band.reset(BAND_ROWS);
        let pixels = [
            Pixel(Point::new(3, 0), BinaryColor::On),
            Pixel(Point::new(3, BAND_ROWS as i32), BinaryColor::On),
            Pixel(Point::new(-1, BAND_ROWS as i32), BinaryColor::On),
        ];
        band.draw_iter(pixels).unwrap();
        assert_eq!(band.pixel(3, BAND_ROWS), Some(PanelColor::Black));
        assert_eq!(band.pixel(2, BAND_ROWS), Some(PanelColor::White));
        assert_eq!(band.pixel(3, 0), None);
    }

    #[test]
    fn test_message_covers_panel_and_inks_only_the_middle() {
        let mut bands = 0;
        let mut inked_rows = Vec::new();
        let result: Result<(), ()> = render_message_bands(NO_STORAGE_MESSAGE, |bytes| {
            assert_eq!(bytes.len(), BAND_BYTES);
            let paper = pack_pair(PanelColor::White, PanelColor::White);
            if bytes.iter().any(|&b| b != paper) {
                inked_rows.push(bands * BAND_ROWS);
            }
            bands += 1;
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(bands, PANEL_HEIGHT / BAND_ROWS);
        assert!(!inked_rows.is_empty());
        // 24pt text centred vertically stays well away from the edges
        assert!(inked_rows.iter().all(|&top| top > 160 && top < 320));
    }

    #[test]
    fn test_message_stops_at_first_sink_error() {
        let mut calls = 0;
        let result = render_message_bands(LOW_BATTERY_MESSAGE, |_| {
            calls += 1;
            if calls == 3 { Err("spi") } else { Ok(()) }
        });
        assert_eq!(result, Err("spi"));
        assert_eq!(calls, 3);
    }
}
