//! BMP header parsing and row conversion for the panel.
//!
//! Only what the frame needs is supported: uncompressed 24-bit bitmaps of
//! exactly the panel size. Rows are addressed by panel row, so the reader can
//! seek directly to each source row whether the file is stored bottom-up
//! (positive height, the common case) or top-down.

use crate::panel::{PANEL_HEIGHT, PANEL_ROW_BYTES, PANEL_WIDTH, PanelColor, pack_pair};

/// Bytes of file header plus the `BITMAPINFOHEADER` fields read here.
pub const BMP_HEADER_LEN: usize = 54;

/// Padded length of one 24-bit source row of panel width.
pub const BMP_ROW_BYTES: usize = (PANEL_WIDTH * 3 + 3) & !3;

/// Bytes of pixel data in a panel-sized file.
const PIXEL_DATA_LEN: u32 = (PANEL_HEIGHT * BMP_ROW_BYTES) as u32;

/// Reasons a file cannot be shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BitmapError {
    /// Fewer bytes than a BMP header.
    #[error("file too short for a BMP header")]
    Truncated,

    /// Missing the `BM` signature.
    #[error("not a BMP file")]
    NotBitmap,

    /// Only 24 bits per pixel are streamed.
    #[error("unsupported bit depth {0}")]
    BitDepth(u16),

    /// RLE and bitfield variants are not streamed.
    #[error("compressed bitmaps are not supported")]
    Compressed,

    /// The image must match the panel exactly.
    #[error("image is {width}x{height}, panel is 800x480")]
    Dimensions {
        /// Width found in the header.
        width: i32,
        /// Height found in the header (negative for top-down).
        height: i32,
    },

    /// Pixel data would start inside the header or run past 4 GiB.
    #[error("pixel data offset {0:#x} out of range")]
    DataOffset(u32),
}

/// Parsed layout of a panel-sized 24-bit bitmap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BmpHeader {
    /// Offset of the first pixel row in the file.
    pub data_offset: u32,
    /// Rows are stored bottom row first.
    pub bottom_up: bool,
}

fn u16_at(
    bytes: &[u8],
    at: usize,
) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn u32_at(
    bytes: &[u8],
    at: usize,
) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

impl BmpHeader {
    /// Parse the first [`BMP_HEADER_LEN`] bytes of a file.
    pub fn parse(bytes: &[u8]) -> Result<Self, BitmapError> {
        if bytes.len() < BMP_HEADER_LEN {
            return Err(BitmapError::Truncated);
        }
        if &bytes[0..2] != b"BM" {
            return Err(BitmapError::NotBitmap);
        }

        let data_offset = u32_at(bytes, 10);
        let width = u32_at(bytes, 18) as i32;
        let height = u32_at(bytes, 22) as i32;
        let bits_per_pixel = u16_at(bytes, 28);
        let compression = u32_at(bytes, 30);

        if bits_per_pixel != 24 {
            return Err(BitmapError::BitDepth(bits_per_pixel));
        }
        if compression != 0 {
            return Err(BitmapError::Compressed);
        }
        if width != PANEL_WIDTH as i32 || height.unsigned_abs() as usize != PANEL_HEIGHT {
            return Err(BitmapError::Dimensions { width, height });
        }

        // Keeps every row offset within u32
        if (data_offset as usize) < BMP_HEADER_LEN || data_offset.checked_add(PIXEL_DATA_LEN).is_none() {
            return Err(BitmapError::DataOffset(data_offset));
        }

        Ok(Self {
            data_offset,
            bottom_up: height > 0,
        })
    }

    /// File offset of the source row shown on panel row `row`.
    pub fn row_offset(
        &self,
        row: usize,
    ) -> u32 {
        let stored = if self.bottom_up { PANEL_HEIGHT - 1 - row } else { row };
        self.data_offset + (stored * BMP_ROW_BYTES) as u32
    }
}

/// Convert one BGR source row into a packed panel row.
///
/// `bgr` must hold at least `PANEL_WIDTH * 3` bytes; `out` receives
/// [`PANEL_ROW_BYTES`] bytes.
pub fn pack_row(
    bgr: &[u8],
    out: &mut [u8; PANEL_ROW_BYTES],
) {
    for (byte, pair) in out.iter_mut().zip(bgr.chunks_exact(6)) {
        let left = PanelColor::nearest([pair[2], pair[1], pair[0]]);
        let right = PanelColor::nearest([pair[5], pair[4], pair[3]]);
        *byte = pack_pair(left, right);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(
        width: i32,
        height: i32,
        bits: u16,
        compression: u32,
    ) -> [u8; BMP_HEADER_LEN] {
        let mut bytes = [0u8; BMP_HEADER_LEN];
        bytes[0..2].copy_from_slice(b"BM");
        set_data_offset(&mut bytes, 54);
        bytes[14..18].copy_from_slice(&40u32.to_le_bytes());
        bytes[18..22].copy_from_slice(&width.to_le_bytes());
        bytes[22..26].copy_from_slice(&height.to_le_bytes());
        bytes[26..28].copy_from_slice(&1u16.to_le_bytes());
        bytes[28..30].copy_from_slice(&bits.to_le_bytes());
        bytes[30..34].copy_from_slice(&compression.to_le_bytes());
        bytes
    }

    fn set_data_offset(
        bytes: &mut [u8; BMP_HEADER_LEN],
        offset: u32,
    ) {
        bytes[10..14].copy_from_slice(&offset.to_le_bytes());
    }

    #[test]
    fn test_parse_bottom_up() {
        let bmp = BmpHeader::parse(&header(800, 480, 24, 0)).unwrap();
        assert_eq!(bmp.data_offset, 54);
        assert!(bmp.bottom_up);
        // Panel row 0 is the last stored row
        assert_eq!(bmp.row_offset(0), 54 + 479 * 2400);
        assert_eq!(bmp.row_offset(479), 54);
    }

    #[test]
    fn test_parse_top_down() {
        let bmp = BmpHeader::parse(&header(800, -480, 24, 0)).unwrap();
        assert!(!bmp.bottom_up);
        assert_eq!(bmp.row_offset(0), 54);
        assert_eq!(bmp.row_offset(2), 54 + 2 * 2400);
    }

    #[test]
    fn test_rejects_unsupported_files() {
        assert_eq!(BmpHeader::parse(&[0u8; 10]), Err(BitmapError::Truncated));

        let mut not_bmp = header(800, 480, 24, 0);
        not_bmp[0] = b'P';
        assert_eq!(BmpHeader::parse(&not_bmp), Err(BitmapError::NotBitmap));

        assert_eq!(BmpHeader::parse(&header(800, 480, 8, 0)), Err(BitmapError::BitDepth(8)));
        assert_eq!(BmpHeader::parse(&header(800, 480, 24, 1)), Err(BitmapError::Compressed));
        assert_eq!(
            BmpHeader::parse(&header(480, 800, 24, 0)),
            Err(BitmapError::Dimensions {
                width: 480,
                height: 800
            })
        );
    }

    #[test]
    fn test_rejects_out_of_range_data_offset() {
        let mut corrupt = header(800, 480, 24, 0);
        set_data_offset(&mut corrupt, 0xFFFF_FF00);
        assert_eq!(BmpHeader::parse(&corrupt), Err(BitmapError::DataOffset(0xFFFF_FF00)));

        set_data_offset(&mut corrupt, 10);
        assert_eq!(BmpHeader::parse(&corrupt), Err(BitmapError::DataOffset(10)));
    }

    #[test]
    fn test_largest_accepted_offset_addresses_every_row() {
        let last = u32::MAX - 480 * 2400;
        let mut bytes = header(800, -480, 24, 0);
        set_data_offset(&mut bytes, last);
        let bmp = BmpHeader::parse(&bytes).unwrap();
        assert_eq!(bmp.row_offset(479), last + 479 * 2400);

        set_data_offset(&mut bytes, last + 1);
        assert_eq!(BmpHeader::parse(&bytes), Err(BitmapError::DataOffset(last + 1)));
    }

    #[test]
    fn test_pack_row_reads_bgr_order() {
        let mut bgr = [0xFFu8; BMP_ROW_BYTES];
        // Pixel 0 red, pixel 1 blue (stored as B, G, R)
        bgr[0..6].copy_from_slice(&[0, 0, 255, 255, 0, 0]);
        let mut out = [0u8; PANEL_ROW_BYTES];
        pack_row(&bgr, &mut out);
        assert_eq!(out[0], pack_pair(PanelColor::Red, PanelColor::Blue));
        assert!(out[1..].iter().all(|&b| b == pack_pair(PanelColor::White, PanelColor::White)));
    }

    #[test]
    fn test_row_stride_is_word_aligned() {
        assert_eq!(BMP_ROW_BYTES, 2400);
        assert_eq!(BMP_ROW_BYTES % 4, 0);
    }
}
