//! Errors raised by the PhotoPainter board adapter.

use embedded_sdmmc::SdCardError;
use photo_frame::bitmap::BitmapError;

/// Board-level failure; every variant is reported through the collaborator
/// traits and logged by the controller.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// The card did not answer initialisation.
    #[error("SD card: {0:?}")]
    Card(SdCardError),

    /// FAT volume or file access failed.
    #[error("filesystem: {0:?}")]
    Filesystem(embedded_sdmmc::Error<SdCardError>),

    /// The file ended before the expected number of bytes.
    #[error("unexpected end of file")]
    ShortRead,

    /// Path not of the form `dir/name`.
    #[error("invalid picture path")]
    InvalidPath,

    /// Storage used without a mount.
    #[error("storage not mounted")]
    NotMounted,

    /// The card handle was not returned by an earlier session.
    #[error("SD card handle lost")]
    CardLost,

    /// The file is not a bitmap the panel can show.
    #[error(transparent)]
    Bitmap(#[from] BitmapError),

    /// An SPI write failed.
    #[error("SPI write failed")]
    Spi,

    /// The panel kept BUSY asserted.
    #[error("panel busy for more than {0} ms")]
    PanelBusy(u32),
}

impl From<embedded_sdmmc::Error<SdCardError>> for BoardError {
    fn from(e: embedded_sdmmc::Error<SdCardError>) -> Self { Self::Filesystem(e) }
}
