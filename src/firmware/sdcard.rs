//! SD card slot on SPI0, read through `embedded-sdmmc`.
//!
//! The card is owned by the slot between sessions. [`SdSlot::mount`] resets
//! and re-initialises it (it may have been swapped), opens the first FAT
//! volume and its root directory; [`SdSlot::unmount`] closes both and takes
//! the card back. Nothing stays open between display operations.

use embassy_rp::gpio::Output;
use embassy_rp::peripherals::SPI0;
use embassy_rp::spi::{Blocking, Config as SpiConfig, Spi};
use embassy_time::Delay;
use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};
use embedded_sdmmc::{Mode, RawDirectory, RawFile, RawVolume, SdCard, TimeSource, Timestamp, VolumeIdx, VolumeManager};
use photo_frame::bitmap::{BMP_HEADER_LEN, BMP_ROW_BYTES, BmpHeader, pack_row};
use photo_frame::panel::{PANEL_HEIGHT, PANEL_ROW_BYTES};

use super::error::BoardError;

/// Card identification runs at no more than 400 kHz.
const INIT_FREQUENCY: u32 = 400_000;

/// Transfer clock once the card is initialised.
const DATA_FREQUENCY: u32 = 16_000_000;

type CardSpi = ExclusiveDevice<Spi<'static, SPI0, Blocking>, Output<'static>, NoDelay>;
type Card = SdCard<CardSpi, Delay>;
type Volumes = VolumeManager<Card, FixedTimeSource>;

/// Fixed timestamp source; the frame only reads.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedTimeSource;

impl TimeSource for FixedTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        // 2026-01-01 00:00:00
        Timestamp {
            year_since_1970: 56,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

struct Session {
    volumes: Volumes,
    volume: RawVolume,
    root: RawDirectory,
}

/// The removable card and, while mounted, its open volume.
pub struct SdSlot {
    card: Option<Card>,
    session: Option<Session>,
}

impl SdSlot {
    pub fn new(
        spi: Spi<'static, SPI0, Blocking>,
        cs: Output<'static>,
    ) -> Self {
        let Ok(device) = ExclusiveDevice::new_no_delay(spi, cs);
        Self {
            card: Some(SdCard::new(device, Delay)),
            session: None,
        }
    }

    /// Check that a card with a readable volume is inserted.
    pub fn probe(&mut self) -> Result<(), BoardError> {
        self.mount()?;
        self.unmount();
        Ok(())
    }

    pub fn mount(&mut self) -> Result<(), BoardError> {
        if self.session.is_some() {
            return Ok(());
        }
        let card = self.card.take().ok_or(BoardError::CardLost)?;
        match start_session(card) {
            Ok(session) => {
                self.session = Some(session);
                Ok(())
            }
            Err((card, e)) => {
                self.card = Some(card);
                Err(e)
            }
        }
    }

    pub fn unmount(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        if let Err(e) = session.volumes.close_dir(session.root) {
            log::warn!("Closing root directory failed: {:?}", e);
        }
        if let Err(e) = session.volumes.close_volume(session.volume) {
            log::warn!("Closing volume failed: {:?}", e);
        }
        let (card, _) = session.volumes.free();
        self.card = Some(card);
    }

    /// Whether `dir/name` is an existing file.
    pub fn contains(
        &mut self,
        path: &str,
    ) -> Result<bool, BoardError> {
        let session = self.session.as_mut().ok_or(BoardError::NotMounted)?;
        let (dir_name, file_name) = path.split_once('/').ok_or(BoardError::InvalidPath)?;

        let dir = match session.volumes.open_dir(session.root, dir_name) {
            Ok(dir) => dir,
            Err(embedded_sdmmc::Error::NotFound) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let entry = session.volumes.find_directory_entry(dir, file_name);
        session.volumes.close_dir(dir)?;

        match entry {
            Ok(entry) => Ok(!entry.attributes.is_directory()),
            Err(embedded_sdmmc::Error::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the bitmap at `dir/name` and hand each packed panel row, top to
    /// bottom, to `sink`.
    pub fn stream_bitmap(
        &mut self,
        path: &str,
        sink: &mut dyn FnMut(&[u8]) -> Result<(), BoardError>,
    ) -> Result<(), BoardError> {
        let session = self.session.as_mut().ok_or(BoardError::NotMounted)?;
        let (dir_name, file_name) = path.split_once('/').ok_or(BoardError::InvalidPath)?;

        let dir = session.volumes.open_dir(session.root, dir_name)?;
        let streamed = match session.volumes.open_file_in_dir(dir, file_name, Mode::ReadOnly) {
            Ok(file) => {
                let streamed = stream_rows(&mut session.volumes, file, sink);
                session.volumes.close_file(file)?;
                streamed
            }
            Err(e) => Err(e.into()),
        };
        session.volumes.close_dir(dir)?;
        streamed
    }
}

fn start_session(card: Card) -> Result<Session, (Card, BoardError)> {
    card.mark_card_uninit();

    // SD SPI init requires >=74 clock cycles with CS deasserted.
    let preclock = card.spi(|device| {
        let bus = device.bus_mut();
        bus.set_frequency(INIT_FREQUENCY);
        bus.blocking_write(&[0xFF; 10])
    });
    if preclock.is_err() {
        return Err((card, BoardError::Spi));
    }

    let card_size_bytes = match card.num_bytes() {
        Ok(bytes) => bytes,
        Err(e) => return Err((card, BoardError::Card(e))),
    };
    card.spi(|device| device.bus_mut().set_frequency(DATA_FREQUENCY));
    log::debug!("SD card initialised, {} bytes", card_size_bytes);

    let mut volumes = VolumeManager::new(card, FixedTimeSource);
    let volume = match volumes.open_raw_volume(VolumeIdx(0)) {
        Ok(volume) => volume,
        Err(e) => return Err((volumes.free().0, e.into())),
    };
    let root = match volumes.open_root_dir(volume) {
        Ok(root) => root,
        Err(e) => {
            volumes.close_volume(volume).ok();
            return Err((volumes.free().0, e.into()));
        }
    };

    Ok(Session { volumes, volume, root })
}

fn stream_rows(
    volumes: &mut Volumes,
    file: RawFile,
    sink: &mut dyn FnMut(&[u8]) -> Result<(), BoardError>,
) -> Result<(), BoardError> {
    let mut header = [0u8; BMP_HEADER_LEN];
    read_exact(volumes, file, &mut header)?;
    let bmp = BmpHeader::parse(&header)?;

    let mut source = [0u8; BMP_ROW_BYTES];
    let mut packed = [0u8; PANEL_ROW_BYTES];
    for row in 0..PANEL_HEIGHT {
        volumes.file_seek_from_start(file, bmp.row_offset(row))?;
        read_exact(volumes, file, &mut source)?;
        pack_row(&source, &mut packed);
        sink(&packed)?;
    }
    Ok(())
}

fn read_exact(
    volumes: &mut Volumes,
    file: RawFile,
    buffer: &mut [u8],
) -> Result<(), BoardError> {
    let mut filled = 0;
    while filled < buffer.len() {
        let read = volumes.read(file, &mut buffer[filled..])?;
        if read == 0 {
            return Err(BoardError::ShortRead);
        }
        filled += read;
    }
    Ok(())
}

/// SPI configuration for the card slot at identification speed.
pub fn card_spi_config() -> SpiConfig {
    let mut config = SpiConfig::default();
    config.frequency = INIT_FREQUENCY;
    config
}
