//! Random image selection over the `pic/NNNN.bmp` namespace.
//!
//! The selector draws an index in `[1, bound]` and checks whether that file
//! exists. Every miss lowers the bound by one, so over a long session the
//! search space shrinks towards the populated low indices without ever
//! listing the directory. The bound persists between selections and only
//! returns to the configured maximum after a sequence exhausts it.

use core::fmt::Write;

use crate::error::Fault;
use crate::panel::Panel;
use crate::storage::{Mounted, Storage};

/// Directory holding the pictures, relative to the volume root.
pub const PICTURE_DIR: &str = "pic";

/// `pic/NNNN.bmp`; the longest (`pic/65535.bmp`) is 13 bytes.
pub type PicturePath = heapless::String<16>;

/// Source of uniformly distributed 32-bit words.
pub trait RandomSource {
    /// Next random word.
    fn next_u32(&mut self) -> u32;
}

/// Path of the picture with the given index.
pub fn picture_path(index: u16) -> PicturePath {
    let mut path = PicturePath::new();
    // Cannot overflow: the capacity covers every u16 index
    write!(path, "{PICTURE_DIR}/{index:04}.bmp").ok();
    path
}

/// Uniform draw in `[1, bound]` from one random word.
///
/// Uses a widening multiply instead of a modulo, so there is no modulo bias
/// and no division by zero. `bound` must be at least 1.
#[inline]
pub fn draw_index(
    rng: &mut (impl RandomSource + ?Sized),
    bound: u16,
) -> u16 {
    let scaled = (u64::from(rng.next_u32()) * u64::from(bound)) >> 32;
    scaled as u16 + 1
}

/// Result of one selection sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    /// An existing picture.
    Found(PicturePath),
    /// The bound reached zero; `last_tried` is known to be missing.
    Exhausted {
        /// Last path checked before giving up.
        last_tried: PicturePath,
    },
}

/// Result of a full mount/select/render/unmount sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisplayOutcome {
    /// The picture was rendered.
    Shown(PicturePath),
    /// A picture was found but the panel failed to render it.
    RenderFailed(PicturePath),
    /// No picture exists within the search space.
    NoImageAvailable {
        /// Last path checked before giving up.
        last_tried: PicturePath,
    },
    /// The volume could not be mounted.
    MountFailed,
}

impl DisplayOutcome {
    /// Non-fatal fault behind a failed attempt; `None` once shown.
    ///
    /// An unmountable card means no picture could be found either.
    pub const fn fault(&self) -> Option<Fault> {
        match self {
            Self::Shown(_) => None,
            Self::RenderFailed(_) => Some(Fault::RenderFailure),
            Self::NoImageAvailable { .. } | Self::MountFailed => Some(Fault::ImageNotFound),
        }
    }
}

/// Shrinking-bound random picker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSelector {
    max: u16,
    bound: u16,
}

impl ImageSelector {
    /// Selector searching `[1, max]`.
    pub const fn new(max: u16) -> Self { Self { max, bound: max } }

    /// Current upper bound of the search space.
    pub const fn bound(&self) -> u16 { self.bound }

    /// Configured maximum index.
    pub const fn max(&self) -> u16 { self.max }

    /// Draw until an existing picture is found or the bound reaches zero.
    ///
    /// `board` must already be mounted.
    pub fn select<B: Storage + RandomSource + ?Sized>(
        &mut self,
        board: &mut B,
    ) -> Selection {
        if self.bound == 0 {
            log::info!("Image search space exhausted earlier, restarting from {}", self.max);
            self.bound = self.max;
        }

        loop {
            let index = draw_index(board, self.bound);
            let path = picture_path(index);
            log::debug!("Max idx is {}, checking for image: {}", self.bound, path.as_str());

            if board.exists(&path) {
                return Selection::Found(path);
            }

            self.bound -= 1;
            if self.bound == 0 {
                return Selection::Exhausted { last_tried: path };
            }
        }
    }

    /// Mount storage, pick a picture, render it and unmount.
    ///
    /// Every failure is logged and reported in the outcome; none of them is
    /// fatal to the caller.
    pub fn select_and_display<B: Storage + Panel + RandomSource + ?Sized>(
        &mut self,
        board: &mut B,
    ) -> DisplayOutcome {
        let mut mounted = match Mounted::mount(board) {
            Ok(mounted) => mounted,
            Err(e) => {
                log::warn!("Mounting storage failed: {:?}", e);
                return DisplayOutcome::MountFailed;
            }
        };

        match self.select(&mut *mounted) {
            Selection::Found(path) => {
                log::info!("Displaying image: {}", path.as_str());
                match mounted.render_bitmap(&path) {
                    Ok(()) => DisplayOutcome::Shown(path),
                    Err(e) => {
                        log::warn!("Rendering {} failed: {:?}", path.as_str(), e);
                        DisplayOutcome::RenderFailed(path)
                    }
                }
            }
            Selection::Exhausted { last_tried } => {
                log::warn!("No image found under {}/, last tried {}", PICTURE_DIR, last_tried.as_str());
                DisplayOutcome::NoImageAvailable { last_tried }
            }
        }
    }
}
