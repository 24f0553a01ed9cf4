//! Storage gate for the removable SD card.
//!
//! The card is checked once before the loop starts and is otherwise only
//! mounted for the duration of a single display operation. A [`Mounted`]
//! guard unmounts on drop so every exit path of that operation releases it.

use core::fmt::Debug;
use core::ops::{Deref, DerefMut};

/// Filesystem collaborator.
pub trait Storage {
    /// Error reported by [`mount`](Self::mount).
    type StorageError: Debug;

    /// Whether a card is inserted and carries a readable volume.
    fn storage_ready(&mut self) -> bool;

    /// Mount the volume.
    fn mount(&mut self) -> Result<(), Self::StorageError>;

    /// Release the volume.
    fn unmount(&mut self);

    /// Whether `path` (relative to the volume root) names an existing file.
    fn exists(
        &mut self,
        path: &str,
    ) -> bool;
}

/// Mounted storage; unmounts when dropped.
pub struct Mounted<'a, S: Storage + ?Sized> {
    storage: &'a mut S,
}

impl<'a, S: Storage + ?Sized> Mounted<'a, S> {
    /// Mount `storage` for the lifetime of the guard.
    pub fn mount(storage: &'a mut S) -> Result<Self, S::StorageError> {
        storage.mount()?;
        Ok(Self { storage })
    }
}

impl<S: Storage + ?Sized> Deref for Mounted<'_, S> {
    type Target = S;

    fn deref(&self) -> &S { self.storage }
}

impl<S: Storage + ?Sized> DerefMut for Mounted<'_, S> {
    fn deref_mut(&mut self) -> &mut S { self.storage }
}

impl<S: Storage + ?Sized> Drop for Mounted<'_, S> {
    fn drop(&mut self) { self.storage.unmount(); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Card {
        fail_mount: bool,
        mounted: bool,
        mounts: u32,
        unmounts: u32,
    }

    impl Storage for Card {
        type StorageError = &'static str;

        fn storage_ready(&mut self) -> bool { true }

        fn mount(&mut self) -> Result<(), Self::StorageError> {
            if self.fail_mount {
                return Err("no volume");
            }
            self.mounts += 1;
            self.mounted = true;
            Ok(())
        }

        fn unmount(&mut self) {
            self.unmounts += 1;
            self.mounted = false;
        }

        fn exists(
            &mut self,
            _path: &str,
        ) -> bool {
            self.mounted
        }
    }

    #[test]
    fn test_guard_unmounts_on_drop() {
        let mut card = Card::default();
        {
            let mut mounted = Mounted::mount(&mut card).unwrap();
            assert!(mounted.exists("pic/0001.bmp"));
        }
        assert!(!card.mounted);
        assert_eq!((card.mounts, card.unmounts), (1, 1));
    }

    #[test]
    fn test_failed_mount_does_not_unmount() {
        let mut card = Card {
            fail_mount: true,
            ..Card::default()
        };
        assert_eq!(Mounted::mount(&mut card).err(), Some("no volume"));
        assert_eq!(card.unmounts, 0);
    }
}
