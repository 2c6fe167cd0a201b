use std::{
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};

use spectra_capture::CaptureFile;

/// A capture file loaded for querying, with the path it came from.
#[derive(Debug)]
pub struct LoadedCapture {
    pub path: PathBuf,
    pub capture: CaptureFile,
}

/// Single slot holding the currently loaded capture.
///
/// Readers get their own `Arc` to a complete capture and never block a load for
/// longer than a pointer swap. A load replaces the whole capture, last writer wins.
#[derive(Debug, Default)]
pub struct SessionStore {
    current: RwLock<Option<Arc<LoadedCapture>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<LoadedCapture>> {
        // The slot only ever holds a whole Arc, so a poisoned lock still guards valid data.
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Installs a new capture and returns the one it replaced.
    pub fn replace(&self, loaded: LoadedCapture) -> Option<Arc<LoadedCapture>> {
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        slot.replace(Arc::new(loaded))
    }

    pub fn clear(&self) -> Option<Arc<LoadedCapture>> {
        self.current.write().unwrap_or_else(PoisonError::into_inner).take()
    }
}
