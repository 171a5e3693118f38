//! Shared model handle with a readiness state
//!
//! The image model is loaded in the background after start-up. Until it is
//! installed, callers get `NotReady` immediately instead of waiting. Once
//! installed, every use goes through one mutex, which serialises image
//! inference across requests.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::error::AppError;

/// Slot holding a lazily loaded model
pub struct ModelSlot<M: ?Sized> {
    ready: AtomicBool,
    handle: Mutex<Option<Box<M>>>,
}

impl<M: ?Sized> ModelSlot<M> {
    pub fn empty() -> Self {
        Self {
            ready: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    /// Slot that is ready from the start
    pub fn loaded(model: Box<M>) -> Self {
        Self {
            ready: AtomicBool::new(true),
            handle: Mutex::new(Some(model)),
        }
    }

    /// Install the loaded model and flip the ready flag
    pub async fn install(&self, model: Box<M>) {
        let mut handle = self.handle.lock().await;
        *handle = Some(model);
        self.ready.store(true, Ordering::Release);
        info!("Image model installed");
    }

    /// Availability check under the model lock
    pub async fn is_loaded(&self) -> bool {
        if !self.ready.load(Ordering::Acquire) {
            return false;
        }
        self.handle.lock().await.is_some()
    }

    /// Lock-free hint, used where blocking behind inference is not wanted
    pub fn is_ready_hint(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Take exclusive access to the model, or fail fast if it is not loaded.
    ///
    /// The returned guard always holds `Some`.
    pub async fn acquire(&self) -> Result<MutexGuard<'_, Option<Box<M>>>, AppError> {
        if !self.ready.load(Ordering::Acquire) {
            return Err(AppError::NotReady);
        }

        let guard = self.handle.lock().await;
        if guard.is_none() {
            return Err(AppError::NotReady);
        }
        Ok(guard)
    }
}

impl<M: ?Sized> Default for ModelSlot<M> {
    fn default() -> Self {
        Self::empty()
    }
}
