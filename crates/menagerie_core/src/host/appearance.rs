//! Optional appearance service.

use crate::model::instance::InstanceRef;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppearanceError {
    Unavailable,
    Rejected(String),
}

impl Display for AppearanceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "appearance service is not available"),
            Self::Rejected(message) => write!(f, "appearance rejected: {message}"),
        }
    }
}

impl Error for AppearanceError {}

/// Applies named visual models to instances. May come and go at runtime.
pub trait AppearanceService: Send + Sync {
    fn is_available(&self) -> bool;

    fn apply(&self, instance: InstanceRef, appearance: &str) -> Result<(), AppearanceError>;

    /// Directory the service loads model assets from.
    fn asset_dir(&self) -> Option<PathBuf>;
}

/// In-process appearance service with a runtime availability toggle.
#[derive(Debug, Default)]
pub struct MemoryAppearanceService {
    available: AtomicBool,
    asset_dir: Option<PathBuf>,
    applied: Mutex<Vec<(InstanceRef, String)>>,
}

impl MemoryAppearanceService {
    pub fn new(available: bool) -> Self {
        Self {
            available: AtomicBool::new(available),
            ..Self::default()
        }
    }

    pub fn with_asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = Some(dir.into());
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Appearance names applied so far, in application order.
    pub fn applied(&self) -> Vec<(InstanceRef, String)> {
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AppearanceService for MemoryAppearanceService {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn apply(&self, instance: InstanceRef, appearance: &str) -> Result<(), AppearanceError> {
        if !self.is_available() {
            return Err(AppearanceError::Unavailable);
        }
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((instance, appearance.to_string()));
        Ok(())
    }

    fn asset_dir(&self) -> Option<PathBuf> {
        self.asset_dir.clone()
    }
}
