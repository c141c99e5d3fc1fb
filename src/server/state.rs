//! Shared application state
//!
//! The detector is loaded once at startup and shared read-only across
//! handlers. The outer `RwLock` exists solely for the administrative reload
//! swap; request handlers clone the inner `Arc` and score without holding
//! the lock.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use crate::infer::Detector;

/// State shared by all request handlers
#[derive(Clone)]
pub struct AppState {
    detector: Arc<RwLock<Arc<Detector>>>,
    started: Instant,
}

impl AppState {
    /// Wrap a loaded detector
    pub fn new(detector: Detector) -> Self {
        Self { detector: Arc::new(RwLock::new(Arc::new(detector))), started: Instant::now() }
    }

    /// Snapshot of the current detector
    pub async fn detector(&self) -> Arc<Detector> {
        self.detector.read().await.clone()
    }

    /// Swap in a freshly loaded detector
    pub async fn replace_detector(&self, detector: Detector) {
        *self.detector.write().await = Arc::new(detector);
    }

    /// Seconds since startup
    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}
