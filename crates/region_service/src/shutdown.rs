//! Shutdown coordination between the application and the service task.
//!
//! The application flips the initiated flag; the service loop stops taking
//! new requests, optionally drains what is already queued, and then reports
//! completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

/// Shared shutdown state.
#[derive(Debug, Clone, Default)]
pub struct ShutdownState {
    initiated: Arc<AtomicBool>,
    complete: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_shutdown_initiated(&self) -> bool {
        self.initiated.load(Ordering::Acquire)
    }

    pub fn is_shutdown_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// Stops the service from accepting new requests.
    pub fn initiate_shutdown(&self) {
        if !self.initiated.swap(true, Ordering::AcqRel) {
            info!("🛑 Shutdown initiated - no new requests will be processed");
        }
        self.wake.notify_waiters();
    }

    /// Marks the service as stopped.
    pub fn complete_shutdown(&self) {
        self.complete.store(true, Ordering::Release);
        info!("✅ Orchestration service drained - ready for final cleanup");
    }

    /// Resolves once shutdown has been initiated.
    pub async fn initiated(&self) {
        loop {
            let notified = self.wake.notified();
            if self.is_shutdown_initiated() {
                return;
            }
            notified.await;
        }
    }
}
