// src/executor.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::PortalError;

/// Async envelope around every state-mutating command of a domain module.
///
/// One executor is constructed per module, so `loading` and `error` are the
/// module-wide flags the UI subscribes to. The flag is NOT a mutex: commands
/// fired concurrently race and the last one to settle wins on `loading`.
/// Callers that need a single in-flight mutation serialize at the call site.
#[derive(Clone)]
pub struct CommandExecutor {
    latency: Duration,
    loading: Arc<AtomicBool>,
    error: Arc<Mutex<Option<String>>>,
}

impl CommandExecutor {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            loading: Arc::new(AtomicBool::new(false)),
            error: Arc::new(Mutex::new(None)),
        }
    }

    /// Runs one command: raise `loading`, clear the error slot, wait out the
    /// simulated latency, then invoke the synchronous mutation exactly once.
    /// On failure the error's message lands in the shared slot and the error
    /// itself is returned unchanged. `loading` drops on every path.
    pub async fn run<T, F>(&self, op: F) -> Result<T, PortalError>
    where
        F: FnOnce() -> Result<T, PortalError>,
    {
        self.loading.store(true, Ordering::SeqCst);
        self.set_error(None);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let result = op();
        if let Err(e) = &result {
            tracing::debug!(code = e.code(), "command failed: {e}");
            self.set_error(Some(e.to_string()));
        }

        self.loading.store(false, Ordering::SeqCst);
        result
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        self.error.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn set_error(&self, value: Option<String>) {
        *self.error.lock().unwrap_or_else(|p| p.into_inner()) = value;
    }
}
