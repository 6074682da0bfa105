//! Shared application state.
//!
//! Holds the "processing" gate that keeps a second upload from starting while
//! one is in flight. The last finished report lives in `ReportCache`.

use std::sync::atomic::{AtomicBool, Ordering};

pub struct CoreState {
    processing: AtomicBool,
}

impl CoreState {
    pub fn new() -> Self {
        Self {
            processing: AtomicBool::new(false),
        }
    }

    /// Claim the processing gate. The gate reopens when the guard drops,
    /// including on early return or panic.
    pub fn begin_processing(&self) -> Result<ProcessingGuard<'_>, CoreError> {
        self.processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CoreError::AlreadyProcessing)?;
        Ok(ProcessingGuard { flag: &self.processing })
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }
}

impl Default for CoreState {
    fn default() -> Self {
        Self::new()
    }
}

/// Held for the duration of one pipeline run.
#[must_use = "the processing gate reopens as soon as the guard is dropped"]
pub struct ProcessingGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("A report is already being processed")]
    AlreadyProcessing,
}
