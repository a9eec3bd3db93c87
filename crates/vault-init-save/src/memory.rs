//! In-process backend, used by tests and dry runs

use crate::{check_existing, vacant, Existing, Overwrite, SaveError, SaveMethod};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use vault_init_core::{BootstrapResult, SaveLocation};

const LOCATION: &str = "memory";

/// Keeps the result in memory. Clones share the same slot, so a test can hand
/// one clone to the code under test and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemorySaveMethod {
    slot: Arc<Mutex<Option<BootstrapResult>>>,
}

impl MemorySaveMethod {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start out holding `result`
    pub fn with_result(result: BootstrapResult) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(result))),
        }
    }

    /// Copy of the stored result, if any
    pub fn snapshot(&self) -> Option<BootstrapResult> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SaveMethod for MemorySaveMethod {
    async fn save(
        &self,
        result: &BootstrapResult,
        overwrite: Overwrite,
    ) -> Result<SaveLocation, SaveError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let stored = slot
            .clone()
            .ok_or_else(|| SaveError::not_found(LOCATION));
        if let Existing::Writable = check_existing(stored, result, overwrite, LOCATION)? {
            *slot = Some(result.clone());
        }
        Ok(SaveLocation::new(LOCATION))
    }

    async fn load(&self) -> Result<BootstrapResult, SaveError> {
        self.snapshot().ok_or_else(|| SaveError::not_found(LOCATION))
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_vacant(&self) -> Result<(), SaveError> {
        vacant(self.load().await, LOCATION)
    }
}
