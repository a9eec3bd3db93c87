//! Primary backend with a local fallback file

use crate::file::same_file;
use crate::{FileSaveMethod, Overwrite, SaveError, SaveMethod};
use camino::Utf8PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, error, warn};
use vault_init_core::config::{SaveConfig, SaveMethodKind};
use vault_init_core::{BootstrapResult, SaveLocation};

/// Where a chained save ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Saved {
    pub location: SaveLocation,
    /// Name of the backend that accepted the result
    pub method: &'static str,
    /// True when the primary failed and the fallback file holds the result
    pub fell_back: bool,
}

/// Neither the primary nor the fallback stored the result. Whatever the server
/// just generated exists only in process memory.
#[derive(Error, Debug)]
#[error("failed to save bootstrap result with {primary_method} ({primary}){}", fallback_suffix(.fallback))]
pub struct DataLossRisk {
    pub primary_method: &'static str,
    #[source]
    pub primary: SaveError,
    pub fallback: Option<SaveError>,
}

fn fallback_suffix(fallback: &Option<SaveError>) -> String {
    match fallback {
        Some(e) => format!(" and to the fallback file ({})", e),
        None => String::new(),
    }
}

/// Saves through the primary backend and, if that fails, writes the result to
/// the fallback file instead. Loads always read the primary.
pub struct SaveChain {
    primary: Box<dyn SaveMethod>,
    fallback: Option<Box<dyn SaveMethod>>,
}

impl SaveChain {
    pub fn new(primary: Box<dyn SaveMethod>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn SaveMethod>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Configured backend plus a fallback file at [`fallback_path`]
    pub fn from_config(config: &SaveConfig) -> Result<Self, SaveError> {
        let chain = Self::new(crate::from_config(config)?);
        Ok(chain.with_fallback(Box::new(FileSaveMethod::new(fallback_path(config)))))
    }

    pub fn primary_name(&self) -> &'static str {
        self.primary.name()
    }

    /// Save `result`, falling back on any primary failure. The fallback write
    /// always replaces what the fallback file holds.
    pub async fn save(
        &self,
        result: &BootstrapResult,
        overwrite: Overwrite,
    ) -> Result<Saved, DataLossRisk> {
        let primary_err = match self.primary.save(result, overwrite).await {
            Ok(location) => {
                return Ok(Saved {
                    location,
                    method: self.primary.name(),
                    fell_back: false,
                })
            }
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            error!(method = self.primary.name(), error = %primary_err, "Save failed and no fallback is configured");
            return Err(DataLossRisk {
                primary_method: self.primary.name(),
                primary: primary_err,
                fallback: None,
            });
        };

        warn!(
            method = self.primary.name(),
            error = %primary_err,
            "Save failed, writing bootstrap result to fallback"
        );
        match fallback.save(result, Overwrite::Always).await {
            Ok(location) => {
                warn!(location = %location, "Bootstrap result saved to fallback; move it to its intended store");
                Ok(Saved {
                    location,
                    method: fallback.name(),
                    fell_back: true,
                })
            }
            Err(fallback_err) => {
                error!(error = %fallback_err, "Fallback save failed");
                Err(DataLossRisk {
                    primary_method: self.primary.name(),
                    primary: primary_err,
                    fallback: Some(fallback_err),
                })
            }
        }
    }

    pub async fn load(&self) -> Result<BootstrapResult, SaveError> {
        self.primary.load().await
    }

    /// Fail early if a save with `overwrite` is bound to be refused by the
    /// primary because a result is already stored there. A primary that
    /// cannot be checked passes; the fallback covers it at save time.
    pub async fn ensure_vacant(&self, overwrite: Overwrite) -> Result<(), SaveError> {
        if overwrite == Overwrite::Always {
            return Ok(());
        }
        match self.primary.ensure_vacant().await {
            Ok(()) => Ok(()),
            Err(e @ SaveError::AlreadyExists { .. }) => Err(e),
            Err(e) => {
                warn!(method = self.primary.name(), error = %e, "Could not check for an existing bootstrap result");
                Ok(())
            }
        }
    }
}

/// Where the fallback file goes for `config`. A file primary at the same
/// place gets a timestamped sibling instead, so the fallback never replaces
/// the document the primary refused to overwrite.
pub fn fallback_path(config: &SaveConfig) -> Utf8PathBuf {
    let path = &config.fallback_path;
    if config.method != SaveMethodKind::File || !same_file(&config.file.path, path) {
        return path.clone();
    }

    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let sibling = Utf8PathBuf::from(format!("{}.{}", path, secs));
    debug!(path = %path, fallback = %sibling, "Fallback path collides with the save file");
    sibling
}
