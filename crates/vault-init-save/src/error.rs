//! Error types for save backends

use thiserror::Error;

/// Errors raised by a save backend. Messages name the location, never the
/// stored shares or token.
#[derive(Error, Debug)]
pub enum SaveError {
    /// Nothing has been saved at the location yet
    #[error("no bootstrap result found at {location}")]
    NotFound { location: String },

    /// Stored payload could not be turned back into a bootstrap result
    #[error("bootstrap result at {location} is corrupt: {message}")]
    Corrupt { location: String, message: String },

    /// A result is stored and the write may not replace it
    #[error("a bootstrap result already exists at {location} and overwrite is disabled")]
    AlreadyExists { location: String },

    #[error("failed to serialize bootstrap result: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("I/O error at {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// Backend client could not be set up
    #[error("save backend {backend} unavailable: {message}")]
    Unavailable {
        backend: &'static str,
        message: String,
    },

    #[error("Kubernetes API request for {location} failed: {source}")]
    Kube {
        location: String,
        #[source]
        source: kube::Error,
    },

    #[error("Vault KV request for {location} failed: {source}")]
    Vault {
        location: String,
        #[source]
        source: vaultrs::error::ClientError,
    },
}

impl SaveError {
    pub fn not_found(location: impl Into<String>) -> Self {
        Self::NotFound {
            location: location.into(),
        }
    }

    pub fn corrupt(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Corrupt-document error from a JSON parse failure. serde_json messages
    /// can quote the offending value, so only the position is kept.
    pub fn corrupt_json(location: impl Into<String>, err: &serde_json::Error) -> Self {
        Self::corrupt(
            location,
            format!(
                "{:?} error at line {} column {}",
                err.classify(),
                err.line(),
                err.column()
            ),
        )
    }

    pub fn already_exists(location: impl Into<String>) -> Self {
        Self::AlreadyExists {
            location: location.into(),
        }
    }

    pub fn io(location: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            location: location.into(),
            source,
        }
    }

    pub fn unavailable(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            backend,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SaveError::NotFound { .. })
    }
}
