//! Error types for the admin API client and the bootstrap protocols

use std::time::Duration;
use thiserror::Error;
use vault_init_core::OtpError;
use vault_init_save::{DataLossRisk, SaveError};

/// Failure talking to the admin API
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid server address {address}: {message}")]
    Address { address: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success status, with the server's `errors` list
    #[error("{path} returned {status}: {}", format_errors(.errors))]
    Status {
        path: String,
        status: u16,
        errors: Vec<String>,
    },

    #[error("unexpected response from {path}: {message}")]
    Unexpected { path: String, message: String },
}

fn format_errors(errors: &[String]) -> String {
    if errors.is_empty() {
        "no error details".to_string()
    } else {
        errors.join("; ")
    }
}

impl ApiError {
    pub fn status(path: impl Into<String>, status: u16, errors: Vec<String>) -> Self {
        Self::Status {
            path: path.into(),
            status,
            errors,
        }
    }

    pub fn unexpected(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unexpected {
            path: path.into(),
            message: message.into(),
        }
    }

    /// HTTP status of a rejected request, if the server answered
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure of an initialize, rekey or root rotation run.
///
/// `phase` names the protocol step (`"rekey"`, `"generate root"`, ...) and
/// `nonce` the server session, where one exists.
#[derive(Error, Debug)]
pub enum SealOpsError {
    /// Another operator or process already has a session open
    #[error("{phase} already in progress")]
    Conflict { phase: &'static str },

    /// The server refused a share; the session has been cancelled
    #[error("{phase} rejected a share (nonce {nonce}), session cancelled: {source}")]
    Rejected {
        phase: &'static str,
        nonce: String,
        #[source]
        source: ApiError,
    },

    /// Every stored share was accepted but the threshold was not reached;
    /// the session has been cancelled
    #[error("{phase} ran out of shares at {progress}/{required} (nonce {nonce}), session cancelled")]
    Incomplete {
        phase: &'static str,
        nonce: String,
        progress: u32,
        required: u32,
    },

    /// Cancelling a failed session also failed. The server may still hold a
    /// half-finished session that needs an operator.
    #[error("{phase} failed (nonce {nonce}): {reason}; cancelling the session also failed: {source}")]
    CancelFailed {
        phase: &'static str,
        nonce: String,
        reason: String,
        #[source]
        source: ApiError,
    },

    #[error("bootstrap result store: {0}")]
    Save(#[from] SaveError),

    #[error(transparent)]
    DataLossRisk(#[from] DataLossRisk),

    /// The new root token could not be recovered and is lost
    #[error("failed to decode the generated root token (nonce {nonce}): {source}")]
    Decode {
        nonce: String,
        #[source]
        source: OtpError,
    },

    #[error("server was not initialized within {0:?}")]
    Timeout(Duration),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("stored bootstrap result has no shares to authorize {phase}")]
    NoShares { phase: &'static str },

    #[error("{phase} request failed: {source}")]
    Api {
        phase: &'static str,
        #[source]
        source: ApiError,
    },
}

impl SealOpsError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn api(phase: &'static str) -> impl Fn(ApiError) -> Self {
        move |source| Self::Api { phase, source }
    }
}
