//! # vault-init-core
//!
//! Core library for vault-init providing:
//! - The bootstrap result model shared by every save backend
//! - The one-time pad codec used during root token generation
//! - Configuration file parsing (vault-init.yaml) and validation

pub mod config;
pub mod error;
pub mod otp;
pub mod types;

pub use config::VaultInitConfig;
pub use error::{Error, Result};
pub use otp::OtpError;
pub use types::{BootstrapResult, KeyKind, SaveLocation};
