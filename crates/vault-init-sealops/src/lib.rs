//! Bootstrap protocols for Vault-compatible servers
//!
//! - [`Bootstrapper::initialize`] initializes a fresh server and saves the keys
//! - [`Bootstrapper::rekey`] replaces the unseal or recovery shares
//! - [`Bootstrapper::rotate_root`] generates a new root token and revokes the old one
//!
//! The protocols talk to the server through [`SysApi`]; [`VaultSysClient`]
//! implements it over HTTP.

pub mod api;
pub mod bootstrap;
pub mod client;
pub mod error;
pub mod models;

pub use api::SysApi;
pub use bootstrap::{BootstrapOptions, Bootstrapper, InitOutcome, RekeyOutcome, RotateRootOutcome};
pub use client::VaultSysClient;
pub use error::{ApiError, SealOpsError};
