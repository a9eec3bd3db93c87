//! Configuration loading and types

mod loader;
mod types;

pub use types::*;
